//! Troupe — the cast.
//!
//! Personas with three-tier truth, the relations between them, the model
//! connections that drive them and the assistants pairing the two, together
//! with the rules deciding which truth layers an observer may see.

pub mod domain;
