//! Troupe Core — shared domain abstractions.
//!
//! This crate defines the fundamental traits and types that every other
//! crate depends on: the error taxonomy, the clock, the entity/repository
//! seam to the backing store, three-tier truth layers and the seam to the
//! language-model completion API. It contains no infrastructure code.

pub mod clock;
pub mod completion;
pub mod entity;
pub mod error;
pub mod repository;
pub mod truth;
