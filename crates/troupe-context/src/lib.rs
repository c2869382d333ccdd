//! Troupe — context assembly.
//!
//! Builds the ordered message list an assistant is sent: the world, its own
//! persona, every other persona and relation it may perceive, the scenario
//! and the branch history leading to the triggering turn. What each
//! assistant sees is filtered through the visibility resolver.

pub mod assembler;
pub mod catalog;
mod prompt;

pub use assembler::{AssembledContext, ContextAssembler};
pub use catalog::Catalog;
