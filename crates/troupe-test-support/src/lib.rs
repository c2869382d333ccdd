//! Shared test doubles and fixtures for the Troupe production engine.

mod clock;
mod completion;
pub mod fixtures;
mod repository;

pub use clock::FixedClock;
pub use completion::ScriptedCompletionClient;
pub use repository::{FailingRepository, InMemoryRepository, RepositoryOp};
