//! Troupe — turn streaming.
//!
//! Drives one assistant turn from trigger to persistence: the optional user
//! turn is stored first, a provisional assistant turn is staged in the
//! entity store, the completion is streamed and parsed field by field into
//! it, and the finished turn is persisted. Any failure discards the
//! provisional turn.

pub mod config;
pub mod engine;
pub mod event;
pub mod openai;
pub mod parser;
pub mod sse;

pub use config::StreamConfig;
pub use engine::{TurnEngine, TurnTrigger};
pub use event::{TurnEvent, TurnPhase};
pub use openai::OpenAiCompletionClient;
pub use parser::{ContentParser, FieldUpdate, ParsedContent};
