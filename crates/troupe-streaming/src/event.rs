//! Turn lifecycle events.

use std::fmt;

use serde::Serialize;
use troupe_production::domain::{ContentField, Turn};
use uuid::Uuid;

/// Lifecycle of one in-flight turn: `idle → streaming → persisted | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    /// Nothing requested yet.
    Idle,
    /// The provisional turn is receiving content.
    Streaming,
    /// The turn is durable.
    Persisted,
    /// The provisional turn was discarded.
    Failed,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Streaming => "streaming",
            Self::Persisted => "persisted",
            Self::Failed => "failed",
        })
    }
}

/// Published by the engine so observers can follow turns live.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A provisional assistant turn was staged.
    Started {
        /// Owning production.
        production_id: Uuid,
        /// Provisional turn id.
        turn_id: Uuid,
        /// Responding assistant.
        assistant_id: Uuid,
        /// Parent the turn attaches to.
        parent_id: Option<Uuid>,
    },
    /// A content field of the provisional turn grew.
    FieldUpdated {
        /// Owning production.
        production_id: Uuid,
        /// Provisional turn id.
        turn_id: Uuid,
        /// The field.
        field: ContentField,
        /// Its full value so far.
        value: String,
    },
    /// The turn was stored under its real id.
    Persisted {
        /// Owning production.
        production_id: Uuid,
        /// The id the turn streamed under.
        provisional_id: Uuid,
        /// The stored turn.
        turn: Turn,
    },
    /// The turn failed and was discarded.
    Failed {
        /// Owning production.
        production_id: Uuid,
        /// Provisional turn id.
        turn_id: Uuid,
        /// Machine-readable error code.
        code: String,
        /// Error text.
        message: String,
    },
}

impl TurnEvent {
    /// The production the event belongs to.
    #[must_use]
    pub fn production_id(&self) -> Uuid {
        match self {
            Self::Started { production_id, .. }
            | Self::FieldUpdated { production_id, .. }
            | Self::Persisted { production_id, .. }
            | Self::Failed { production_id, .. } => *production_id,
        }
    }

    /// Event name, as used for the SSE `event:` field.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::FieldUpdated { .. } => "field_updated",
            Self::Persisted { .. } => "persisted",
            Self::Failed { .. } => "failed",
        }
    }
}
