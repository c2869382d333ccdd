//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

use crate::entity::EntityKind;

/// Top-level domain error type.
///
/// Every failure that leaves a crate is one of these variants; lower-level
/// errors (database, HTTP, JSON) are wrapped with a message, never passed
/// through.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// The kind of entity that was looked up.
        kind: EntityKind,
        /// The identifier that could not be resolved.
        id: Uuid,
    },

    /// Malformed input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The backing store or the completion API rejected a request.
    #[error("api error: {0}")]
    Api(String),

    /// The streamed completion is not valid turn content JSON.
    #[error("stream parse error: {0}")]
    StreamParse(String),

    /// Generic streaming failure, including a completion without performance.
    #[error("stream error: {0}")]
    Stream(String),

    /// The operation conflicts with existing state (e.g. model in use).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persisted data violates a structural invariant (e.g. a parent cycle).
    #[error("data integrity error: {0}")]
    Integrity(String),
}

impl DomainError {
    /// Shorthand for a [`DomainError::NotFound`].
    #[must_use]
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }

    /// Machine-readable code for presentation layers.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation_error",
            Self::Api(_) => "api_error",
            Self::StreamParse(_) => "stream_parse_error",
            Self::Stream(_) => "stream_error",
            Self::Conflict(_) => "conflict",
            Self::Integrity(_) => "integrity_error",
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("json: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_kind_and_id() {
        let id = Uuid::nil();

        let err = DomainError::not_found(EntityKind::Assistant, id);

        assert_eq!(
            err.to_string(),
            "assistant not found: 00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn test_codes_are_distinct_per_variant() {
        let errors = [
            DomainError::not_found(EntityKind::Turn, Uuid::nil()),
            DomainError::Validation(String::new()),
            DomainError::Api(String::new()),
            DomainError::StreamParse(String::new()),
            DomainError::Stream(String::new()),
            DomainError::Conflict(String::new()),
            DomainError::Integrity(String::new()),
        ];

        let mut codes: Vec<&str> = errors.iter().map(DomainError::code).collect();
        codes.sort_unstable();
        codes.dedup();

        assert_eq!(codes.len(), errors.len());
    }
}
