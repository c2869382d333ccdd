//! Mapping of database errors onto the domain taxonomy.

use sqlx::error::ErrorKind;
use troupe_core::entity::EntityKind;
use troupe_core::error::DomainError;

/// What the failing statement was doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Read,
    Write,
    Delete,
}

pub(crate) fn storage_error(kind: EntityKind, op: Op, err: &sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db) = err {
        match (db.kind(), op) {
            (ErrorKind::ForeignKeyViolation, Op::Delete) => {
                return DomainError::Conflict(format!("{kind} is still referenced"));
            }
            (ErrorKind::ForeignKeyViolation, _) => {
                return DomainError::Validation(format!("{kind} references a missing entity"));
            }
            (ErrorKind::UniqueViolation, _) => {
                return DomainError::Conflict(format!("{kind} already exists: {}", db.message()));
            }
            (ErrorKind::CheckViolation | ErrorKind::NotNullViolation, _) => {
                return DomainError::Validation(format!("invalid {kind}: {}", db.message()));
            }
            _ => {}
        }
    }
    DomainError::Api(format!("database error: {err}"))
}
