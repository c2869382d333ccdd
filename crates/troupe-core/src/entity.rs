//! Entity abstraction shared by every persisted domain object.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kinds of persisted entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A persona with three truth layers.
    Persona,
    /// A link between personas.
    Relation,
    /// An API connection descriptor.
    Model,
    /// A persona paired with a model.
    Assistant,
    /// A global setting description.
    World,
    /// A starting situation.
    Scenario,
    /// A container for a cast and its turns.
    Production,
    /// One exchange unit of a production.
    Turn,
}

impl EntityKind {
    /// Lowercase name used in messages, table names and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Persona => "persona",
            Self::Relation => "relation",
            Self::Model => "model",
            Self::Assistant => "assistant",
            Self::World => "world",
            Self::Scenario => "scenario",
            Self::Production => "production",
            Self::Turn => "turn",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-scoped record that lives in the backing store and in the
/// in-memory entity cache.
pub trait Entity: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// The kind of this entity.
    const KIND: EntityKind;

    /// Returns the entity identifier.
    fn id(&self) -> Uuid;

    /// Replaces the identifier (temporary ids are assigned before the
    /// durable write).
    fn set_id(&mut self, id: Uuid);

    /// Returns the owning user.
    fn user_id(&self) -> Uuid;
}
