//! Relations between personas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use troupe_core::entity::{Entity, EntityKind};
use troupe_core::truth::Truth;
use uuid::Uuid;

/// A named or anonymous link between two or more personas.
///
/// `truth.internal` is visible to member personas only, `truth.external` to
/// everyone else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Relation identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Optional name ("the Vance family", "rivals").
    #[serde(default)]
    pub name: Option<String>,
    /// Member personas.
    pub persona_ids: Vec<Uuid>,
    /// Universal / internal / external truth.
    #[serde(default)]
    pub truth: Truth,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Relation {
    /// Creates a relation between `persona_ids`.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        name: Option<String>,
        persona_ids: Vec<Uuid>,
        truth: Truth,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            persona_ids,
            truth,
            created_at,
        }
    }

    /// Whether `persona_id` is a listed member.
    #[must_use]
    pub fn has_member(&self, persona_id: Uuid) -> bool {
        self.persona_ids.contains(&persona_id)
    }

    /// Label used when the relation is described to a model.
    #[must_use]
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed relation")
    }
}

impl Entity for Relation {
    const KIND: EntityKind = EntityKind::Relation;

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }
}
