//! Personas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use troupe_core::entity::{Entity, EntityKind};
use troupe_core::truth::Truth;
use uuid::Uuid;

/// An identity with three truth layers.
///
/// Affiliations are expressed as [`Relation`](super::Relation) membership:
/// a persona's insiders are the members of the relations it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Persona identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Display name, also used as the speaker label.
    pub name: String,
    /// Universal / internal / external truth.
    #[serde(default)]
    pub truth: Truth,
    /// Storage key of the persona's avatar image, if one was uploaded.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Persona {
    /// Creates a persona with no avatar.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        name: impl Into<String>,
        truth: Truth,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            truth,
            avatar: None,
            created_at,
        }
    }
}

impl Entity for Persona {
    const KIND: EntityKind = EntityKind::Persona;

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
