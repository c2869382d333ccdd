//! Productions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use troupe_core::entity::{Entity, EntityKind};
use uuid::Uuid;

/// Binds a world, a scenario and a cast. Its turns form a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    /// Production identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
    /// The setting, if any.
    #[serde(default)]
    pub world_id: Option<Uuid>,
    /// The starting situation, if any.
    #[serde(default)]
    pub scenario_id: Option<Uuid>,
    /// Participating assistants.
    #[serde(default)]
    pub assistant_ids: Vec<Uuid>,
    /// Personas visible to the cast without being assistants.
    #[serde(default)]
    pub persona_ids: Vec<Uuid>,
    /// Relations visible to the cast.
    #[serde(default)]
    pub relation_ids: Vec<Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Production {
    /// Creates an empty production.
    #[must_use]
    pub fn new(user_id: Uuid, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            world_id: None,
            scenario_id: None,
            assistant_ids: Vec::new(),
            persona_ids: Vec::new(),
            relation_ids: Vec::new(),
            created_at,
        }
    }
}

impl Entity for Production {
    const KIND: EntityKind = EntityKind::Production;

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
