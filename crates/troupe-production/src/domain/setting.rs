//! Worlds and scenarios. Neither carries truth layers: both are fully
//! visible to every member of a production's cast.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use troupe_core::entity::{Entity, EntityKind};
use uuid::Uuid;

/// A global setting. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    /// World identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
    /// Setting description.
    pub description: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A starting situation, holding only what the setup implies is public.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
    /// Situation description.
    pub description: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl World {
    /// Creates a world.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        name: impl Into<String>,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            description: description.into(),
            created_at,
        }
    }
}

impl Scenario {
    /// Creates a scenario.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        name: impl Into<String>,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            description: description.into(),
            created_at,
        }
    }
}

impl Entity for World {
    const KIND: EntityKind = EntityKind::World;

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

impl Entity for Scenario {
    const KIND: EntityKind = EntityKind::Scenario;

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
