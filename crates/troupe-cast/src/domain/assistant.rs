//! Assistants: a persona performed by a model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use troupe_core::completion::SamplingParameters;
use troupe_core::entity::{Entity, EntityKind};
use uuid::Uuid;

use super::model::Model;

/// Pairing of exactly one persona with exactly one model. Unique per
/// (persona, model) for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assistant {
    /// Assistant identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// The persona this assistant performs.
    pub persona_id: Uuid,
    /// The model connection driving it.
    pub model_id: Uuid,
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Overrides applied on top of the model's defaults.
    #[serde(default)]
    pub parameters: SamplingParameters,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Assistant {
    /// Creates an unnamed assistant without overrides.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        persona_id: Uuid,
        model_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            persona_id,
            model_id,
            name: None,
            parameters: SamplingParameters::default(),
            created_at,
        }
    }

    /// The parameters to send for this assistant on `model`.
    #[must_use]
    pub fn effective_parameters(&self, model: &Model) -> SamplingParameters {
        model.parameters.merged_with(&self.parameters)
    }
}

impl Entity for Assistant {
    const KIND: EntityKind = EntityKind::Assistant;

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
