//! Model connection descriptors.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use troupe_core::completion::SamplingParameters;
use troupe_core::entity::{Entity, EntityKind};
use uuid::Uuid;

/// An OpenAI-compatible API connection.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
    /// Base URL of the API, e.g. `https://api.openai.com/v1`.
    pub endpoint: String,
    /// Bearer secret. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Upstream model identifier, e.g. `gpt-4o`.
    pub upstream_model: String,
    /// At most one model per user carries this flag.
    #[serde(default)]
    pub is_default: bool,
    /// Default sampling parameters for assistants on this model.
    #[serde(default)]
    pub parameters: SamplingParameters,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Creates a non-default model without parameters.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        name: impl Into<String>,
        endpoint: impl Into<String>,
        upstream_model: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            endpoint: endpoint.into(),
            api_key: None,
            upstream_model: upstream_model.into(),
            is_default: false,
            parameters: SamplingParameters::default(),
            created_at,
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("upstream_model", &self.upstream_model)
            .field("is_default", &self.is_default)
            .field("parameters", &self.parameters)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Entity for Model {
    const KIND: EntityKind = EntityKind::Model;

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
