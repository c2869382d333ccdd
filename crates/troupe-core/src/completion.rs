//! Seam to an OpenAI-compatible chat completion API.

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Author role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Setup and instructions.
    System,
    /// Input the model reacts to.
    User,
    /// The model's own earlier output.
    Assistant,
}

/// One message submitted to the completion API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who authored the message.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A `system` message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// A `user` message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// An `assistant` message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Optional sampling parameters. `None` leaves the upstream default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParameters {
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling mass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Upper bound on generated tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Presence penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Frequency penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
}

impl SamplingParameters {
    /// Field-wise merge where values set on `overrides` win.
    #[must_use]
    pub fn merged_with(self, overrides: &Self) -> Self {
        Self {
            temperature: overrides.temperature.or(self.temperature),
            top_p: overrides.top_p.or(self.top_p),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            presence_penalty: overrides.presence_penalty.or(self.presence_penalty),
            frequency_penalty: overrides.frequency_penalty.or(self.frequency_penalty),
        }
    }
}

/// A streamed completion request.
#[derive(Clone, PartialEq)]
pub struct CompletionRequest {
    /// Base URL of the OpenAI-compatible API (without `/chat/completions`).
    pub endpoint: String,
    /// Bearer token, if the endpoint requires one.
    pub api_key: Option<String>,
    /// Upstream model identifier.
    pub model: String,
    /// Assembled context.
    pub messages: Vec<ChatMessage>,
    /// Sampling parameters.
    pub parameters: SamplingParameters,
    /// Ask the upstream to constrain output to a JSON object.
    pub json_object: bool,
}

impl fmt::Debug for CompletionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionRequest")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("messages", &self.messages.len())
            .field("parameters", &self.parameters)
            .field("json_object", &self.json_object)
            .finish()
    }
}

/// Text deltas of a streamed completion, in arrival order.
pub type CompletionStream = BoxStream<'static, Result<String, DomainError>>;

/// Client for a streaming chat completion endpoint.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Submit `request` and return the stream of content deltas.
    ///
    /// The concatenation of all deltas is the model's full output.
    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream, DomainError>;
}
