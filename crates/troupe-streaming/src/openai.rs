//! OpenAI-compatible streaming chat completion client.

use std::collections::VecDeque;
use std::fmt::Display;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use troupe_core::completion::{
    ChatMessage, CompletionClient, CompletionRequest, CompletionStream, SamplingParameters,
};
use troupe_core::error::DomainError;
use troupe_core::truth::is_blank;

use crate::sse::SseDecoder;

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(flatten)]
    parameters: &'a SamplingParameters,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChunkBody {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<UpstreamError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamError {
    #[serde(default)]
    message: String,
}

/// Client for `POST {endpoint}/chat/completions` with `stream: true`.
#[derive(Debug, Clone, Default)]
pub struct OpenAiCompletionClient {
    http: reqwest::Client,
}

impl OpenAiCompletionClient {
    /// A client with its own connection pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A client sharing an existing connection pool.
    #[must_use]
    pub fn with_http(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    #[instrument(skip(self, request), fields(endpoint = %request.endpoint, model = %request.model))]
    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream, DomainError> {
        let url = format!(
            "{}/chat/completions",
            request.endpoint.trim_end_matches('/')
        );
        let body = ChatCompletionBody {
            model: &request.model,
            messages: &request.messages,
            stream: true,
            parameters: &request.parameters,
            response_format: request
                .json_object
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let mut builder = self.http.post(&url).json(&body);
        if let Some(key) = request.api_key.as_deref().filter(|key| !is_blank(key)) {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DomainError::Api(format!("completion request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DomainError::Api(format!(
                "completion API returned {status}: {detail}"
            )));
        }
        debug!(%status, "completion stream opened");

        Ok(deltas(response.bytes_stream().boxed()).boxed())
    }
}

struct Deltas<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

/// Turn an SSE byte stream of chat completion chunks into the text deltas
/// of the first choice. Ends at `[DONE]` or when the bytes end.
pub(crate) fn deltas<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, DomainError>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let state = Deltas {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };
    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(data) = state.pending.pop_front() {
                if data.trim() == "[DONE]" {
                    return None;
                }
                match parse_delta(&data) {
                    Ok(Some(text)) => return Some((Ok(text), state)),
                    Ok(None) => continue,
                    Err(err) => {
                        state.pending.clear();
                        state.finished = true;
                        return Some((Err(err), state));
                    }
                }
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(chunk.as_ref());
                    state.pending.extend(events);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    let err = DomainError::Stream(format!("completion stream interrupted: {err}"));
                    return Some((Err(err), state));
                }
                None => {
                    state.finished = true;
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                }
            }
        }
    })
}

fn parse_delta(data: &str) -> Result<Option<String>, DomainError> {
    let chunk: ChunkBody = serde_json::from_str(data)
        .map_err(|e| DomainError::StreamParse(format!("malformed completion chunk: {e}")))?;
    if let Some(error) = chunk.error {
        return Err(DomainError::Api(format!(
            "completion API reported: {}",
            error.message
        )));
    }
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty()))
}
