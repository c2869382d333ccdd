//! Scripted completion client: replays canned stream chunks.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc;
use troupe_core::completion::{CompletionClient, CompletionRequest, CompletionStream};
use troupe_core::error::DomainError;

type Chunk = Result<String, DomainError>;

#[derive(Debug)]
enum Response {
    Chunks(Vec<Chunk>),
    Live(mpsc::UnboundedReceiver<Chunk>),
    Reject(DomainError),
}

/// A completion client that answers each request with the next scripted
/// response and records the requests it was sent. With no response left it
/// rejects the request.
#[derive(Debug, Default)]
pub struct ScriptedCompletionClient {
    responses: Mutex<VecDeque<Response>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletionClient {
    /// A client without scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a stream that yields `chunks` and then ends.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn respond(self, chunks: &[&str]) -> Self {
        let chunks = chunks.iter().map(|chunk| Ok((*chunk).to_owned())).collect();
        self.responses.lock().unwrap().push_back(Response::Chunks(chunks));
        self
    }

    /// Queue a stream that yields `chunks` and then fails with `error`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn respond_then_fail(self, chunks: &[&str], error: DomainError) -> Self {
        let mut items: Vec<Chunk> = chunks.iter().map(|chunk| Ok((*chunk).to_owned())).collect();
        items.push(Err(error));
        self.responses.lock().unwrap().push_back(Response::Chunks(items));
        self
    }

    /// Queue a rejection before any chunk is streamed.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn reject(self, error: DomainError) -> Self {
        self.responses.lock().unwrap().push_back(Response::Reject(error));
        self
    }

    /// Queue a stream fed by the test through the returned sender. The
    /// stream ends when the sender is dropped.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn respond_live(&self) -> mpsc::UnboundedSender<Chunk> {
        let (sender, receiver) = mpsc::unbounded();
        self.responses.lock().unwrap().push_back(Response::Live(receiver));
        sender
    }

    /// Every request received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream, DomainError> {
        self.requests.lock().unwrap().push(request);
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Response::Chunks(chunks)) => Ok(futures::stream::iter(chunks).boxed()),
            Some(Response::Live(receiver)) => Ok(receiver.boxed()),
            Some(Response::Reject(error)) => Err(error),
            None => Err(DomainError::Api("no scripted completion response left".into())),
        }
    }
}
