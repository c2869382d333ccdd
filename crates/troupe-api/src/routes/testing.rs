//! In-memory application state for route tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use troupe_cast::domain::{Assistant, Model, Persona, Relation};
use troupe_entity_store::{NoAvatarStorage, Repositories};
use troupe_production::domain::{Production, Scenario, Turn, World};
use troupe_streaming::{StreamConfig, TurnEngine};
use troupe_test_support::fixtures::fixed_time;
use troupe_test_support::{FixedClock, InMemoryRepository, ScriptedCompletionClient};
use uuid::Uuid;

use crate::state::{AppState, USER_HEADER};

pub(crate) const USER: Uuid = Uuid::from_u128(7);

pub(crate) fn empty_repositories() -> Repositories {
    Repositories {
        personas: Arc::new(InMemoryRepository::<Persona>::new()),
        relations: Arc::new(InMemoryRepository::<Relation>::new()),
        models: Arc::new(InMemoryRepository::<Model>::new()),
        assistants: Arc::new(InMemoryRepository::<Assistant>::new()),
        worlds: Arc::new(InMemoryRepository::<World>::new()),
        scenarios: Arc::new(InMemoryRepository::<Scenario>::new()),
        productions: Arc::new(InMemoryRepository::<Production>::new()),
        turns: Arc::new(InMemoryRepository::<Turn>::new()),
    }
}

pub(crate) fn state_with(
    repositories: Repositories,
    client: Arc<ScriptedCompletionClient>,
) -> AppState {
    let clock = Arc::new(FixedClock::ticking(fixed_time(), chrono::Duration::seconds(1)));
    let engine = TurnEngine::new(client, clock.clone(), StreamConfig::default());
    AppState::new(repositories, Arc::new(NoAvatarStorage), Arc::new(engine), clock)
}

pub(crate) fn empty_state() -> AppState {
    state_with(empty_repositories(), Arc::new(ScriptedCompletionClient::new()))
}

/// Send a request as [`USER`] and decode the JSON answer; an empty body
/// decodes to `Value::Null`.
pub(crate) async fn send(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(USER_HEADER, USER.to_string());
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}
