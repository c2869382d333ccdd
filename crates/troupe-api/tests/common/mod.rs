//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use troupe_cast::domain::{Assistant, Model, Persona, Relation};
use troupe_entity_store::{NoAvatarStorage, Repositories};
use troupe_production::domain::{Production, Scenario, Turn, World};
use troupe_streaming::{StreamConfig, TurnEngine};
use troupe_test_support::fixtures::fixed_time;
use troupe_test_support::{FixedClock, InMemoryRepository, ScriptedCompletionClient};
use uuid::Uuid;

use troupe_api::state::{AppState, USER_HEADER};

/// The user every helper request is sent as.
pub const USER: Uuid = Uuid::from_u128(7);

/// Build the full app over empty in-memory repositories, answering turns
/// through `client`. Uses the same router as `main.rs`.
pub fn build_test_app(client: Arc<ScriptedCompletionClient>) -> (Router, AppState) {
    let repositories = Repositories {
        personas: Arc::new(InMemoryRepository::<Persona>::new()),
        relations: Arc::new(InMemoryRepository::<Relation>::new()),
        models: Arc::new(InMemoryRepository::<Model>::new()),
        assistants: Arc::new(InMemoryRepository::<Assistant>::new()),
        worlds: Arc::new(InMemoryRepository::<World>::new()),
        scenarios: Arc::new(InMemoryRepository::<Scenario>::new()),
        productions: Arc::new(InMemoryRepository::<Production>::new()),
        turns: Arc::new(InMemoryRepository::<Turn>::new()),
    };
    let clock = Arc::new(FixedClock::ticking(fixed_time(), chrono::Duration::seconds(1)));
    let engine = TurnEngine::new(client, clock.clone(), StreamConfig::default());
    let state = AppState::new(repositories, Arc::new(NoAvatarStorage), Arc::new(engine), clock);
    (troupe_api::app(state.clone()), state)
}

/// A request from [`USER`].
pub fn request(method: &str, uri: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(USER_HEADER, USER.to_string());
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(app: Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    send(app, request("POST", uri, Some(body))).await
}

/// Send a PUT request with a JSON body and return the response.
pub async fn put_json(app: Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    send(app, request("PUT", uri, Some(body))).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, request("GET", uri, None)).await
}

/// Send a DELETE request and return the response.
pub async fn delete_json(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, request("DELETE", uri, None)).await
}

/// Ids created by [`seed_production`].
pub struct Seeded {
    pub production_id: String,
    pub alice_assistant: String,
    pub bob_assistant: String,
}

fn id_of(body: &Value) -> String {
    body["id"].as_str().unwrap().to_owned()
}

/// Create two personas on one model, an assistant for each and a production
/// casting both, all through the API.
pub async fn seed_production(app: &Router) -> Seeded {
    let (_, model) = post_json(
        app.clone(),
        "/api/v1/models",
        &json!({
            "name": "Local",
            "endpoint": "http://localhost:11434/v1",
            "upstream_model": "llama3",
            "is_default": true
        }),
    )
    .await;

    let mut assistants = Vec::new();
    for (name, universal, internal, external) in [
        ("Alice", "a therapist", "anxious", "composed"),
        ("Bob", "a patient", "an undercover cop", "nervous"),
    ] {
        let (_, persona) = post_json(
            app.clone(),
            "/api/v1/personas",
            &json!({
                "name": name,
                "universal": universal,
                "internal": internal,
                "external": external
            }),
        )
        .await;
        let (_, assistant) = post_json(
            app.clone(),
            "/api/v1/assistants",
            &json!({ "persona_id": id_of(&persona), "model_id": id_of(&model) }),
        )
        .await;
        assistants.push(id_of(&assistant));
    }

    let (_, production) = post_json(
        app.clone(),
        "/api/v1/productions",
        &json!({ "name": "Session One", "assistant_ids": assistants }),
    )
    .await;

    Seeded {
        production_id: id_of(&production),
        alice_assistant: assistants[0].clone(),
        bob_assistant: assistants[1].clone(),
    }
}
