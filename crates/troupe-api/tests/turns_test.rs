//! Integration tests for triggering, observing and navigating turns.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::StatusCode;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use troupe_core::error::DomainError;
use troupe_test_support::ScriptedCompletionClient;

const REPLY: &str = r#"{"performance":"I have nothing to hide.","meta":"lying"}"#;

fn replying(replies: &[&str]) -> Arc<ScriptedCompletionClient> {
    let mut client = ScriptedCompletionClient::new();
    for reply in replies {
        client = client.respond(&[*reply]);
    }
    Arc::new(client)
}

fn ids(body: &Value) -> Vec<String> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|turn| turn["id"].as_str().unwrap().to_owned())
        .collect()
}

async fn read_until(body: &mut Body, event: &str) -> String {
    let marker = format!("event: {event}");
    let mut text = String::new();
    while !text.contains(&marker) {
        let frame = body.frame().await.unwrap().unwrap();
        if let Ok(data) = frame.into_data() {
            text.push_str(std::str::from_utf8(&data).unwrap());
        }
    }
    text
}

#[tokio::test]
async fn test_trigger_records_user_turn_then_reply() {
    // Arrange
    let (app, _) = common::build_test_app(replying(&[REPLY]));
    let seeded = common::seed_production(&app).await;
    let uri = format!("/api/v1/productions/{}/turns", seeded.production_id);

    // Act
    let (status, reply) = common::post_json(
        app.clone(),
        &uri,
        &json!({
            "assistant_id": seeded.bob_assistant,
            "performance": "Tell me about your week."
        }),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["role"], "assistant");
    assert_eq!(reply["assistant_id"], seeded.bob_assistant.as_str());
    assert_eq!(reply["content"]["performance"], "I have nothing to hide.");
    assert_eq!(reply["content"]["meta"], "lying");

    let (_, turns) = common::get_json(app.clone(), &uri).await;
    assert_eq!(turns.as_array().unwrap().len(), 2);
    assert_eq!(turns[0]["role"], "user");
    assert_eq!(turns[0]["content"]["performance"], "Tell me about your week.");
    assert_eq!(reply["parent_id"], turns[0]["id"]);

    let active = format!("/api/v1/productions/{}/active", seeded.production_id);
    let (_, marker) = common::get_json(app, &active).await;
    assert_eq!(marker["turn_id"], reply["id"]);
}

#[tokio::test]
async fn test_chain_follows_the_conversation() {
    // Arrange
    let (app, _) = common::build_test_app(replying(&[REPLY, r#"{"performance":"Noted."}"#]));
    let seeded = common::seed_production(&app).await;
    let uri = format!("/api/v1/productions/{}/turns", seeded.production_id);
    let (_, first) = common::post_json(
        app.clone(),
        &uri,
        &json!({ "assistant_id": seeded.bob_assistant, "performance": "Hello, Bob." }),
    )
    .await;

    // Act
    let (_, second) = common::post_json(
        app.clone(),
        &uri,
        &json!({ "assistant_id": seeded.alice_assistant }),
    )
    .await;
    let chain = format!("/api/v1/turns/{}/chain", second["id"].as_str().unwrap());
    let (status, chain) = common::get_json(app, &chain).await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chain.as_array().unwrap().len(), 3);
    assert_eq!(chain[1]["id"], first["id"]);
    assert_eq!(chain[2]["content"]["performance"], "Noted.");
}

#[tokio::test]
async fn test_explicit_parent_starts_a_sibling_branch() {
    // Arrange
    let (app, _) = common::build_test_app(replying(&[REPLY, r#"{"performance":"Fine."}"#]));
    let seeded = common::seed_production(&app).await;
    let uri = format!("/api/v1/productions/{}/turns", seeded.production_id);
    let (_, first) = common::post_json(
        app.clone(),
        &uri,
        &json!({ "assistant_id": seeded.bob_assistant, "performance": "How are you?" }),
    )
    .await;
    let question = first["parent_id"].clone();

    // Act
    let (_, retry) = common::post_json(
        app.clone(),
        &uri,
        &json!({ "assistant_id": seeded.bob_assistant, "parent_id": question }),
    )
    .await;

    // Assert
    assert_eq!(retry["parent_id"], question);
    assert_ne!(retry["id"], first["id"]);
    let latest = format!("/api/v1/turns/{}/latest", question.as_str().unwrap());
    let (_, latest) = common::get_json(app, &latest).await;
    assert_eq!(latest["id"], retry["id"]);
}

#[tokio::test]
async fn test_upstream_failure_is_502_and_keeps_only_the_user_turn() {
    // Arrange
    let client = ScriptedCompletionClient::new().reject(DomainError::Api("upstream down".into()));
    let (app, _) = common::build_test_app(Arc::new(client));
    let seeded = common::seed_production(&app).await;
    let uri = format!("/api/v1/productions/{}/turns", seeded.production_id);

    // Act
    let (status, error) = common::post_json(
        app.clone(),
        &uri,
        &json!({ "assistant_id": seeded.bob_assistant, "performance": "Anyone there?" }),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(error["error"], "api_error");
    let (_, turns) = common::get_json(app, &uri).await;
    assert_eq!(turns.as_array().unwrap().len(), 1);
    assert_eq!(turns[0]["role"], "user");
}

#[tokio::test]
async fn test_unknown_assistant_is_404_without_side_effects() {
    let (app, _) = common::build_test_app(replying(&[REPLY]));
    let seeded = common::seed_production(&app).await;
    let uri = format!("/api/v1/productions/{}/turns", seeded.production_id);

    let (status, _) = common::post_json(
        app.clone(),
        &uri,
        &json!({ "assistant_id": uuid::Uuid::from_u128(404), "performance": "Hello?" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, turns) = common::get_json(app, &uri).await;
    assert_eq!(turns, json!([]));
}

#[tokio::test]
async fn test_deleting_a_turn_removes_its_reply_and_resets_active_leaf() {
    // Arrange
    let (app, _) = common::build_test_app(replying(&[REPLY]));
    let seeded = common::seed_production(&app).await;
    let uri = format!("/api/v1/productions/{}/turns", seeded.production_id);
    let (_, reply) = common::post_json(
        app.clone(),
        &uri,
        &json!({ "assistant_id": seeded.bob_assistant, "performance": "Sit down." }),
    )
    .await;
    let question = reply["parent_id"].as_str().unwrap().to_owned();

    // Act
    let (status, deleted) =
        common::delete_json(app.clone(), &format!("/api/v1/turns/{question}")).await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["removed"], json!([question, reply["id"]]));
    let (_, turns) = common::get_json(app.clone(), &uri).await;
    assert!(ids(&turns).is_empty());
    let active = format!("/api/v1/productions/{}/active", seeded.production_id);
    let (_, marker) = common::get_json(app, &active).await;
    assert_eq!(marker["turn_id"], Value::Null);
}

#[tokio::test]
async fn test_event_stream_reports_live_progress() {
    // Arrange
    let (app, _) = common::build_test_app(replying(&[REPLY]));
    let seeded = common::seed_production(&app).await;
    let events = common::request(
        "GET",
        &format!("/api/v1/productions/{}/events", seeded.production_id),
        None,
    );
    let response = app.clone().oneshot(events).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body();

    // Act
    let (_, reply) = common::post_json(
        app,
        &format!("/api/v1/productions/{}/turns", seeded.production_id),
        &json!({ "assistant_id": seeded.bob_assistant }),
    )
    .await;
    let text = tokio::time::timeout(Duration::from_secs(5), read_until(&mut body, "persisted"))
        .await
        .expect("persisted event within five seconds");

    // Assert
    let started = text.find("event: started").unwrap();
    let updated = text.find("event: field_updated").unwrap();
    let persisted = text.find("event: persisted").unwrap();
    assert!(started < updated && updated < persisted);
    assert!(text.contains("I have nothing to hide."));
    assert!(text.contains(reply["id"].as_str().unwrap()));
}

#[tokio::test]
async fn test_event_stream_of_unknown_production_is_404() {
    let (app, _) = common::build_test_app(replying(&[]));

    let (status, _) = common::get_json(
        app,
        &format!("/api/v1/productions/{}/events", uuid::Uuid::from_u128(9)),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
