//! Integration tests for the health endpoint, request identity and sessions.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use troupe_test_support::ScriptedCompletionClient;

#[tokio::test]
async fn test_health_check_under_api_prefix() {
    let (app, _) = common::build_test_app(Arc::new(ScriptedCompletionClient::new()));

    let (status, json) = common::get_json(app, "/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_users_do_not_see_each_others_entities() {
    // Arrange
    let (app, _) = common::build_test_app(Arc::new(ScriptedCompletionClient::new()));
    common::seed_production(&app).await;
    let request = axum::http::Request::builder()
        .uri("/api/v1/personas")
        .header("x-user-id", uuid::Uuid::from_u128(8).to_string())
        .body(axum::body::Body::empty())
        .unwrap();

    // Act
    let response = tower::ServiceExt::oneshot(app.clone(), request).await.unwrap();
    let (_, own) = common::get_json(app, "/api/v1/personas").await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"[]");
    assert_eq!(own.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_ended_session_reloads_from_the_repositories() {
    // Arrange
    let (app, state) = common::build_test_app(Arc::new(ScriptedCompletionClient::new()));
    common::seed_production(&app).await;

    // Act
    let (status, _) = common::delete_json(app.clone(), "/api/v1/session").await;
    let held = state.session_count();
    let (_, personas) = common::get_json(app, "/api/v1/personas").await;

    // Assert
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(held, 0);
    assert_eq!(personas.as_array().unwrap().len(), 2);
    assert_eq!(state.session_count(), 1);
}
