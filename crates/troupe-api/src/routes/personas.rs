//! Routes for personas.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use troupe_cast::domain::Persona;
use troupe_core::error::DomainError;
use troupe_core::truth::{Truth, is_blank};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::{AppState, CurrentUser};

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreatePersonaRequest {
    /// Display name.
    pub name: String,
    /// What everyone knows.
    #[serde(default)]
    pub universal: String,
    /// What only insiders know.
    #[serde(default)]
    pub internal: String,
    /// What outsiders are shown.
    #[serde(default)]
    pub external: String,
    /// Storage key of an already uploaded avatar.
    #[serde(default)]
    pub avatar: Option<String>,
}

/// GET /
#[instrument(skip_all, fields(%user_id))]
async fn list_personas(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<Persona>>, ApiError> {
    let session = state.session(user_id);
    Ok(Json(session.store.personas.list().await?))
}

/// POST /
#[instrument(skip_all, fields(%user_id, name = %request.name))]
async fn create_persona(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<CreatePersonaRequest>,
) -> Result<(StatusCode, Json<Persona>), ApiError> {
    if is_blank(&request.name) {
        return Err(DomainError::Validation("name must not be blank".to_owned()).into());
    }
    let truth = Truth::new(request.universal, request.internal, request.external);
    let mut persona = Persona::new(user_id, request.name, truth, state.clock.now());
    persona.avatar = request.avatar;

    let session = state.session(user_id);
    let persona = session.store.personas.create(persona).await?;
    info!(persona_id = %persona.id, "persona created");
    Ok((StatusCode::CREATED, Json(persona)))
}

/// DELETE /{id}
///
/// Also removes the persona's assistants, relation memberships and avatar.
#[instrument(skip_all, fields(%user_id, %persona_id))]
async fn delete_persona(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(persona_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let session = state.session(user_id);
    session.store.delete_persona(persona_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the router for personas.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_personas).post(create_persona))
        .route("/{id}", delete(delete_persona))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use troupe_test_support::fixtures::{assistant, model, persona};
    use troupe_test_support::{InMemoryRepository, ScriptedCompletionClient};

    use super::*;
    use crate::routes::testing::{self, USER, send};

    #[tokio::test]
    async fn test_create_persona_returns_201_with_truth_layers() {
        let app = router().with_state(testing::empty_state());
        let body = json!({
            "name": "Alice",
            "universal": "a therapist",
            "internal": "anxious",
            "external": "composed"
        });

        let (status, created) = send(app, "POST", "/", Some(body)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "Alice");
        assert_eq!(created["truth"]["internal"], "anxious");
        assert_eq!(created["user_id"], USER.to_string());
    }

    #[tokio::test]
    async fn test_create_persona_without_name_is_400() {
        let app = router().with_state(testing::empty_state());

        let (status, _) = send(app, "POST", "/", Some(json!({ "name": "" }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_deleting_a_persona_removes_its_assistants() {
        // Arrange
        let bob = persona(USER, "Bob", "", "", "");
        let llama = model(USER, "llama");
        let mut repositories = testing::empty_repositories();
        repositories.personas = Arc::new(InMemoryRepository::with_rows(vec![bob.clone()]));
        repositories.models = Arc::new(InMemoryRepository::with_rows(vec![llama.clone()]));
        repositories.assistants =
            Arc::new(InMemoryRepository::with_rows(vec![assistant(&bob, &llama)]));
        let state = testing::state_with(repositories, Arc::new(ScriptedCompletionClient::new()));
        let app = router().with_state(state.clone());

        // Act
        let (status, _) = send(app.clone(), "DELETE", &format!("/{}", bob.id), None).await;
        let (_, listed) = send(app, "GET", "/", None).await;

        // Assert
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(listed, json!([]));
        assert!(state.session(USER).store.assistants.cached().is_empty());
    }

    #[tokio::test]
    async fn test_deleting_an_unknown_persona_is_404() {
        let app = router().with_state(testing::empty_state());

        let (status, error) = send(app, "DELETE", &format!("/{}", Uuid::from_u128(9)), None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["error"], "not_found");
    }

    #[tokio::test]
    async fn test_missing_user_header_is_400() {
        let app = router().with_state(testing::empty_state());
        let request = axum::http::Request::builder()
            .uri("/")
            .body(axum::body::Body::empty())
            .unwrap();

        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
