//! Routes for model connections.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use troupe_cast::domain::Model;
use troupe_core::completion::SamplingParameters;
use troupe_core::error::DomainError;
use troupe_core::truth::is_blank;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::{AppState, CurrentUser};

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateModelRequest {
    /// Display name.
    pub name: String,
    /// Base URL of the OpenAI-compatible API.
    pub endpoint: String,
    /// Upstream model identifier.
    pub upstream_model: String,
    /// Bearer secret, omitted for keyless local servers.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Make this the user's default model.
    #[serde(default)]
    pub is_default: bool,
    /// Default sampling parameters.
    #[serde(default)]
    pub parameters: SamplingParameters,
}

/// GET /
#[instrument(skip_all, fields(%user_id))]
async fn list_models(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<Model>>, ApiError> {
    let session = state.session(user_id);
    Ok(Json(session.store.models.list().await?))
}

/// POST /
#[instrument(skip_all, fields(%user_id, name = %request.name))]
async fn create_model(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<CreateModelRequest>,
) -> Result<(StatusCode, Json<Model>), ApiError> {
    for (field, value) in [
        ("name", &request.name),
        ("endpoint", &request.endpoint),
        ("upstream_model", &request.upstream_model),
    ] {
        if is_blank(value) {
            return Err(DomainError::Validation(format!("{field} must not be blank")).into());
        }
    }

    let mut model = Model::new(
        user_id,
        request.name,
        request.endpoint,
        request.upstream_model,
        state.clock.now(),
    );
    model.api_key = request.api_key.filter(|key| !is_blank(key));
    model.is_default = request.is_default;
    model.parameters = request.parameters;

    let session = state.session(user_id);
    let model = session.store.create_model(model).await?;
    info!(model_id = %model.id, "model created");
    Ok((StatusCode::CREATED, Json(model)))
}

/// DELETE /{id}
#[instrument(skip_all, fields(%user_id, %model_id))]
async fn delete_model(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(model_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let session = state.session(user_id);
    session.store.delete_model(model_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the router for model connections.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_models).post(create_model))
        .route("/{id}", delete(delete_model))
}
