//! Routes for assistants and their context preview.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use troupe_cast::domain::Assistant;
use troupe_context::{AssembledContext, ContextAssembler};
use troupe_core::completion::SamplingParameters;
use troupe_core::error::DomainError;
use troupe_production::domain::branch::TurnTree;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::{AppState, CurrentUser};

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateAssistantRequest {
    /// The persona to perform.
    pub persona_id: Uuid,
    /// The model connection to drive it.
    pub model_id: Uuid,
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Overrides on top of the model's defaults.
    #[serde(default)]
    pub parameters: SamplingParameters,
}

/// Query string for GET /{id}/context.
#[derive(Debug, Deserialize)]
pub struct ContextQuery {
    /// History leaf. Its production is used when `production_id` is absent.
    #[serde(default)]
    pub turn_id: Option<Uuid>,
    /// Production to assemble for, from its active leaf when `turn_id` is
    /// absent.
    #[serde(default)]
    pub production_id: Option<Uuid>,
}

/// GET /
#[instrument(skip_all, fields(%user_id))]
async fn list_assistants(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<Assistant>>, ApiError> {
    let session = state.session(user_id);
    Ok(Json(session.store.assistants.list().await?))
}

/// POST /
#[instrument(skip_all, fields(%user_id, persona_id = %request.persona_id))]
async fn create_assistant(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<CreateAssistantRequest>,
) -> Result<(StatusCode, Json<Assistant>), ApiError> {
    let mut assistant =
        Assistant::new(user_id, request.persona_id, request.model_id, state.clock.now());
    assistant.name = request.name;
    assistant.parameters = request.parameters;

    let session = state.session(user_id);
    let assistant = session.store.create_assistant(assistant).await?;
    info!(assistant_id = %assistant.id, "assistant created");
    Ok((StatusCode::CREATED, Json(assistant)))
}

/// GET /{id}/context
///
/// The exact messages the assistant would be sent, without calling the
/// model.
#[instrument(skip_all, fields(%user_id, %assistant_id))]
async fn preview_context(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(assistant_id): Path<Uuid>,
    Query(query): Query<ContextQuery>,
) -> Result<Json<AssembledContext>, ApiError> {
    let session = state.session(user_id);
    session.store.load_all().await?;

    let (production_id, leaf) = match (query.turn_id, query.production_id) {
        (Some(turn_id), production_id) => {
            let turn = session.store.turns.require(turn_id)?;
            if production_id.is_some_and(|id| id != turn.production_id) {
                return Err(DomainError::Validation(format!(
                    "turn {turn_id} belongs to another production"
                ))
                .into());
            }
            (turn.production_id, Some(turn_id))
        }
        (None, Some(production_id)) => {
            let turns = session.store.settled_turns_of(production_id);
            let leaf = TurnTree::new(&turns).active_leaf(session.active.get(production_id));
            (production_id, leaf.map(|turn| turn.id))
        }
        (None, None) => {
            return Err(DomainError::Validation(
                "turn_id or production_id is required".to_owned(),
            )
            .into());
        }
    };

    let context =
        ContextAssembler::new(&session.store).assemble(production_id, assistant_id, leaf)?;
    Ok(Json(context))
}

/// Returns the router for assistants.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_assistants).post(create_assistant))
        .route("/{id}/context", get(preview_context))
}
