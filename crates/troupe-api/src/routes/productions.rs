//! Routes for productions: creation, turn triggering, the active leaf and
//! the live turn event stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, instrument, warn};
use troupe_core::error::DomainError;
use troupe_core::truth::is_blank;
use troupe_production::domain::branch::TurnTree;
use troupe_production::domain::{Production, Turn};
use troupe_streaming::TurnTrigger;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::{AppState, CurrentUser, Session};

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateProductionRequest {
    /// Display name.
    pub name: String,
    /// The setting.
    #[serde(default)]
    pub world_id: Option<Uuid>,
    /// The starting situation.
    #[serde(default)]
    pub scenario_id: Option<Uuid>,
    /// Participating assistants.
    #[serde(default)]
    pub assistant_ids: Vec<Uuid>,
    /// Additional visible personas.
    #[serde(default)]
    pub persona_ids: Vec<Uuid>,
    /// Visible relations.
    #[serde(default)]
    pub relation_ids: Vec<Uuid>,
}

/// The active leaf of a production.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveTurn {
    /// `None` while the production has no turns.
    pub turn_id: Option<Uuid>,
}

async fn require_production(session: &Session, production_id: Uuid) -> Result<(), ApiError> {
    session.store.productions.list().await?;
    session.store.productions.require(production_id)?;
    Ok(())
}

/// Loaded turns of a production in creation order.
async fn turns_of(session: &Session, production_id: Uuid) -> Result<Vec<Turn>, ApiError> {
    require_production(session, production_id).await?;
    session.store.turns.list().await?;
    let mut turns = session.store.turns_of(production_id);
    turns.sort_by_key(|turn| (turn.created_at, turn.id));
    Ok(turns)
}

/// GET /
#[instrument(skip_all, fields(%user_id))]
async fn list_productions(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<Production>>, ApiError> {
    let session = state.session(user_id);
    Ok(Json(session.store.productions.list().await?))
}

/// POST /
#[instrument(skip_all, fields(%user_id, name = %request.name))]
async fn create_production(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<CreateProductionRequest>,
) -> Result<(StatusCode, Json<Production>), ApiError> {
    if is_blank(&request.name) {
        return Err(DomainError::Validation("name must not be blank".to_owned()).into());
    }
    let mut production = Production::new(user_id, request.name, state.clock.now());
    production.world_id = request.world_id;
    production.scenario_id = request.scenario_id;
    production.assistant_ids = request.assistant_ids;
    production.persona_ids = request.persona_ids;
    production.relation_ids = request.relation_ids;

    let session = state.session(user_id);
    let production = session.store.create_production(production).await?;
    info!(production_id = %production.id, "production created");
    Ok((StatusCode::CREATED, Json(production)))
}

/// POST /{id}/turns
///
/// Records the optional user performance, streams the assistant's reply and
/// answers with the persisted assistant turn.
#[instrument(
    skip_all,
    fields(%user_id, %production_id, assistant_id = %trigger.assistant_id)
)]
async fn trigger_turn(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(production_id): Path<Uuid>,
    Json(trigger): Json<TurnTrigger>,
) -> Result<Json<Turn>, ApiError> {
    let session = state.session(user_id);
    let turn = state
        .engine
        .trigger(
            &session.store,
            &session.active,
            production_id,
            trigger,
            state.shutdown.child_token(),
        )
        .await?;
    Ok(Json(turn))
}

/// GET /{id}/turns
#[instrument(skip_all, fields(%user_id, %production_id))]
async fn list_turns(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(production_id): Path<Uuid>,
) -> Result<Json<Vec<Turn>>, ApiError> {
    let session = state.session(user_id);
    Ok(Json(turns_of(&session, production_id).await?))
}

/// GET /{id}/active
#[instrument(skip_all, fields(%user_id, %production_id))]
async fn active_turn(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(production_id): Path<Uuid>,
) -> Result<Json<ActiveTurn>, ApiError> {
    let session = state.session(user_id);
    require_production(&session, production_id).await?;
    session.store.turns.list().await?;
    let turns = session.store.settled_turns_of(production_id);
    let leaf = TurnTree::new(&turns).active_leaf(session.active.get(production_id));
    Ok(Json(ActiveTurn {
        turn_id: leaf.map(|turn| turn.id),
    }))
}

/// PUT /{id}/active
#[instrument(skip_all, fields(%user_id, %production_id))]
async fn set_active_turn(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(production_id): Path<Uuid>,
    Json(request): Json<ActiveTurn>,
) -> Result<Json<ActiveTurn>, ApiError> {
    let Some(turn_id) = request.turn_id else {
        return Err(DomainError::Validation("turn_id is required".to_owned()).into());
    };
    let session = state.session(user_id);
    require_production(&session, production_id).await?;
    session.store.turns.list().await?;
    let turn = session.store.turns.require(turn_id)?;
    if turn.production_id != production_id {
        return Err(DomainError::Validation(format!(
            "turn {turn_id} belongs to another production"
        ))
        .into());
    }
    if session.store.turns.is_pending(turn_id) {
        return Err(
            DomainError::Validation(format!("turn {turn_id} is still being written")).into(),
        );
    }
    session.active.set(production_id, turn_id);
    Ok(Json(ActiveTurn {
        turn_id: Some(turn_id),
    }))
}

/// GET /{id}/events
///
/// Server-sent turn events of one production. Subscribers that fall behind
/// skip the missed events. The stream ends on shutdown.
#[instrument(skip_all, fields(%user_id, %production_id))]
async fn stream_events(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(production_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session = state.session(user_id);
    require_production(&session, production_id).await?;

    let receiver = state.engine.subscribe();
    let stream = futures::stream::unfold(receiver, move |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) if event.production_id() == production_id => {
                    match Event::default().event(event.name()).json_data(&event) {
                        Ok(sse) => return Some((Ok::<_, Infallible>(sse), receiver)),
                        Err(err) => warn!(error = %err, "failed to encode turn event"),
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%production_id, skipped, "turn event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .take_until(state.shutdown.clone().cancelled_owned());

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(10))
            .text("keepalive"),
    ))
}

/// Returns the router for productions.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_productions).post(create_production))
        .route("/{id}/turns", get(list_turns).post(trigger_turn))
        .route("/{id}/active", get(active_turn).put(set_active_turn))
        .route("/{id}/events", get(stream_events))
}
