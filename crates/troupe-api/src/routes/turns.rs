//! Routes for navigating and pruning the turn tree.

use axum::extract::{Path, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Serialize;
use tracing::instrument;
use troupe_production::domain::Turn;
use troupe_production::domain::branch::TurnTree;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::{AppState, CurrentUser, Session};

/// Response body for DELETE /{id}.
#[derive(Debug, Serialize)]
pub struct DeletedTurns {
    /// The deleted turn first, then its descendants.
    pub removed: Vec<Uuid>,
}

/// The turn and every loaded turn of its production.
async fn with_siblings(session: &Session, turn_id: Uuid) -> Result<(Turn, Vec<Turn>), ApiError> {
    session.store.turns.list().await?;
    let turn = session.store.turns.require(turn_id)?;
    let siblings = session.store.turns_of(turn.production_id);
    Ok((turn, siblings))
}

/// GET /{id}/chain
///
/// Root-first path from the production's first turn to this one.
#[instrument(skip_all, fields(%user_id, %turn_id))]
async fn ancestor_chain(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(turn_id): Path<Uuid>,
) -> Result<Json<Vec<Turn>>, ApiError> {
    let session = state.session(user_id);
    let (_, siblings) = with_siblings(&session, turn_id).await?;
    let chain = TurnTree::new(&siblings).ancestor_chain(turn_id)?;
    Ok(Json(chain.into_iter().cloned().collect()))
}

/// GET /{id}/latest
///
/// The most recent turn in this turn's subtree, itself included.
#[instrument(skip_all, fields(%user_id, %turn_id))]
async fn latest_descendant(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(turn_id): Path<Uuid>,
) -> Result<Json<Turn>, ApiError> {
    let session = state.session(user_id);
    let (_, siblings) = with_siblings(&session, turn_id).await?;
    let latest = TurnTree::new(&siblings).latest_descendant(turn_id)?;
    Ok(Json(latest.clone()))
}

/// DELETE /{id}
#[instrument(skip_all, fields(%user_id, %turn_id))]
async fn delete_turn(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(turn_id): Path<Uuid>,
) -> Result<Json<DeletedTurns>, ApiError> {
    let session = state.session(user_id);
    let (turn, _) = with_siblings(&session, turn_id).await?;
    let removed = session.store.delete_turn(turn_id).await?;
    session.active.forget_any(turn.production_id, &removed);
    Ok(Json(DeletedTurns { removed }))
}

/// Returns the router for turns.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", delete(delete_turn))
        .route("/{id}/chain", get(ancestor_chain))
        .route("/{id}/latest", get(latest_descendant))
}
