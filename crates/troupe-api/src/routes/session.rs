//! Per-user session lifecycle.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::delete;
use tracing::{info, instrument};

use crate::state::{AppState, CurrentUser};

/// DELETE /session
///
/// Drops the caller's cached entities and active-leaf markers. Idempotent.
#[instrument(skip_all, fields(%user_id))]
async fn end_session(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> StatusCode {
    if state.end_session(user_id) {
        info!("session ended");
    }
    StatusCode::NO_CONTENT
}

/// Returns the session router.
pub fn router() -> Router<AppState> {
    Router::new().route("/session", delete(end_session))
}
