//! Troupe — HTTP API.
//!
//! Exposes turn triggering, live turn events, the turn tree and thin entity
//! CRUD over the per-user entity stores held in [`state::AppState`].

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::Router;

use crate::state::AppState;

/// The full router, every route under `/api/v1`.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::health::router())
        .merge(routes::session::router())
        .nest("/productions", routes::productions::router())
        .nest("/turns", routes::turns::router())
        .nest("/assistants", routes::assistants::router())
        .nest("/models", routes::models::router())
        .nest("/personas", routes::personas::router());

    Router::new().nest("/api/v1", api).with_state(state)
}
