//! Troupe API server entry point.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use troupe_api::config::ServerConfig;
use troupe_api::error::AppError;
use troupe_api::state::AppState;
use troupe_api::telemetry;
use troupe_core::clock::SystemClock;
use troupe_entity_store::NoAvatarStorage;
use troupe_streaming::{OpenAiCompletionClient, TurnEngine};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = ServerConfig::from_env()?;
    let provider = telemetry::init(config.otlp_endpoint.as_deref())?;

    info!("Starting Troupe API server");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    troupe_store_pg::run_migrations(&pool)
        .await
        .map_err(sqlx::Error::from)?;

    let clock = Arc::new(SystemClock);
    let engine = TurnEngine::new(
        Arc::new(OpenAiCompletionClient::new()),
        clock.clone(),
        config.stream,
    );
    let state = AppState::new(
        troupe_store_pg::repositories(&pool),
        Arc::new(NoAvatarStorage),
        Arc::new(engine),
        clock,
    );
    let shutdown = state.shutdown.clone();

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = troupe_api::app(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.socket_addr()?;
    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
            info!("shutting down; cancelling in-flight turns");
            shutdown.cancel();
        })
        .await?;

    if let Some(provider) = provider {
        if let Err(err) = provider.shutdown() {
            warn!(error = %err, "failed to flush span exporter");
        }
    }
    Ok(())
}
