//! Shared application state.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tokio_util::sync::CancellationToken;
use troupe_core::clock::Clock;
use troupe_core::error::DomainError;
use troupe_entity_store::{AvatarStorage, EntityStore, Repositories};
use troupe_production::domain::ActiveTurns;
use troupe_streaming::TurnEngine;
use uuid::Uuid;

use crate::error::ApiError;

/// Header naming the authenticated user. Authentication happens upstream.
pub const USER_HEADER: &str = "x-user-id";

/// One user's cached entities and active-leaf markers.
#[derive(Debug)]
pub struct Session {
    /// The user's entity store.
    pub store: EntityStore,
    /// Active leaf per production.
    pub active: ActiveTurns,
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Backing repositories for every entity type.
    pub repositories: Repositories,
    /// Avatar object storage.
    pub avatars: Arc<dyn AvatarStorage>,
    /// The turn streaming engine.
    pub engine: Arc<TurnEngine>,
    /// Timestamp source for created entities.
    pub clock: Arc<dyn Clock>,
    /// Cancelled on shutdown; in-flight turns derive their tokens from it.
    pub shutdown: CancellationToken,
    sessions: Arc<Mutex<HashMap<Uuid, Arc<Session>>>>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine)
            .field("sessions", &self.session_count())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        repositories: Repositories,
        avatars: Arc<dyn AvatarStorage>,
        engine: Arc<TurnEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repositories,
            avatars,
            engine,
            clock,
            shutdown: CancellationToken::new(),
            sessions: Arc::default(),
        }
    }

    /// The session of `user_id`, created on first use.
    #[must_use]
    pub fn session(&self, user_id: Uuid) -> Arc<Session> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(user_id)
            .or_insert_with(|| {
                Arc::new(Session {
                    store: EntityStore::new(user_id, &self.repositories, self.avatars.clone()),
                    active: ActiveTurns::new(),
                })
            })
            .clone()
    }

    /// Forget the session of `user_id`. Its cache and active markers go
    /// with it; the next request starts a fresh session that reloads from
    /// the repositories. Triggers still running keep their own handle.
    /// Returns whether a session existed.
    pub fn end_session(&self, user_id: Uuid) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(&user_id).is_some()
    }

    /// Number of sessions currently held.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// The calling user, taken from the [`USER_HEADER`] header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(Self)
            .ok_or_else(|| {
                ApiError(DomainError::Validation(format!(
                    "missing or invalid {USER_HEADER} header"
                )))
            })
    }
}
