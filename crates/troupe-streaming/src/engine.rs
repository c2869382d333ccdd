//! Turn streaming engine.

use std::sync::Arc;

use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use troupe_context::ContextAssembler;
use troupe_core::clock::Clock;
use troupe_core::completion::{CompletionClient, CompletionRequest, CompletionStream};
use troupe_core::entity::EntityKind;
use troupe_core::error::DomainError;
use troupe_core::truth::is_blank;
use troupe_entity_store::{Collection, EntityStore};
use troupe_production::domain::branch::TurnTree;
use troupe_production::domain::{ActiveTurns, Turn, TurnContent};
use uuid::Uuid;

use crate::config::StreamConfig;
use crate::event::{TurnEvent, TurnPhase};
use crate::parser::ContentParser;

const EVENT_CAPACITY: usize = 256;

/// Speaker label for user turns that do not name one.
const DEFAULT_USER_NAME: &str = "User";

/// What a client asks for when it triggers a turn.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TurnTrigger {
    /// The assistant that responds.
    pub assistant_id: Uuid,
    /// User-authored text persisted as a user turn before the response.
    #[serde(default)]
    pub performance: Option<String>,
    /// Speaker label of the user turn.
    #[serde(default)]
    pub persona_name: Option<String>,
    /// Mark the user turn as an out-of-character directive.
    #[serde(default)]
    pub directive: bool,
    /// Attach to this turn instead of the active leaf.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

/// Drives triggers through `streaming → persisted | failed`.
pub struct TurnEngine {
    client: Arc<dyn CompletionClient>,
    clock: Arc<dyn Clock>,
    config: StreamConfig,
    events: broadcast::Sender<TurnEvent>,
}

impl std::fmt::Debug for TurnEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnEngine")
            .field("config", &self.config)
            .field("observers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

/// Discards the staged turn unless disarmed. Dropping the trigger future
/// mid-stream therefore leaves no provisional turn behind.
struct Provisional<'a> {
    turns: &'a Collection<Turn>,
    id: Uuid,
    armed: bool,
}

impl Drop for Provisional<'_> {
    fn drop(&mut self) {
        if self.armed && self.turns.discard_local(self.id).is_some() {
            debug!(turn_id = %self.id, "provisional turn discarded");
        }
    }
}

impl TurnEngine {
    /// An engine streaming through `client`.
    #[must_use]
    pub fn new(
        client: Arc<dyn CompletionClient>,
        clock: Arc<dyn Clock>,
        config: StreamConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            clock,
            config,
            events,
        }
    }

    /// Receive every event published from now on, for all productions.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.events.subscribe()
    }

    /// Run one trigger against `production_id` and return the persisted
    /// assistant turn.
    ///
    /// The user turn, when `trigger` carries text, is persisted before the
    /// assistant turn is streamed, and becomes its parent. On success the
    /// active marker points at the new assistant turn.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` before any side effect if the
    /// production, the assistant, its persona, its model or an explicit
    /// parent cannot be resolved, and `DomainError::Validation` if the
    /// assistant is not cast in the production or the explicit parent is
    /// still being written. Returns `DomainError::Stream` on timeout,
    /// cancellation, a broken stream or a completion without performance,
    /// `DomainError::StreamParse` for malformed output and `DomainError::Api`
    /// when the completion API refuses; the provisional turn is discarded
    /// in each case.
    #[instrument(
        skip(self, store, active, trigger, cancel),
        fields(user_id = %store.user_id(), assistant_id = %trigger.assistant_id)
    )]
    pub async fn trigger(
        &self,
        store: &EntityStore,
        active: &ActiveTurns,
        production_id: Uuid,
        trigger: TurnTrigger,
        cancel: CancellationToken,
    ) -> Result<Turn, DomainError> {
        store.load_all().await?;
        let production = store.productions.require(production_id)?;
        ContextAssembler::new(store).assemble(production_id, trigger.assistant_id, None)?;
        if !production.assistant_ids.contains(&trigger.assistant_id) {
            return Err(DomainError::Validation(format!(
                "assistant {} is not cast in production {production_id}",
                trigger.assistant_id
            )));
        }
        let mut parent_id = resolve_parent(store, active, production_id, trigger.parent_id)?;

        if let Some(text) = trigger.performance.as_deref().filter(|text| !is_blank(text)) {
            let name = trigger
                .persona_name
                .as_deref()
                .filter(|name| !is_blank(name))
                .unwrap_or(DEFAULT_USER_NAME);
            let mut turn = Turn::user(
                store.user_id(),
                production_id,
                parent_id,
                TurnContent::performance(name, text),
                self.clock.now(),
            );
            if trigger.directive {
                turn = turn.as_directive();
            }
            let stored = store.turns.create(turn).await?;
            info!(turn_id = %stored.id, directive = stored.directive, "user turn persisted");
            active.set(production_id, stored.id);
            parent_id = Some(stored.id);
        }

        self.respond(store, active, production_id, trigger.assistant_id, parent_id, &cancel)
            .await
    }

    async fn respond(
        &self,
        store: &EntityStore,
        active: &ActiveTurns,
        production_id: Uuid,
        assistant_id: Uuid,
        parent_id: Option<Uuid>,
        cancel: &CancellationToken,
    ) -> Result<Turn, DomainError> {
        let siblings = store.turns_of(production_id);
        let existing = TurnTree::new(&siblings).children(parent_id).len();
        if existing > 0 {
            info!(parent_id = ?parent_id, existing, "parent already answered; branching");
        }

        let provisional = Turn::provisional(
            store.user_id(),
            production_id,
            assistant_id,
            parent_id,
            self.clock.now(),
        );
        let turn_id = provisional.id;
        store.turns.stage(provisional);
        let mut guard = Provisional {
            turns: &store.turns,
            id: turn_id,
            armed: true,
        };
        self.publish(TurnEvent::Started {
            production_id,
            turn_id,
            assistant_id,
            parent_id,
        });
        info!(phase = %TurnPhase::Streaming, %turn_id, "turn streaming");

        match self
            .stream_into(store, production_id, assistant_id, parent_id, turn_id, cancel)
            .await
        {
            Ok(stored) => {
                guard.armed = false;
                active.set(production_id, stored.id);
                info!(phase = %TurnPhase::Persisted, turn_id = %stored.id, "turn persisted");
                self.publish(TurnEvent::Persisted {
                    production_id,
                    provisional_id: turn_id,
                    turn: stored.clone(),
                });
                Ok(stored)
            }
            Err(err) => {
                drop(guard);
                active.forget_any(production_id, &[turn_id]);
                warn!(phase = %TurnPhase::Failed, %turn_id, error = %err, "turn failed");
                self.publish(TurnEvent::Failed {
                    production_id,
                    turn_id,
                    code: err.code().to_owned(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn stream_into(
        &self,
        store: &EntityStore,
        production_id: Uuid,
        assistant_id: Uuid,
        parent_id: Option<Uuid>,
        turn_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Turn, DomainError> {
        let request = ContextAssembler::new(store)
            .assemble(production_id, assistant_id, parent_id)?
            .into_request();
        let deadline = Instant::now() + self.config.total_timeout;
        let mut stream = self.open(request, cancel).await?;
        let mut parser = ContentParser::new();

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => {
                    return Err(DomainError::Stream("turn cancelled".into()));
                }
                () = tokio::time::sleep_until(deadline) => {
                    return Err(DomainError::Stream(format!(
                        "completion exceeded {}s",
                        self.config.total_timeout.as_secs()
                    )));
                }
                next = tokio::time::timeout(self.config.idle_timeout, stream.next()) => {
                    next.map_err(|_| {
                        DomainError::Stream(format!(
                            "completion stream idle for {}ms",
                            self.config.idle_timeout.as_millis()
                        ))
                    })?
                }
            };
            let Some(fragment) = next else { break };
            let fragment = fragment?;
            debug!(len = fragment.len(), "chunk received");
            for update in parser.feed(&fragment)? {
                store.turns.patch_local(turn_id, |turn| {
                    turn.content.set(update.field, update.value.clone());
                });
                self.publish(TurnEvent::FieldUpdated {
                    production_id,
                    turn_id,
                    field: update.field,
                    value: update.value,
                });
            }
        }

        let parsed = parser.finish()?;
        if !parsed.complete {
            warn!(%turn_id, "completion ended before its object closed; keeping the content");
        }
        if !parsed.content.has_performance() {
            return Err(DomainError::Stream(
                "completion produced no performance".into(),
            ));
        }
        let finished_at = self.clock.now();
        store.turns.patch_local(turn_id, |turn| {
            turn.content = parsed.content;
            turn.created_at = finished_at;
        });
        store.turns.persist_staged(turn_id).await
    }

    async fn open(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<CompletionStream, DomainError> {
        tokio::select! {
            () = cancel.cancelled() => Err(DomainError::Stream("turn cancelled".into())),
            opened = tokio::time::timeout(
                self.config.connect_timeout,
                self.client.stream(request),
            ) => opened.map_err(|_| {
                DomainError::Stream(format!(
                    "completion API did not answer within {}s",
                    self.config.connect_timeout.as_secs()
                ))
            })?,
        }
    }

    fn publish(&self, event: TurnEvent) {
        // Without observers the event is simply dropped.
        self.events.send(event).ok();
    }
}

fn resolve_parent(
    store: &EntityStore,
    active: &ActiveTurns,
    production_id: Uuid,
    explicit: Option<Uuid>,
) -> Result<Option<Uuid>, DomainError> {
    if let Some(id) = explicit {
        return match store.turns.get(id) {
            Some(turn) if turn.production_id == production_id => {
                if store.turns.is_pending(id) {
                    Err(DomainError::Validation(format!("turn {id} is still being written")))
                } else {
                    Ok(Some(id))
                }
            }
            _ => Err(DomainError::not_found(EntityKind::Turn, id)),
        };
    }
    // An active marker on a pending turn falls back to the latest settled one.
    let turns = store.settled_turns_of(production_id);
    Ok(TurnTree::new(&turns)
        .active_leaf(active.get(production_id))
        .map(|turn| turn.id))
}
