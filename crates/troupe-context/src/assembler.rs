//! Context assembler.

use serde::Serialize;
use tracing::{debug, instrument, warn};
use troupe_cast::domain::visibility::Observer;
use troupe_cast::domain::{Assistant, Model, Persona};
use troupe_core::completion::{ChatMessage, CompletionRequest};
use troupe_core::entity::EntityKind;
use troupe_core::error::DomainError;
use troupe_core::truth::is_blank;
use troupe_production::domain::Production;
use troupe_production::domain::branch::{TurnTree, without_stale_directives};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::prompt;

/// The messages for one completion, with the entities they were built for.
#[derive(Debug, Clone, Serialize)]
pub struct AssembledContext {
    /// The responding assistant.
    pub assistant: Assistant,
    /// Its persona.
    pub persona: Persona,
    /// Its model. Serialized without the secret key.
    pub model: Model,
    /// Setup messages first, then the history in chronological order.
    pub messages: Vec<ChatMessage>,
}

impl AssembledContext {
    /// The streamed completion request for this context, with the
    /// assistant's parameter overrides merged over the model defaults.
    #[must_use]
    pub fn into_request(self) -> CompletionRequest {
        CompletionRequest {
            parameters: self.assistant.effective_parameters(&self.model),
            endpoint: self.model.endpoint,
            api_key: self.model.api_key,
            model: self.model.upstream_model,
            messages: self.messages,
            json_object: true,
        }
    }
}

/// Builds per-assistant contexts from a [`Catalog`].
pub struct ContextAssembler<'a> {
    catalog: &'a dyn Catalog,
}

impl<'a> ContextAssembler<'a> {
    /// An assembler reading from `catalog`.
    #[must_use]
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self { catalog }
    }

    /// Assemble the context `assistant_id` responds to within
    /// `production_id`, with history up to and including `leaf`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the production, the assistant, its
    /// persona, its model or `leaf` cannot be resolved. Returns
    /// `DomainError::Integrity` if the history is malformed.
    #[instrument(skip(self), fields(%production_id, %assistant_id, leaf = ?leaf))]
    pub fn assemble(
        &self,
        production_id: Uuid,
        assistant_id: Uuid,
        leaf: Option<Uuid>,
    ) -> Result<AssembledContext, DomainError> {
        let production = self
            .catalog
            .production(production_id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Production, production_id))?;
        let assistant = self
            .catalog
            .assistant(assistant_id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Assistant, assistant_id))?;
        let persona = self
            .catalog
            .persona(assistant.persona_id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Persona, assistant.persona_id))?;
        let model = self
            .catalog
            .model(assistant.model_id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Model, assistant.model_id))?;

        let observer = Observer::new(persona.id);
        let mut messages = self.setup(&production, &observer, &persona);
        let setup_len = messages.len();
        if let Some(leaf) = leaf {
            self.history(&production, &assistant, leaf, &mut messages)?;
        }
        debug!(
            setup = setup_len,
            history = messages.len() - setup_len,
            "context assembled"
        );

        Ok(AssembledContext {
            assistant,
            persona,
            model,
            messages,
        })
    }

    fn setup(
        &self,
        production: &Production,
        observer: &Observer,
        own: &Persona,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::new();

        if let Some(id) = production.world_id {
            match self.catalog.world(id) {
                Some(world) => messages.push(prompt::world(&world)),
                None => warn!(world_id = %id, "production world is missing"),
            }
        }

        if let Some(visible) = observer.persona(own) {
            messages.push(prompt::own_persona(own, &visible));
        }

        for persona in self.cast_personas(production) {
            if persona.id == own.id {
                continue;
            }
            if let Some(visible) = observer.persona(&persona) {
                messages.push(prompt::other_persona(&persona, &visible));
            }
        }

        for id in &production.relation_ids {
            let Some(relation) = self.catalog.relation(*id) else {
                warn!(relation_id = %id, "production relation is missing");
                continue;
            };
            let Some(visible) = observer.relation(&relation) else {
                continue;
            };
            let members: Vec<String> = relation
                .persona_ids
                .iter()
                .filter_map(|member| self.catalog.persona(*member))
                .filter(|member| observer.persona(member).is_some())
                .map(|member| member.name)
                .collect();
            messages.push(prompt::relation(&relation, &visible, &members));
        }

        if let Some(id) = production.scenario_id {
            match self.catalog.scenario(id) {
                Some(scenario) => messages.push(prompt::scenario(&scenario)),
                None => warn!(scenario_id = %id, "production scenario is missing"),
            }
        }

        messages
    }

    /// Personas of participating assistants, then directly attached ones,
    /// without duplicates.
    fn cast_personas(&self, production: &Production) -> Vec<Persona> {
        let via_assistants = production
            .assistant_ids
            .iter()
            .filter_map(|id| self.catalog.assistant(*id))
            .map(|assistant| assistant.persona_id);
        let mut seen = Vec::new();
        for id in via_assistants.chain(production.persona_ids.iter().copied()) {
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen.into_iter()
            .filter_map(|id| self.catalog.persona(id))
            .collect()
    }

    fn history(
        &self,
        production: &Production,
        responder: &Assistant,
        leaf: Uuid,
        messages: &mut Vec<ChatMessage>,
    ) -> Result<(), DomainError> {
        let turns = self.catalog.turns_of(production.id);
        let tree = TurnTree::new(&turns);
        let chain = tree.ancestor_chain(leaf)?;
        for turn in without_stale_directives(&chain) {
            let own = turn.assistant_id == Some(responder.id);
            let speaker = if is_blank(&turn.content.persona_name) {
                turn.assistant_id
                    .and_then(|id| self.catalog.assistant(id))
                    .and_then(|assistant| self.catalog.persona(assistant.persona_id))
                    .map(|persona| persona.name)
                    .unwrap_or_default()
            } else {
                turn.content.persona_name.clone()
            };
            messages.push(prompt::turn(turn, &speaker, own)?);
        }
        Ok(())
    }
}
