//! The per-user entity store and its referential rules.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use troupe_cast::domain::{Assistant, Model, Persona, Relation};
use troupe_core::error::DomainError;
use troupe_core::repository::EntityRepository;
use troupe_production::domain::branch::TurnTree;
use troupe_production::domain::{Production, Scenario, Turn, World};
use uuid::Uuid;

use crate::avatar::AvatarStorage;
use crate::collection::{Change, Collection, Revert};

/// Backing-store repositories, one per entity type.
#[derive(Clone)]
pub struct Repositories {
    /// Persona rows.
    pub personas: Arc<dyn EntityRepository<Persona>>,
    /// Relation rows with their membership.
    pub relations: Arc<dyn EntityRepository<Relation>>,
    /// Model rows.
    pub models: Arc<dyn EntityRepository<Model>>,
    /// Assistant rows.
    pub assistants: Arc<dyn EntityRepository<Assistant>>,
    /// World rows.
    pub worlds: Arc<dyn EntityRepository<World>>,
    /// Scenario rows.
    pub scenarios: Arc<dyn EntityRepository<Scenario>>,
    /// Production rows with their cast.
    pub productions: Arc<dyn EntityRepository<Production>>,
    /// Turn rows.
    pub turns: Arc<dyn EntityRepository<Turn>>,
}

/// One user's cached view of every entity type.
///
/// The collections are public for plain CRUD; operations that touch more
/// than one collection or enforce a cross-entity rule live on the store.
#[derive(Debug)]
pub struct EntityStore {
    user_id: Uuid,
    /// Personas.
    pub personas: Collection<Persona>,
    /// Relations.
    pub relations: Collection<Relation>,
    /// Models.
    pub models: Collection<Model>,
    /// Assistants.
    pub assistants: Collection<Assistant>,
    /// Worlds.
    pub worlds: Collection<World>,
    /// Scenarios.
    pub scenarios: Collection<Scenario>,
    /// Productions.
    pub productions: Collection<Production>,
    /// Turns of every production.
    pub turns: Collection<Turn>,
    avatars: Arc<dyn AvatarStorage>,
}

impl EntityStore {
    /// An empty store for `user_id`. Nothing is fetched until a collection
    /// is listed or [`load_all`](EntityStore::load_all) is called.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        repositories: &Repositories,
        avatars: Arc<dyn AvatarStorage>,
    ) -> Self {
        Self {
            user_id,
            personas: Collection::new(Arc::clone(&repositories.personas), user_id),
            relations: Collection::new(Arc::clone(&repositories.relations), user_id),
            models: Collection::new(Arc::clone(&repositories.models), user_id),
            assistants: Collection::new(Arc::clone(&repositories.assistants), user_id),
            worlds: Collection::new(Arc::clone(&repositories.worlds), user_id),
            scenarios: Collection::new(Arc::clone(&repositories.scenarios), user_id),
            productions: Collection::new(Arc::clone(&repositories.productions), user_id),
            turns: Collection::new(Arc::clone(&repositories.turns), user_id),
            avatars,
        }
    }

    /// The authenticated user this store acts for.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Fetch every collection that is not loaded yet.
    ///
    /// # Errors
    ///
    /// Returns the first repository error.
    #[instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn load_all(&self) -> Result<(), DomainError> {
        tokio::try_join!(
            self.personas.list(),
            self.relations.list(),
            self.models.list(),
            self.assistants.list(),
            self.worlds.list(),
            self.scenarios.list(),
            self.productions.list(),
            self.turns.list(),
        )?;
        Ok(())
    }

    /// Invalidate every collection.
    pub fn reset(&self) {
        self.personas.reset();
        self.relations.reset();
        self.models.reset();
        self.assistants.reset();
        self.worlds.reset();
        self.scenarios.reset();
        self.productions.reset();
        self.turns.reset();
    }

    // --- models -----------------------------------------------------------

    /// Create a model. A model flagged default demotes the previous default.
    ///
    /// # Errors
    ///
    /// Returns the repository error; a demoted default is restored.
    #[instrument(skip(self, model), fields(user_id = %self.user_id))]
    pub async fn create_model(&self, model: Model) -> Result<Model, DomainError> {
        self.models.list().await?;
        let demoted = if model.is_default {
            self.demote_defaults(model.id).await?
        } else {
            Vec::new()
        };
        match self.models.create(model).await {
            Ok(stored) => Ok(stored),
            Err(err) => {
                self.restore_defaults(demoted).await;
                Err(err)
            }
        }
    }

    /// Update a model. A model flagged default demotes the previous default.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the model is unknown, or the
    /// repository error; a demoted default is restored.
    #[instrument(skip(self, model), fields(model_id = %model.id))]
    pub async fn update_model(&self, model: Model) -> Result<Model, DomainError> {
        self.models.list().await?;
        self.models.require(model.id)?;
        let demoted = if model.is_default {
            self.demote_defaults(model.id).await?
        } else {
            Vec::new()
        };
        match self.models.update(model).await {
            Ok(stored) => Ok(stored),
            Err(err) => {
                self.restore_defaults(demoted).await;
                Err(err)
            }
        }
    }

    async fn demote_defaults(&self, except: Uuid) -> Result<Vec<Model>, DomainError> {
        let mut demoted = Vec::new();
        for mut previous in self.models.filter(|m| m.is_default && m.id != except) {
            previous.is_default = false;
            demoted.push(self.models.update(previous).await?);
        }
        Ok(demoted)
    }

    async fn restore_defaults(&self, demoted: Vec<Model>) {
        for mut model in demoted {
            model.is_default = true;
            if let Err(err) = self.models.update(model).await {
                warn!(error = %err, "failed to restore previous default model");
            }
        }
    }

    /// The user's default model, if one is flagged.
    ///
    /// # Errors
    ///
    /// Returns the repository error if models are not loaded yet and
    /// loading fails.
    pub async fn default_model(&self) -> Result<Option<Model>, DomainError> {
        Ok(self.models.list().await?.into_iter().find(|m| m.is_default))
    }

    /// Delete a model that no assistant references.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Conflict` without touching anything if an
    /// assistant uses the model. Returns `DomainError::NotFound` if the
    /// model is unknown, or the repository error after rollback.
    #[instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn delete_model(&self, id: Uuid) -> Result<(), DomainError> {
        self.models.list().await?;
        self.assistants.list().await?;
        self.models.require(id)?;
        let users = self.assistants.filter(|a| a.model_id == id).len();
        if users > 0 {
            return Err(DomainError::Conflict(format!(
                "model {id} is in use by {users} assistant(s)"
            )));
        }
        self.models.delete(id).await
    }

    // --- assistants -------------------------------------------------------

    async fn check_pairing(&self, assistant: &Assistant) -> Result<(), DomainError> {
        self.personas.list().await?;
        self.models.list().await?;
        self.assistants.list().await?;
        self.personas.require(assistant.persona_id)?;
        self.models.require(assistant.model_id)?;
        let taken = self.assistants.filter(|other| {
            other.id != assistant.id
                && other.persona_id == assistant.persona_id
                && other.model_id == assistant.model_id
        });
        if taken.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Conflict(format!(
                "an assistant already pairs persona {} with model {}",
                assistant.persona_id, assistant.model_id
            )))
        }
    }

    /// Create an assistant, unique per (persona, model).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the persona or model is unknown,
    /// `DomainError::Conflict` if the pairing exists, or the repository
    /// error after rollback.
    #[instrument(
        skip(self, assistant),
        fields(persona_id = %assistant.persona_id, model_id = %assistant.model_id)
    )]
    pub async fn create_assistant(&self, assistant: Assistant) -> Result<Assistant, DomainError> {
        self.check_pairing(&assistant).await?;
        self.assistants.create(assistant).await
    }

    /// Update an assistant, unique per (persona, model).
    ///
    /// # Errors
    ///
    /// As [`create_assistant`](EntityStore::create_assistant), plus
    /// `DomainError::NotFound` if the assistant is unknown.
    #[instrument(skip(self, assistant), fields(assistant_id = %assistant.id))]
    pub async fn update_assistant(&self, assistant: Assistant) -> Result<Assistant, DomainError> {
        self.check_pairing(&assistant).await?;
        self.assistants.update(assistant).await
    }

    /// Delete an assistant, detaching it from productions and from the turns
    /// it authored.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the assistant is unknown, or the
    /// repository error after rollback.
    #[instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn delete_assistant(&self, id: Uuid) -> Result<(), DomainError> {
        self.load_all().await?;
        self.assistants.require(id)?;
        let productions = self.detach_from_productions(&[id], None, None);
        let turns = self.detach_from_turns(&[id]);
        let assistants = self.assistants.apply(vec![Change::Remove(id)]);
        if let Err(err) = self.assistants.delete_durably(id, vec![assistants]).await {
            self.turns.revert(turns);
            self.productions.revert(productions);
            return Err(err);
        }
        Ok(())
    }

    fn detach_from_productions(
        &self,
        assistant_ids: &[Uuid],
        persona_id: Option<Uuid>,
        relation_id: Option<Uuid>,
    ) -> Revert<Production> {
        let changes = self
            .productions
            .cached()
            .into_iter()
            .filter_map(|mut production| {
                let before = production.clone();
                production.assistant_ids.retain(|id| !assistant_ids.contains(id));
                production.persona_ids.retain(|id| Some(*id) != persona_id);
                production.relation_ids.retain(|id| Some(*id) != relation_id);
                (production != before).then_some(Change::Put(production))
            })
            .collect();
        self.productions.apply(changes)
    }

    fn detach_from_turns(&self, assistant_ids: &[Uuid]) -> Revert<Turn> {
        let changes = self
            .turns
            .filter(|turn| turn.assistant_id.is_some_and(|id| assistant_ids.contains(&id)))
            .into_iter()
            .map(|mut turn| {
                turn.assistant_id = None;
                Change::Put(turn)
            })
            .collect();
        self.turns.apply(changes)
    }

    // --- personas and relations -------------------------------------------

    /// Delete a persona with everything that depends on it: its assistants,
    /// its relation memberships and its avatar asset. Cache changes across
    /// all collections roll back together if the durable delete fails;
    /// avatar cleanup failures are logged only.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the persona is unknown, or the
    /// repository error after rollback.
    #[instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn delete_persona(&self, id: Uuid) -> Result<(), DomainError> {
        self.load_all().await?;
        let persona = self.personas.require(id)?;

        let dependent: Vec<Uuid> = self
            .assistants
            .filter(|a| a.persona_id == id)
            .iter()
            .map(|a| a.id)
            .collect();
        let memberships = self
            .relations
            .filter(|r| r.has_member(id))
            .into_iter()
            .map(|mut relation| {
                relation.persona_ids.retain(|member| *member != id);
                Change::Put(relation)
            })
            .collect();

        let productions = self.detach_from_productions(&dependent, Some(id), None);
        let turns = self.detach_from_turns(&dependent);
        let relations = self.relations.apply(memberships);
        let assistants = self
            .assistants
            .apply(dependent.iter().copied().map(Change::Remove).collect());
        let personas = self.personas.apply(vec![Change::Remove(id)]);

        if let Err(err) = self.personas.delete_durably(id, vec![personas]).await {
            self.assistants.revert(assistants);
            self.relations.revert(relations);
            self.turns.revert(turns);
            self.productions.revert(productions);
            return Err(err);
        }
        info!(persona_id = %id, assistants = dependent.len(), "persona deleted");

        if let Some(key) = persona.avatar.as_deref() {
            if let Err(err) = self.avatars.remove(self.user_id, key).await {
                warn!(error = %err, persona_id = %id, "avatar cleanup failed");
            }
        }
        Ok(())
    }

    /// Delete a relation and detach it from productions.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the relation is unknown, or the
    /// repository error after rollback.
    #[instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn delete_relation(&self, id: Uuid) -> Result<(), DomainError> {
        self.relations.list().await?;
        self.productions.list().await?;
        self.relations.require(id)?;
        let productions = self.detach_from_productions(&[], None, Some(id));
        let relations = self.relations.apply(vec![Change::Remove(id)]);
        if let Err(err) = self.relations.delete_durably(id, vec![relations]).await {
            self.productions.revert(productions);
            return Err(err);
        }
        Ok(())
    }

    // --- worlds and productions -------------------------------------------

    /// Worlds cannot change once created.
    ///
    /// # Errors
    ///
    /// Always returns `DomainError::Validation`.
    pub fn update_world(&self, world: &World) -> Result<World, DomainError> {
        Err(DomainError::Validation(format!(
            "world {} is immutable once created",
            world.id
        )))
    }

    /// Create a production after checking that everything it binds exists.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for the first unknown reference, or
    /// the repository error after rollback.
    #[instrument(skip(self, production), fields(user_id = %self.user_id))]
    pub async fn create_production(
        &self,
        production: Production,
    ) -> Result<Production, DomainError> {
        self.load_all().await?;
        if let Some(world_id) = production.world_id {
            self.worlds.require(world_id)?;
        }
        if let Some(scenario_id) = production.scenario_id {
            self.scenarios.require(scenario_id)?;
        }
        for id in &production.assistant_ids {
            self.assistants.require(*id)?;
        }
        for id in &production.persona_ids {
            self.personas.require(*id)?;
        }
        for id in &production.relation_ids {
            self.relations.require(*id)?;
        }
        self.productions.create(production).await
    }

    // --- turns ------------------------------------------------------------

    /// Cached turns of one production.
    #[must_use]
    pub fn turns_of(&self, production_id: Uuid) -> Vec<Turn> {
        self.turns.filter(|turn| turn.production_id == production_id)
    }

    /// Turns of one production whose durable write has completed. A turn
    /// still streaming, or a user turn still being inserted, is left out;
    /// its id is provisional and must not become anyone's parent.
    #[must_use]
    pub fn settled_turns_of(&self, production_id: Uuid) -> Vec<Turn> {
        self.turns.settled(|turn| turn.production_id == production_id)
    }

    /// Delete a turn and every descendant. Returns the removed ids, the
    /// deleted turn first.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the turn is unknown, or the
    /// repository error after rollback.
    #[instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn delete_turn(&self, id: Uuid) -> Result<Vec<Uuid>, DomainError> {
        self.turns.list().await?;
        let turn = self.turns.require(id)?;
        let siblings = self.turns_of(turn.production_id);
        let removed: Vec<Uuid> = std::iter::once(id)
            .chain(
                TurnTree::new(&siblings)
                    .descendants(id)
                    .into_iter()
                    .map(|descendant| descendant.id),
            )
            .collect();

        let revert = self
            .turns
            .apply(removed.iter().copied().map(Change::Remove).collect());
        self.turns.delete_durably(id, vec![revert]).await?;
        info!(turn_id = %id, removed = removed.len(), "turn branch deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Duration;
    use troupe_core::truth::Truth;
    use troupe_production::domain::TurnContent;
    use troupe_test_support::fixtures::{assistant, fixed_time, model, persona, production};
    use troupe_test_support::{InMemoryRepository, RepositoryOp};

    use super::*;

    #[derive(Default)]
    struct Backing {
        personas: Arc<InMemoryRepository<Persona>>,
        relations: Arc<InMemoryRepository<Relation>>,
        models: Arc<InMemoryRepository<Model>>,
        assistants: Arc<InMemoryRepository<Assistant>>,
        worlds: Arc<InMemoryRepository<World>>,
        scenarios: Arc<InMemoryRepository<Scenario>>,
        productions: Arc<InMemoryRepository<Production>>,
        turns: Arc<InMemoryRepository<Turn>>,
    }

    impl Backing {
        fn repositories(&self) -> Repositories {
            Repositories {
                personas: self.personas.clone(),
                relations: self.relations.clone(),
                models: self.models.clone(),
                assistants: self.assistants.clone(),
                worlds: self.worlds.clone(),
                scenarios: self.scenarios.clone(),
                productions: self.productions.clone(),
                turns: self.turns.clone(),
            }
        }
    }

    #[derive(Default)]
    struct RecordingAvatars {
        removed: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl AvatarStorage for RecordingAvatars {
        async fn remove(&self, _user_id: Uuid, key: &str) -> Result<(), DomainError> {
            self.removed.lock().unwrap().push(key.to_owned());
            if self.fail {
                Err(DomainError::Api("bucket unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    fn store(user_id: Uuid, backing: &Backing, avatars: Arc<RecordingAvatars>) -> EntityStore {
        EntityStore::new(user_id, &backing.repositories(), avatars)
    }

    #[tokio::test]
    async fn test_delete_model_in_use_is_conflict_and_keeps_model() {
        // Arrange
        let user_id = Uuid::new_v4();
        let alice = persona(user_id, "Alice", "therapist", "anxious", "");
        let gpt = model(user_id, "local");
        let backing = Backing {
            personas: Arc::new(InMemoryRepository::with_rows(vec![alice.clone()])),
            models: Arc::new(InMemoryRepository::with_rows(vec![gpt.clone()])),
            assistants: Arc::new(InMemoryRepository::with_rows(vec![assistant(&alice, &gpt)])),
            ..Backing::default()
        };
        let store = store(user_id, &backing, Arc::default());

        // Act
        let result = store.delete_model(gpt.id).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Conflict(_))));
        assert_eq!(store.models.get(gpt.id), Some(gpt));
        assert_eq!(backing.models.count(RepositoryOp::Delete), 0);
    }

    #[tokio::test]
    async fn test_delete_unused_model_removes_it() {
        let user_id = Uuid::new_v4();
        let gpt = model(user_id, "local");
        let backing = Backing {
            models: Arc::new(InMemoryRepository::with_rows(vec![gpt.clone()])),
            ..Backing::default()
        };
        let store = store(user_id, &backing, Arc::default());

        store.delete_model(gpt.id).await.unwrap();

        assert!(store.models.cached().is_empty());
        assert!(backing.models.rows().is_empty());
    }

    #[tokio::test]
    async fn test_new_default_model_demotes_previous_default() {
        // Arrange
        let user_id = Uuid::new_v4();
        let mut previous = model(user_id, "old");
        previous.is_default = true;
        let backing = Backing {
            models: Arc::new(InMemoryRepository::with_rows(vec![previous.clone()])),
            ..Backing::default()
        };
        let store = store(user_id, &backing, Arc::default());
        let mut next = model(user_id, "new");
        next.is_default = true;

        // Act
        let stored = store.create_model(next).await.unwrap();

        // Assert
        assert!(!store.models.require(previous.id).unwrap().is_default);
        assert_eq!(store.default_model().await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn test_duplicate_persona_model_pairing_is_conflict() {
        let user_id = Uuid::new_v4();
        let alice = persona(user_id, "Alice", "therapist", "", "");
        let gpt = model(user_id, "local");
        let backing = Backing {
            personas: Arc::new(InMemoryRepository::with_rows(vec![alice.clone()])),
            models: Arc::new(InMemoryRepository::with_rows(vec![gpt.clone()])),
            assistants: Arc::new(InMemoryRepository::with_rows(vec![assistant(&alice, &gpt)])),
            ..Backing::default()
        };
        let store = store(user_id, &backing, Arc::default());

        let result = store.create_assistant(assistant(&alice, &gpt)).await;

        assert!(matches!(result, Err(DomainError::Conflict(_))));
        assert_eq!(store.assistants.cached().len(), 1);
    }

    #[tokio::test]
    async fn test_assistant_for_unknown_persona_is_not_found() {
        let user_id = Uuid::new_v4();
        let ghost = persona(user_id, "Ghost", "", "", "");
        let gpt = model(user_id, "local");
        let backing = Backing {
            models: Arc::new(InMemoryRepository::with_rows(vec![gpt.clone()])),
            ..Backing::default()
        };
        let store = store(user_id, &backing, Arc::default());

        let result = store.create_assistant(assistant(&ghost, &gpt)).await;

        assert_eq!(
            result.unwrap_err(),
            DomainError::not_found(troupe_core::entity::EntityKind::Persona, ghost.id)
        );
    }

    #[tokio::test]
    async fn test_delete_persona_cascades_and_removes_avatar() {
        // Arrange
        let user_id = Uuid::new_v4();
        let mut alice = persona(user_id, "Alice", "therapist", "", "");
        alice.avatar = Some("avatars/alice.png".to_owned());
        let bob = persona(user_id, "Bob", "patient", "", "");
        let gpt = model(user_id, "local");
        let alice_assistant = assistant(&alice, &gpt);
        let members = vec![alice.id, bob.id];
        let bond = Relation::new(user_id, None, members, Truth::default(), fixed_time());
        let backing = Backing {
            personas: Arc::new(InMemoryRepository::with_rows(vec![alice.clone(), bob.clone()])),
            models: Arc::new(InMemoryRepository::with_rows(vec![gpt.clone()])),
            assistants: Arc::new(InMemoryRepository::with_rows(vec![alice_assistant.clone()])),
            relations: Arc::new(InMemoryRepository::with_rows(vec![bond.clone()])),
            productions: Arc::new(InMemoryRepository::with_rows(vec![production(
                user_id,
                &[&alice_assistant],
            )])),
            ..Backing::default()
        };
        let avatars = Arc::new(RecordingAvatars::default());
        let store = store(user_id, &backing, avatars.clone());

        // Act
        store.delete_persona(alice.id).await.unwrap();

        // Assert
        assert_eq!(store.personas.cached(), vec![bob.clone()]);
        assert!(store.assistants.cached().is_empty());
        assert_eq!(store.relations.require(bond.id).unwrap().persona_ids, vec![bob.id]);
        assert!(store.productions.cached()[0].assistant_ids.is_empty());
        assert_eq!(*avatars.removed.lock().unwrap(), vec!["avatars/alice.png".to_owned()]);
    }

    #[tokio::test]
    async fn test_failed_persona_delete_restores_every_collection() {
        // Arrange
        let user_id = Uuid::new_v4();
        let alice = persona(user_id, "Alice", "therapist", "", "");
        let bob = persona(user_id, "Bob", "patient", "", "");
        let gpt = model(user_id, "local");
        let members = vec![alice.id, bob.id];
        let bond = Relation::new(user_id, None, members, Truth::default(), fixed_time());
        let backing = Backing {
            personas: Arc::new(
                InMemoryRepository::with_rows(vec![alice.clone(), bob])
                    .failing_on(RepositoryOp::Delete),
            ),
            models: Arc::new(InMemoryRepository::with_rows(vec![gpt.clone()])),
            assistants: Arc::new(InMemoryRepository::with_rows(vec![assistant(&alice, &gpt)])),
            relations: Arc::new(InMemoryRepository::with_rows(vec![bond])),
            ..Backing::default()
        };
        let avatars = Arc::new(RecordingAvatars::default());
        let store = store(user_id, &backing, avatars.clone());
        store.load_all().await.unwrap();
        let personas = store.personas.snapshot();
        let assistants = store.assistants.snapshot();
        let relations = store.relations.snapshot();

        // Act
        let result = store.delete_persona(alice.id).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Api(_))));
        assert_eq!(store.personas.snapshot(), personas);
        assert_eq!(store.assistants.snapshot(), assistants);
        assert_eq!(store.relations.snapshot(), relations);
        assert!(avatars.removed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_avatar_cleanup_failure_does_not_fail_delete() {
        let user_id = Uuid::new_v4();
        let mut alice = persona(user_id, "Alice", "therapist", "", "");
        alice.avatar = Some("avatars/alice.png".to_owned());
        let backing = Backing {
            personas: Arc::new(InMemoryRepository::with_rows(vec![alice.clone()])),
            ..Backing::default()
        };
        let avatars = Arc::new(RecordingAvatars {
            fail: true,
            ..RecordingAvatars::default()
        });
        let store = store(user_id, &backing, avatars);

        let result = store.delete_persona(alice.id).await;

        assert!(result.is_ok());
        assert!(store.personas.cached().is_empty());
    }

    #[tokio::test]
    async fn test_delete_turn_removes_descendants_only() {
        // Arrange
        let user_id = Uuid::new_v4();
        let production_id = Uuid::new_v4();
        let at = |minutes| fixed_time() + Duration::minutes(minutes);
        let content = || TurnContent::performance("Alice", "Hello.");
        let root = Turn::user(user_id, production_id, None, content(), at(0));
        let left = Turn::user(user_id, production_id, Some(root.id), content(), at(1));
        let left_leaf = Turn::user(user_id, production_id, Some(left.id), content(), at(2));
        let right = Turn::user(user_id, production_id, Some(root.id), content(), at(3));
        let backing = Backing {
            turns: Arc::new(InMemoryRepository::with_rows(vec![
                root.clone(),
                left.clone(),
                left_leaf.clone(),
                right.clone(),
            ])),
            ..Backing::default()
        };
        let store = store(user_id, &backing, Arc::default());

        // Act
        let removed = store.delete_turn(left.id).await.unwrap();

        // Assert
        assert_eq!(removed, vec![left.id, left_leaf.id]);
        let mut remaining: Vec<Uuid> =
            store.turns_of(production_id).iter().map(|t| t.id).collect();
        remaining.sort();
        let mut expected = vec![root.id, right.id];
        expected.sort();
        assert_eq!(remaining, expected);
    }

    #[tokio::test]
    async fn test_settled_turns_leave_out_staged_turns() {
        // Arrange
        let user_id = Uuid::new_v4();
        let production_id = Uuid::new_v4();
        let content = || TurnContent::performance("Alice", "Hello.");
        let root = Turn::user(user_id, production_id, None, content(), fixed_time());
        let backing = Backing {
            turns: Arc::new(InMemoryRepository::with_rows(vec![root.clone()])),
            ..Backing::default()
        };
        let store = store(user_id, &backing, Arc::default());
        store.load_all().await.unwrap();
        let later = fixed_time() + Duration::minutes(1);
        let streaming = Turn::user(user_id, production_id, Some(root.id), content(), later);

        // Act
        store.turns.stage(streaming.clone());

        // Assert
        assert_eq!(store.turns_of(production_id).len(), 2);
        assert_eq!(store.settled_turns_of(production_id), vec![root]);
    }

    #[tokio::test]
    async fn test_worlds_are_immutable() {
        let user_id = Uuid::new_v4();
        let store = store(user_id, &Backing::default(), Arc::default());
        let world = World::new(user_id, "Gotham", "A rainy city.", fixed_time());

        let result = store.update_world(&world);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
