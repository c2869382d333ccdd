//! Cached collection of one entity type.
//!
//! Records live in a copy-on-write map behind an `Arc`; capturing a
//! snapshot is a reference-count bump and the first write after it clones
//! the map. Every mutation bumps a version counter and notifies watchers.
//! The lock is never held across an `.await`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, instrument, warn};
use troupe_core::entity::Entity;
use troupe_core::error::DomainError;
use troupe_core::repository::EntityRepository;
use uuid::Uuid;

type Records<T> = Arc<BTreeMap<Uuid, T>>;

#[derive(Debug)]
struct State<T> {
    records: Records<T>,
    /// Ids cached ahead of their durable write.
    pending: BTreeSet<Uuid>,
    loaded: bool,
    version: u64,
}

/// A point-in-time copy of a collection's records.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    records: Records<T>,
    version: u64,
}

impl<T: Entity> Snapshot<T> {
    /// The records in identifier order.
    #[must_use]
    pub fn records(&self) -> Vec<T> {
        self.records.values().cloned().collect()
    }

    /// The collection version at capture time.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl<T: PartialEq> PartialEq for Snapshot<T> {
    /// Snapshots compare by content only.
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

/// A single optimistic change to a collection.
#[derive(Debug, Clone)]
pub enum Change<T> {
    /// Insert or replace a record under its own id.
    Put(T),
    /// Remove the record with this id.
    Remove(Uuid),
}

/// Token that undoes an optimistic mutation.
///
/// If nothing else touched the collection in the meantime, reverting
/// restores the captured map exactly; otherwise only the records this
/// mutation touched are put back.
#[must_use = "an optimistic mutation must be confirmed or reverted"]
#[derive(Debug)]
pub struct Revert<T> {
    before: Records<T>,
    version_after: u64,
    undo: Vec<(Uuid, Option<T>)>,
}

/// Cached, optimistically mutated view of one entity type.
pub struct Collection<T: Entity> {
    repository: Arc<dyn EntityRepository<T>>,
    user_id: Uuid,
    state: Mutex<State<T>>,
    changes: watch::Sender<u64>,
}

impl<T: Entity> std::fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Collection")
            .field("kind", &T::KIND)
            .field("user_id", &self.user_id)
            .field("len", &state.records.len())
            .field("pending", &state.pending.len())
            .field("loaded", &state.loaded)
            .field("version", &state.version)
            .finish_non_exhaustive()
    }
}

impl<T: Entity> Collection<T> {
    /// An empty, not yet loaded collection for `user_id`.
    #[must_use]
    pub fn new(repository: Arc<dyn EntityRepository<T>>, user_id: Uuid) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            repository,
            user_id,
            state: Mutex::new(State {
                records: Arc::new(BTreeMap::new()),
                pending: BTreeSet::new(),
                loaded: false,
                version: 0,
            }),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self, state: &mut State<T>) {
        state.version += 1;
        self.changes.send_replace(state.version);
    }

    /// The user whose rows this collection holds.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Receive the collection version after every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Capture the current records.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<T> {
        let state = self.lock();
        Snapshot {
            records: Arc::clone(&state.records),
            version: state.version,
        }
    }

    /// Whether rows have been fetched from the backing store this session.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    /// Return all records, fetching them from the backing store on first
    /// use only. Later calls are served from the cache until [`reset`].
    ///
    /// [`reset`]: Collection::reset
    ///
    /// # Errors
    ///
    /// Returns the repository error if the initial fetch fails; the cache
    /// stays unloaded.
    #[instrument(skip(self), fields(kind = %T::KIND, user_id = %self.user_id))]
    pub async fn list(&self) -> Result<Vec<T>, DomainError> {
        if !self.is_loaded() {
            let rows = self.repository.list(self.user_id).await?;
            debug!(count = rows.len(), "loaded rows");
            let mut state = self.lock();
            if !state.loaded {
                let records = Arc::make_mut(&mut state.records);
                for row in rows {
                    records.insert(row.id(), row);
                }
                state.loaded = true;
                self.bump(&mut state);
            }
        }
        Ok(self.cached())
    }

    /// Drop every cached record; the next [`list`](Collection::list)
    /// fetches again.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.records = Arc::new(BTreeMap::new());
        state.pending.clear();
        state.loaded = false;
        self.bump(&mut state);
    }

    /// Cached records, without touching the backing store.
    #[must_use]
    pub fn cached(&self) -> Vec<T> {
        self.lock().records.values().cloned().collect()
    }

    /// Cached records matching `predicate`.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.lock()
            .records
            .values()
            .filter(|record| predicate(record))
            .cloned()
            .collect()
    }

    /// Cached records matching `predicate` whose durable write has
    /// completed. Staged records and creates still in flight are left out.
    pub fn settled(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        let state = self.lock();
        state
            .records
            .values()
            .filter(|record| !state.pending.contains(&record.id()) && predicate(record))
            .cloned()
            .collect()
    }

    /// Whether `id` is cached but not yet written durably.
    #[must_use]
    pub fn is_pending(&self, id: Uuid) -> bool {
        self.lock().pending.contains(&id)
    }

    /// A cached record.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<T> {
        self.lock().records.get(&id).cloned()
    }

    /// A cached record, or `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if `id` is not cached.
    pub fn require(&self, id: Uuid) -> Result<T, DomainError> {
        self.get(id)
            .ok_or_else(|| DomainError::not_found(T::KIND, id))
    }

    /// Apply `changes` to the cache and return the token undoing them.
    pub fn apply(&self, changes: Vec<Change<T>>) -> Revert<T> {
        let mut state = self.lock();
        let before = Arc::clone(&state.records);
        let records = Arc::make_mut(&mut state.records);
        let mut undo = Vec::with_capacity(changes.len());
        for change in changes {
            match change {
                Change::Put(record) => {
                    let id = record.id();
                    undo.push((id, records.insert(id, record)));
                }
                Change::Remove(id) => undo.push((id, records.remove(&id))),
            }
        }
        self.bump(&mut state);
        Revert {
            before,
            version_after: state.version,
            undo,
        }
    }

    /// Undo an optimistic mutation.
    pub fn revert(&self, revert: Revert<T>) {
        let mut state = self.lock();
        if state.version == revert.version_after {
            state.records = revert.before;
        } else {
            warn!(kind = %T::KIND, "collection changed while a write was pending");
            let records = Arc::make_mut(&mut state.records);
            for (id, previous) in revert.undo.into_iter().rev() {
                match previous {
                    Some(record) => records.insert(id, record),
                    None => records.remove(&id),
                };
            }
        }
        self.bump(&mut state);
    }

    fn replace(&self, provisional_id: Uuid, authoritative: T) {
        let mut state = self.lock();
        state.pending.remove(&provisional_id);
        let records = Arc::make_mut(&mut state.records);
        records.remove(&provisional_id);
        records.insert(authoritative.id(), authoritative);
        self.bump(&mut state);
    }

    fn check_owner(&self, entity: &T) -> Result<(), DomainError> {
        if entity.user_id() == self.user_id {
            Ok(())
        } else {
            Err(DomainError::Validation(format!(
                "{} belongs to another user",
                T::KIND
            )))
        }
    }

    /// Optimistically insert `entity` under a temporary id, write it
    /// durably and replace it with the stored record.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the entity belongs to another
    /// user. Returns the repository error after rolling back the cache.
    #[instrument(skip(self, entity), fields(kind = %T::KIND, user_id = %self.user_id))]
    pub async fn create(&self, mut entity: T) -> Result<T, DomainError> {
        self.check_owner(&entity)?;
        let provisional_id = Uuid::new_v4();
        entity.set_id(provisional_id);
        self.lock().pending.insert(provisional_id);
        let revert = self.apply(vec![Change::Put(entity.clone())]);

        match self.repository.insert(self.user_id, &entity).await {
            Ok(stored) => {
                drop(revert);
                self.replace(provisional_id, stored.clone());
                Ok(stored)
            }
            Err(err) => {
                warn!(error = %err, "create failed; rolling back");
                self.revert(revert);
                self.lock().pending.remove(&provisional_id);
                Err(err)
            }
        }
    }

    /// Optimistically overwrite a cached record and write it durably.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the record is not cached.
    /// Returns the repository error after rolling back the cache.
    #[instrument(skip(self, entity), fields(kind = %T::KIND, id = %entity.id()))]
    pub async fn update(&self, entity: T) -> Result<T, DomainError> {
        self.check_owner(&entity)?;
        self.require(entity.id())?;
        let id = entity.id();
        let revert = self.apply(vec![Change::Put(entity.clone())]);

        match self.repository.update(self.user_id, &entity).await {
            Ok(stored) => {
                drop(revert);
                self.replace(id, stored.clone());
                Ok(stored)
            }
            Err(err) => {
                warn!(error = %err, "update failed; rolling back");
                self.revert(revert);
                Err(err)
            }
        }
    }

    /// Optimistically remove a cached record and delete it durably.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the record is not cached.
    /// Returns the repository error after rolling back the cache.
    #[instrument(skip(self), fields(kind = %T::KIND))]
    pub async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        self.require(id)?;
        let revert = self.apply(vec![Change::Remove(id)]);
        self.delete_durably(id, vec![revert]).await
    }

    /// Delete `id` in the backing store; on failure revert every token in
    /// `reverts`.
    ///
    /// # Errors
    ///
    /// Returns the repository error.
    pub(crate) async fn delete_durably(
        &self,
        id: Uuid,
        reverts: Vec<Revert<T>>,
    ) -> Result<(), DomainError> {
        match self.repository.delete(self.user_id, id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(error = %err, %id, "delete failed; rolling back");
                for revert in reverts.into_iter().rev() {
                    self.revert(revert);
                }
                Err(err)
            }
        }
    }

    /// Insert a record into the cache only, without a durable write. It
    /// stays pending until [`persist_staged`] or [`discard_local`].
    ///
    /// [`persist_staged`]: Collection::persist_staged
    /// [`discard_local`]: Collection::discard_local
    pub fn stage(&self, entity: T) {
        self.lock().pending.insert(entity.id());
        drop(self.apply(vec![Change::Put(entity)]));
    }

    /// Modify a cached record in place, without a durable write. Returns the
    /// updated record, or `None` if it is not cached.
    pub fn patch_local(&self, id: Uuid, patch: impl FnOnce(&mut T)) -> Option<T> {
        let mut state = self.lock();
        if !state.records.contains_key(&id) {
            return None;
        }
        let record = Arc::make_mut(&mut state.records).get_mut(&id)?;
        patch(record);
        let updated = record.clone();
        self.bump(&mut state);
        Some(updated)
    }

    /// Remove a record from the cache only. Returns the removed record.
    pub fn discard_local(&self, id: Uuid) -> Option<T> {
        let mut state = self.lock();
        state.pending.remove(&id);
        if !state.records.contains_key(&id) {
            return None;
        }
        let removed = Arc::make_mut(&mut state.records).remove(&id);
        self.bump(&mut state);
        removed
    }

    /// Write a staged record durably and replace it with the stored
    /// record. On failure the staged record is discarded, not kept.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if nothing is staged under
    /// `provisional_id`. Returns the repository error.
    #[instrument(skip(self), fields(kind = %T::KIND))]
    pub async fn persist_staged(&self, provisional_id: Uuid) -> Result<T, DomainError> {
        let staged = self.require(provisional_id)?;
        match self.repository.insert(self.user_id, &staged).await {
            Ok(stored) => {
                self.replace(provisional_id, stored.clone());
                Ok(stored)
            }
            Err(err) => {
                warn!(error = %err, "persisting staged record failed; discarding it");
                self.discard_local(provisional_id);
                Err(err)
            }
        }
    }
}
