//! Test repositories: in-memory `EntityRepository` implementations.

use std::sync::Mutex;

use async_trait::async_trait;
use troupe_core::entity::Entity;
use troupe_core::error::DomainError;
use troupe_core::repository::EntityRepository;
use uuid::Uuid;

/// A repository operation, as recorded by [`InMemoryRepository`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOp {
    /// `list`
    List,
    /// `insert`
    Insert,
    /// `update`
    Update,
    /// `delete`
    Delete,
}

/// A repository backed by a vector. Records every call, assigns a fresh id
/// on insert (like a database default) and can be told to fail one kind of
/// operation.
#[derive(Debug)]
pub struct InMemoryRepository<T> {
    rows: Mutex<Vec<T>>,
    calls: Mutex<Vec<(RepositoryOp, Uuid)>>,
    fail_on: Option<RepositoryOp>,
}

impl<T: Entity> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::with_rows(Vec::new())
    }
}

impl<T: Entity> InMemoryRepository<T> {
    /// An empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository pre-populated with `rows`.
    #[must_use]
    pub fn with_rows(rows: Vec<T>) -> Self {
        Self {
            rows: Mutex::new(rows),
            calls: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }

    /// Make every `op` call fail with an `Api` error.
    #[must_use]
    pub fn failing_on(mut self, op: RepositoryOp) -> Self {
        self.fail_on = Some(op);
        self
    }

    /// Snapshot of the stored rows.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn rows(&self) -> Vec<T> {
        self.rows.lock().unwrap().clone()
    }

    /// Every call so far with the user id it carried.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<(RepositoryOp, Uuid)> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls of one kind.
    pub fn count(&self, op: RepositoryOp) -> usize {
        self.calls().iter().filter(|(recorded, _)| *recorded == op).count()
    }

    fn record(&self, op: RepositoryOp, user_id: Uuid) -> Result<(), DomainError> {
        self.calls.lock().unwrap().push((op, user_id));
        if self.fail_on == Some(op) {
            Err(DomainError::Api("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<T: Entity> EntityRepository<T> for InMemoryRepository<T> {
    async fn list(&self, user_id: Uuid) -> Result<Vec<T>, DomainError> {
        self.record(RepositoryOp::List, user_id)?;
        Ok(self
            .rows()
            .into_iter()
            .filter(|row| row.user_id() == user_id)
            .collect())
    }

    async fn insert(&self, user_id: Uuid, entity: &T) -> Result<T, DomainError> {
        self.record(RepositoryOp::Insert, user_id)?;
        let mut stored = entity.clone();
        stored.set_id(Uuid::new_v4());
        self.rows.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, user_id: Uuid, entity: &T) -> Result<T, DomainError> {
        self.record(RepositoryOp::Update, user_id)?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.id() == entity.id() && row.user_id() == user_id)
            .ok_or_else(|| DomainError::not_found(T::KIND, entity.id()))?;
        *row = entity.clone();
        Ok(entity.clone())
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), DomainError> {
        self.record(RepositoryOp::Delete, user_id)?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|row| !(row.id() == id && row.user_id() == user_id));
        if rows.len() == before {
            return Err(DomainError::not_found(T::KIND, id));
        }
        Ok(())
    }
}

/// A repository that always returns an infrastructure error. Useful for
/// testing rollback paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingRepository;

#[async_trait]
impl<T: Entity> EntityRepository<T> for FailingRepository {
    async fn list(&self, _user_id: Uuid) -> Result<Vec<T>, DomainError> {
        Err(DomainError::Api("connection refused".into()))
    }

    async fn insert(&self, _user_id: Uuid, _entity: &T) -> Result<T, DomainError> {
        Err(DomainError::Api("connection refused".into()))
    }

    async fn update(&self, _user_id: Uuid, _entity: &T) -> Result<T, DomainError> {
        Err(DomainError::Api("connection refused".into()))
    }

    async fn delete(&self, _user_id: Uuid, _id: Uuid) -> Result<(), DomainError> {
        Err(DomainError::Api("connection refused".into()))
    }
}
