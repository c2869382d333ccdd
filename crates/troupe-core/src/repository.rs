//! Backing-store repository abstraction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::entity::Entity;
use crate::error::DomainError;

/// Durable CRUD for one entity type.
///
/// Every call carries the authenticated user's identity; row-level
/// authorization is the backing store's job. Writes return the
/// authoritative record as stored (real identifier, timestamps).
#[async_trait]
pub trait EntityRepository<T: Entity>: Send + Sync {
    /// Load every row of this type owned by `user_id`.
    async fn list(&self, user_id: Uuid) -> Result<Vec<T>, DomainError>;

    /// Insert a new row. The identifier on `entity` is provisional and may be
    /// replaced by the store.
    async fn insert(&self, user_id: Uuid, entity: &T) -> Result<T, DomainError>;

    /// Overwrite an existing row.
    async fn update(&self, user_id: Uuid, entity: &T) -> Result<T, DomainError>;

    /// Delete a row. Dependent rows cascade according to the store's schema.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), DomainError>;
}
