//! Avatar asset collaborator.

use async_trait::async_trait;
use troupe_core::error::DomainError;
use uuid::Uuid;

/// Removes uploaded persona avatars. Uploading is handled elsewhere.
#[async_trait]
pub trait AvatarStorage: Send + Sync {
    /// Delete the asset stored under `key` for `user_id`.
    async fn remove(&self, user_id: Uuid, key: &str) -> Result<(), DomainError>;
}

impl std::fmt::Debug for dyn AvatarStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AvatarStorage")
    }
}

/// Storage for deployments without avatar uploads.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAvatarStorage;

#[async_trait]
impl AvatarStorage for NoAvatarStorage {
    async fn remove(&self, _user_id: Uuid, _key: &str) -> Result<(), DomainError> {
        Ok(())
    }
}
