//! Troupe — entity store.
//!
//! Caches every user-scoped entity in memory and keeps the cache coherent
//! with the backing store: mutations are applied optimistically, confirmed
//! with the authoritative record on success and rolled back to a captured
//! snapshot on failure.

pub mod avatar;
pub mod collection;
pub mod store;

pub use avatar::{AvatarStorage, NoAvatarStorage};
pub use collection::{Change, Collection, Revert, Snapshot};
pub use store::{EntityStore, Repositories};
