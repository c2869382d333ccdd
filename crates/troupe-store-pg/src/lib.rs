//! Troupe Store PG — `PostgreSQL` backing store.
//!
//! One generic [`PgRepository`] implements `EntityRepository` for every
//! entity type; each type describes its table through [`Table`]. Rows are
//! always scoped to the calling user.

mod error;
pub mod pg_repository;
pub mod tables;

use std::sync::Arc;

use sqlx::PgPool;
use sqlx::migrate::MigrateError;
use troupe_entity_store::Repositories;

pub use pg_repository::PgRepository;
pub use tables::Table;

/// Apply the bundled migrations.
///
/// # Errors
///
/// Returns the migration error when a migration fails or the database
/// holds a migration this build does not know.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

/// `PostgreSQL` repositories for every entity, sharing `pool`.
#[must_use]
pub fn repositories(pool: &PgPool) -> Repositories {
    Repositories {
        personas: Arc::new(PgRepository::new(pool.clone())),
        relations: Arc::new(PgRepository::new(pool.clone())),
        models: Arc::new(PgRepository::new(pool.clone())),
        assistants: Arc::new(PgRepository::new(pool.clone())),
        worlds: Arc::new(PgRepository::new(pool.clone())),
        scenarios: Arc::new(PgRepository::new(pool.clone())),
        productions: Arc::new(PgRepository::new(pool.clone())),
        turns: Arc::new(PgRepository::new(pool.clone())),
    }
}
