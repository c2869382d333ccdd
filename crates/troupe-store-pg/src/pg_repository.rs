//! `PostgreSQL` implementation of the `EntityRepository` trait.

use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};
use troupe_core::error::DomainError;
use troupe_core::repository::EntityRepository;
use uuid::Uuid;

use crate::error::{Op, storage_error};
use crate::tables::Table;

/// PostgreSQL-backed repository of one entity type.
#[derive(Debug)]
pub struct PgRepository<T> {
    pool: PgPool,
    entity: PhantomData<fn() -> T>,
}

impl<T> Clone for PgRepository<T> {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

impl<T> PgRepository<T> {
    /// Creates a new `PgRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            entity: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Table> EntityRepository<T> for PgRepository<T> {
    #[instrument(skip(self), fields(table = T::NAME))]
    async fn list(&self, user_id: Uuid) -> Result<Vec<T>, DomainError> {
        let rows = sqlx::query(T::SELECT)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error(T::KIND, Op::Read, &e))?;
        debug!(rows = rows.len(), "rows fetched");
        rows.iter()
            .map(T::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| storage_error(T::KIND, Op::Read, &e))
    }

    #[instrument(skip(self, entity), fields(table = T::NAME))]
    async fn insert(&self, user_id: Uuid, entity: &T) -> Result<T, DomainError> {
        let mut stored = entity.clone();
        stored.set_id(Uuid::new_v4());
        let write = |e: sqlx::Error| storage_error(T::KIND, Op::Write, &e);

        let mut tx = self.pool.begin().await.map_err(write)?;
        T::insert_row(&mut tx, user_id, &stored).await.map_err(write)?;
        T::write_links(&mut tx, &stored).await.map_err(write)?;
        tx.commit().await.map_err(write)?;
        debug!(id = %stored.id(), "row inserted");
        Ok(stored)
    }

    #[instrument(skip(self, entity), fields(table = T::NAME, id = %entity.id()))]
    async fn update(&self, user_id: Uuid, entity: &T) -> Result<T, DomainError> {
        let write = |e: sqlx::Error| storage_error(T::KIND, Op::Write, &e);

        let mut tx = self.pool.begin().await.map_err(write)?;
        let affected = T::update_row(&mut tx, user_id, entity).await.map_err(write)?;
        if affected == 0 {
            return Err(DomainError::not_found(T::KIND, entity.id()));
        }
        T::write_links(&mut tx, entity).await.map_err(write)?;
        tx.commit().await.map_err(write)?;
        Ok(entity.clone())
    }

    #[instrument(skip(self), fields(table = T::NAME))]
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), DomainError> {
        let sql = format!("DELETE FROM {} WHERE id = $1 AND user_id = $2", T::NAME);
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error(T::KIND, Op::Delete, &e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(T::KIND, id));
        }
        Ok(())
    }
}
