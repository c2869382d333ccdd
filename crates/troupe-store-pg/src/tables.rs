//! Table mappings of every entity type.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, Row};
use troupe_cast::domain::{Assistant, Model, Persona, Relation};
use troupe_core::entity::Entity;
use troupe_core::truth::Truth;
use troupe_production::domain::{Production, Scenario, Turn, TurnRole, World};
use uuid::Uuid;

/// How an entity type is stored. Implemented for every entity; used by
/// [`PgRepository`](crate::PgRepository).
#[async_trait]
pub trait Table: Entity + Sized {
    /// Main table name.
    const NAME: &'static str;

    /// Selects every row of user `$1`, oldest first.
    const SELECT: &'static str;

    /// Decode one row of [`Self::SELECT`].
    ///
    /// # Errors
    ///
    /// Returns the decode error of the first unreadable column.
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error>;

    /// Insert the main row under `entity`'s id.
    async fn insert_row(
        conn: &mut PgConnection,
        user_id: Uuid,
        entity: &Self,
    ) -> Result<(), sqlx::Error>;

    /// Update the main row; returns the affected row count.
    async fn update_row(
        conn: &mut PgConnection,
        user_id: Uuid,
        entity: &Self,
    ) -> Result<u64, sqlx::Error>;

    /// Rewrite the ordered link rows owned by `entity`.
    async fn write_links(_conn: &mut PgConnection, _entity: &Self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

fn truth(row: &PgRow) -> Result<Truth, sqlx::Error> {
    Ok(Truth {
        universal: row.try_get("universal")?,
        internal: row.try_get("internal")?,
        external: row.try_get("external")?,
    })
}

async fn replace_links(
    conn: &mut PgConnection,
    table: &str,
    (owner_column, owner): (&str, Uuid),
    member_column: &str,
    members: &[Uuid],
) -> Result<(), sqlx::Error> {
    let clear = format!("DELETE FROM {table} WHERE {owner_column} = $1");
    sqlx::query(&clear).bind(owner).execute(&mut *conn).await?;
    if members.is_empty() {
        return Ok(());
    }
    let fill = format!(
        "INSERT INTO {table} ({owner_column}, {member_column}, position)
         SELECT $1, member, ordinal
         FROM UNNEST($2::uuid[]) WITH ORDINALITY AS links(member, ordinal)"
    );
    sqlx::query(&fill)
        .bind(owner)
        .bind(members)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[async_trait]
impl Table for Persona {
    const NAME: &'static str = "personas";
    const SELECT: &'static str = "
        SELECT id, user_id, name, universal, internal, external, avatar, created_at
        FROM personas WHERE user_id = $1 ORDER BY created_at, id";

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            truth: truth(row)?,
            avatar: row.try_get("avatar")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn insert_row(
        conn: &mut PgConnection,
        user_id: Uuid,
        entity: &Self,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO personas
                (id, user_id, name, universal, internal, external, avatar, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entity.id)
        .bind(user_id)
        .bind(&entity.name)
        .bind(&entity.truth.universal)
        .bind(&entity.truth.internal)
        .bind(&entity.truth.external)
        .bind(&entity.avatar)
        .bind(entity.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn update_row(
        conn: &mut PgConnection,
        user_id: Uuid,
        entity: &Self,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE personas
             SET name = $3, universal = $4, internal = $5, external = $6, avatar = $7
             WHERE id = $1 AND user_id = $2",
        )
        .bind(entity.id)
        .bind(user_id)
        .bind(&entity.name)
        .bind(&entity.truth.universal)
        .bind(&entity.truth.internal)
        .bind(&entity.truth.external)
        .bind(&entity.avatar)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Table for Relation {
    const NAME: &'static str = "relations";
    const SELECT: &'static str = "
        SELECT r.id, r.user_id, r.name, r.universal, r.internal, r.external, r.created_at,
               ARRAY(SELECT m.persona_id FROM relation_members m
                     WHERE m.relation_id = r.id ORDER BY m.position) AS persona_ids
        FROM relations r WHERE r.user_id = $1 ORDER BY r.created_at, r.id";

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            persona_ids: row.try_get("persona_ids")?,
            truth: truth(row)?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn insert_row(
        conn: &mut PgConnection,
        user_id: Uuid,
        entity: &Self,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO relations
                (id, user_id, name, universal, internal, external, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(entity.id)
        .bind(user_id)
        .bind(&entity.name)
        .bind(&entity.truth.universal)
        .bind(&entity.truth.internal)
        .bind(&entity.truth.external)
        .bind(entity.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn update_row(
        conn: &mut PgConnection,
        user_id: Uuid,
        entity: &Self,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE relations
             SET name = $3, universal = $4, internal = $5, external = $6
             WHERE id = $1 AND user_id = $2",
        )
        .bind(entity.id)
        .bind(user_id)
        .bind(&entity.name)
        .bind(&entity.truth.universal)
        .bind(&entity.truth.internal)
        .bind(&entity.truth.external)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    async fn write_links(conn: &mut PgConnection, entity: &Self) -> Result<(), sqlx::Error> {
        replace_links(
            conn,
            "relation_members",
            ("relation_id", entity.id),
            "persona_id",
            &entity.persona_ids,
        )
        .await
    }
}

#[async_trait]
impl Table for Model {
    const NAME: &'static str = "models";
    const SELECT: &'static str = "
        SELECT id, user_id, name, endpoint, api_key, upstream_model, is_default, parameters,
               created_at
        FROM models WHERE user_id = $1 ORDER BY created_at, id";

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            endpoint: row.try_get("endpoint")?,
            api_key: row.try_get("api_key")?,
            upstream_model: row.try_get("upstream_model")?,
            is_default: row.try_get("is_default")?,
            parameters: row.try_get::<Json<_>, _>("parameters")?.0,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn insert_row(
        conn: &mut PgConnection,
        user_id: Uuid,
        entity: &Self,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO models (id, user_id, name, endpoint, api_key, upstream_model,
                                 is_default, parameters, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(entity.id)
        .bind(user_id)
        .bind(&entity.name)
        .bind(&entity.endpoint)
        .bind(&entity.api_key)
        .bind(&entity.upstream_model)
        .bind(entity.is_default)
        .bind(Json(&entity.parameters))
        .bind(entity.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn update_row(
        conn: &mut PgConnection,
        user_id: Uuid,
        entity: &Self,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE models
             SET name = $3, endpoint = $4, api_key = $5, upstream_model = $6,
                 is_default = $7, parameters = $8
             WHERE id = $1 AND user_id = $2",
        )
        .bind(entity.id)
        .bind(user_id)
        .bind(&entity.name)
        .bind(&entity.endpoint)
        .bind(&entity.api_key)
        .bind(&entity.upstream_model)
        .bind(entity.is_default)
        .bind(Json(&entity.parameters))
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Table for Assistant {
    const NAME: &'static str = "assistants";
    const SELECT: &'static str = "
        SELECT id, user_id, persona_id, model_id, name, parameters, created_at
        FROM assistants WHERE user_id = $1 ORDER BY created_at, id";

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            persona_id: row.try_get("persona_id")?,
            model_id: row.try_get("model_id")?,
            name: row.try_get("name")?,
            parameters: row.try_get::<Json<_>, _>("parameters")?.0,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn insert_row(
        conn: &mut PgConnection,
        user_id: Uuid,
        entity: &Self,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO assistants
                (id, user_id, persona_id, model_id, name, parameters, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(entity.id)
        .bind(user_id)
        .bind(entity.persona_id)
        .bind(entity.model_id)
        .bind(&entity.name)
        .bind(Json(&entity.parameters))
        .bind(entity.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn update_row(
        conn: &mut PgConnection,
        user_id: Uuid,
        entity: &Self,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE assistants
             SET persona_id = $3, model_id = $4, name = $5, parameters = $6
             WHERE id = $1 AND user_id = $2",
        )
        .bind(entity.id)
        .bind(user_id)
        .bind(entity.persona_id)
        .bind(entity.model_id)
        .bind(&entity.name)
        .bind(Json(&entity.parameters))
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Worlds and scenarios share one layout.
macro_rules! setting_table {
    ($entity:ty, $table:literal) => {
        #[async_trait]
        impl Table for $entity {
            const NAME: &'static str = $table;
            const SELECT: &'static str = concat!(
                "SELECT id, user_id, name, description, created_at FROM ",
                $table,
                " WHERE user_id = $1 ORDER BY created_at, id"
            );

            fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
                Ok(Self {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    name: row.try_get("name")?,
                    description: row.try_get("description")?,
                    created_at: row.try_get("created_at")?,
                })
            }

            async fn insert_row(
                conn: &mut PgConnection,
                user_id: Uuid,
                entity: &Self,
            ) -> Result<(), sqlx::Error> {
                sqlx::query(concat!(
                    "INSERT INTO ",
                    $table,
                    " (id, user_id, name, description, created_at) VALUES ($1, $2, $3, $4, $5)"
                ))
                .bind(entity.id)
                .bind(user_id)
                .bind(&entity.name)
                .bind(&entity.description)
                .bind(entity.created_at)
                .execute(conn)
                .await?;
                Ok(())
            }

            async fn update_row(
                conn: &mut PgConnection,
                user_id: Uuid,
                entity: &Self,
            ) -> Result<u64, sqlx::Error> {
                let result = sqlx::query(concat!(
                    "UPDATE ",
                    $table,
                    " SET name = $3, description = $4 WHERE id = $1 AND user_id = $2"
                ))
                .bind(entity.id)
                .bind(user_id)
                .bind(&entity.name)
                .bind(&entity.description)
                .execute(conn)
                .await?;
                Ok(result.rows_affected())
            }
        }
    };
}

setting_table!(World, "worlds");
setting_table!(Scenario, "scenarios");

#[async_trait]
impl Table for Production {
    const NAME: &'static str = "productions";
    const SELECT: &'static str = "
        SELECT p.id, p.user_id, p.name, p.world_id, p.scenario_id, p.created_at,
               ARRAY(SELECT a.assistant_id FROM production_assistants a
                     WHERE a.production_id = p.id ORDER BY a.position) AS assistant_ids,
               ARRAY(SELECT c.persona_id FROM production_personas c
                     WHERE c.production_id = p.id ORDER BY c.position) AS persona_ids,
               ARRAY(SELECT r.relation_id FROM production_relations r
                     WHERE r.production_id = p.id ORDER BY r.position) AS relation_ids
        FROM productions p WHERE p.user_id = $1 ORDER BY p.created_at, p.id";

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            world_id: row.try_get("world_id")?,
            scenario_id: row.try_get("scenario_id")?,
            assistant_ids: row.try_get("assistant_ids")?,
            persona_ids: row.try_get("persona_ids")?,
            relation_ids: row.try_get("relation_ids")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn insert_row(
        conn: &mut PgConnection,
        user_id: Uuid,
        entity: &Self,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO productions (id, user_id, name, world_id, scenario_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entity.id)
        .bind(user_id)
        .bind(&entity.name)
        .bind(entity.world_id)
        .bind(entity.scenario_id)
        .bind(entity.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn update_row(
        conn: &mut PgConnection,
        user_id: Uuid,
        entity: &Self,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE productions SET name = $3, world_id = $4, scenario_id = $5
             WHERE id = $1 AND user_id = $2",
        )
        .bind(entity.id)
        .bind(user_id)
        .bind(&entity.name)
        .bind(entity.world_id)
        .bind(entity.scenario_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    async fn write_links(conn: &mut PgConnection, entity: &Self) -> Result<(), sqlx::Error> {
        let owner = ("production_id", entity.id);
        replace_links(
            conn,
            "production_assistants",
            owner,
            "assistant_id",
            &entity.assistant_ids,
        )
        .await?;
        replace_links(conn, "production_personas", owner, "persona_id", &entity.persona_ids).await?;
        replace_links(
            conn,
            "production_relations",
            owner,
            "relation_id",
            &entity.relation_ids,
        )
        .await
    }
}

fn role(text: &str) -> Result<TurnRole, sqlx::Error> {
    match text {
        "user" => Ok(TurnRole::User),
        "assistant" => Ok(TurnRole::Assistant),
        other => Err(sqlx::Error::ColumnDecode {
            index: "role".into(),
            source: format!("unknown turn role {other:?}").into(),
        }),
    }
}

#[async_trait]
impl Table for Turn {
    const NAME: &'static str = "turns";
    const SELECT: &'static str = "
        SELECT id, user_id, production_id, role, assistant_id, parent_id, content, directive,
               created_at
        FROM turns WHERE user_id = $1 ORDER BY created_at, id";

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            production_id: row.try_get("production_id")?,
            role: role(row.try_get("role")?)?,
            assistant_id: row.try_get("assistant_id")?,
            parent_id: row.try_get("parent_id")?,
            content: row.try_get::<Json<_>, _>("content")?.0,
            directive: row.try_get("directive")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn insert_row(
        conn: &mut PgConnection,
        user_id: Uuid,
        entity: &Self,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO turns (id, user_id, production_id, role, assistant_id, parent_id,
                                content, directive, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(entity.id)
        .bind(user_id)
        .bind(entity.production_id)
        .bind(entity.role.as_str())
        .bind(entity.assistant_id)
        .bind(entity.parent_id)
        .bind(Json(&entity.content))
        .bind(entity.directive)
        .bind(entity.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn update_row(
        conn: &mut PgConnection,
        user_id: Uuid,
        entity: &Self,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE turns SET assistant_id = $3, content = $4, directive = $5
             WHERE id = $1 AND user_id = $2",
        )
        .bind(entity.id)
        .bind(user_id)
        .bind(entity.assistant_id)
        .bind(Json(&entity.content))
        .bind(entity.directive)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}
