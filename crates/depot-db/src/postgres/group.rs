use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

use depot_core::models::Group;
use depot_core::AppError;

use crate::repo::GroupRepo;

/// Repository for groups and their membership table
#[derive(Clone)]
pub struct GroupRepository {
    pool: PgPool,
}

impl GroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_members(&self, group_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let members =
            sqlx::query_scalar::<Postgres, Uuid>("SELECT user_id FROM group_user WHERE group_id = $1")
                .bind(group_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(members)
    }
}

#[async_trait]
impl GroupRepo for GroupRepository {
    #[tracing::instrument(skip(self, group), fields(db.table = "usergroup", db.operation = "insert", db.record_id = %group.id))]
    async fn insert(&self, group: &Group) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO usergroup (id, organization_id, name, create_time, update_time)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(group.id)
        .bind(group.organization_id)
        .bind(&group.name)
        .bind(group.create_time)
        .bind(group.update_time)
        .execute(&self.pool)
        .await?;
        for user_id in &group.members {
            sqlx::query(
                r#"
                INSERT INTO group_user (group_id, user_id, create_time)
                VALUES ($1, $2, NOW())
                ON CONFLICT (group_id, user_id) DO NOTHING
                "#,
            )
            .bind(group.id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "usergroup", db.operation = "select", db.record_id = %id))]
    async fn find(&self, id: Uuid) -> Result<Group, AppError> {
        let row = sqlx::query(
            "SELECT id, organization_id, name, create_time, update_time FROM usergroup WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::GroupNotFound(id.to_string()))?;

        let members = self.find_members(id).await?;
        Ok(Group {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            name: row.get("name"),
            members,
            create_time: row.get("create_time"),
            update_time: row.get("update_time"),
        })
    }

    #[tracing::instrument(skip(self), fields(db.table = "group_user", db.operation = "select"))]
    async fn find_ids_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids =
            sqlx::query_scalar::<Postgres, Uuid>("SELECT group_id FROM group_user WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }
}
