use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use depot_core::models::Task;
use depot_core::AppError;

use crate::repo::TaskRepo;

/// Repository for user-visible progress tasks
#[derive(Clone)]
pub struct TaskRepository {
    pool: PgPool,
}

impl TaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TASK_COLUMNS: &str =
    "id, user_id, name, status, is_indeterminate, percentage, payload, error, create_time, update_time";

#[async_trait]
impl TaskRepo for TaskRepository {
    #[tracing::instrument(skip(self, task), fields(db.table = "task", db.operation = "insert", db.record_id = %task.id))]
    async fn insert(&self, task: &Task) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO task (id, user_id, name, status, is_indeterminate, percentage, payload, error, create_time, update_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(task.id)
        .bind(task.user_id)
        .bind(&task.name)
        .bind(task.status.to_string())
        .bind(task.is_indeterminate)
        .bind(task.percentage)
        .bind(Json(&task.payload))
        .bind(&task.error)
        .bind(task.create_time)
        .bind(task.update_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task), fields(db.table = "task", db.operation = "update", db.record_id = %task.id))]
    async fn save(&self, task: &Task) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE task
            SET name = $2, status = $3, is_indeterminate = $4, percentage = $5,
                payload = $6, error = $7, update_time = $8
            WHERE id = $1
            "#,
        )
        .bind(task.id)
        .bind(&task.name)
        .bind(task.status.to_string())
        .bind(task.is_indeterminate)
        .bind(task.percentage)
        .bind(Json(&task.payload))
        .bind(&task.error)
        .bind(task.update_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "task", db.operation = "select", db.record_id = %id))]
    async fn find(&self, id: Uuid) -> Result<Task, AppError> {
        self.find_optional(id)
            .await?
            .ok_or_else(|| AppError::TaskNotFound(id.to_string()))
    }

    #[tracing::instrument(skip(self), fields(db.table = "task", db.operation = "select", db.record_id = %id))]
    async fn find_optional(&self, id: Uuid) -> Result<Option<Task>, AppError> {
        let task = sqlx::query_as::<Postgres, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM task WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    #[tracing::instrument(skip(self), fields(db.table = "task", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM task WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "task", db.operation = "select"))]
    async fn find_ids_by_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<Postgres, Uuid>(
            "SELECT id FROM task WHERE user_id = $1 ORDER BY create_time ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    #[tracing::instrument(skip(self), fields(db.table = "task", db.operation = "select"))]
    async fn count_by_user(&self, user_id: Uuid) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<Postgres, i64>("SELECT COUNT(*) FROM task WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
