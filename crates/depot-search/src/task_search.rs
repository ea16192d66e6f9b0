//! Task entity wrapper over the search provider.

use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::Task;
use depot_core::AppError;

use crate::file_search::hit_ids;
use crate::{Filter, QueryOptions, SearchProvider};

const TASK_INDEX: &str = "task";

#[derive(Clone)]
pub struct TaskSearch {
    provider: Arc<dyn SearchProvider>,
}

impl TaskSearch {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    fn to_documents(tasks: &[Task]) -> Result<Vec<Value>, AppError> {
        tasks
            .iter()
            .map(|task| serde_json::to_value(task).map_err(AppError::from))
            .collect()
    }

    pub async fn index(&self, tasks: &[Task]) -> Result<(), AppError> {
        if tasks.is_empty() {
            return Ok(());
        }
        self.provider
            .index(TASK_INDEX, Self::to_documents(tasks)?)
            .await?;
        Ok(())
    }

    pub async fn update(&self, tasks: &[Task]) -> Result<(), AppError> {
        if tasks.is_empty() {
            return Ok(());
        }
        self.provider
            .update(TASK_INDEX, Self::to_documents(tasks)?)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, ids: &[Uuid]) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        self.provider.delete(TASK_INDEX, &ids).await?;
        Ok(())
    }

    /// Text query scoped to the owning user; returns matching task ids.
    pub async fn query(&self, text: &str, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let options = QueryOptions {
            filter: Some(Filter::new().eq("user_id", user_id)),
            limit: None,
        };
        let hits = self.provider.query(TASK_INDEX, text, options).await?;
        Ok(hit_ids(hits))
    }
}
