//! File entity wrapper over the search provider.

use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::File;
use depot_core::AppError;

use crate::{Filter, QueryOptions, SearchProvider};

const FILE_INDEX: &str = "file";

#[derive(Clone)]
pub struct FileSearch {
    provider: Arc<dyn SearchProvider>,
}

impl FileSearch {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    fn to_documents(files: &[File]) -> Result<Vec<Value>, AppError> {
        files
            .iter()
            .map(|file| serde_json::to_value(file).map_err(AppError::from))
            .collect()
    }

    pub async fn index(&self, files: &[File]) -> Result<(), AppError> {
        if files.is_empty() {
            return Ok(());
        }
        self.provider
            .index(FILE_INDEX, Self::to_documents(files)?)
            .await?;
        Ok(())
    }

    pub async fn update(&self, files: &[File]) -> Result<(), AppError> {
        if files.is_empty() {
            return Ok(());
        }
        self.provider
            .update(FILE_INDEX, Self::to_documents(files)?)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, ids: &[Uuid]) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        self.provider.delete(FILE_INDEX, &ids).await?;
        Ok(())
    }

    /// Text query scoped to one workspace; returns matching file ids.
    pub async fn query(&self, text: &str, workspace_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let options = QueryOptions {
            filter: Some(Filter::new().eq("workspace_id", workspace_id)),
            limit: None,
        };
        let hits = self.provider.query(FILE_INDEX, text, options).await?;
        Ok(hit_ids(hits))
    }
}

pub(crate) fn hit_ids(hits: Vec<Value>) -> Vec<Uuid> {
    hits.iter()
        .filter_map(|hit| hit.get("id"))
        .filter_map(Value::as_str)
        .filter_map(|id| id.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySearchProvider;
    use depot_core::models::FileType;

    #[tokio::test]
    async fn test_index_and_workspace_scoped_query() {
        let provider = Arc::new(MemorySearchProvider::new());
        let search = FileSearch::new(provider.clone());

        let workspace_id = Uuid::new_v4();
        let other_workspace_id = Uuid::new_v4();
        let report = File::new(workspace_id, "quarterly report.pdf", FileType::File);
        let stray = File::new(other_workspace_id, "quarterly report.pdf", FileType::File);
        search.index(&[report.clone(), stray]).await.unwrap();

        let hits = search.query("report", workspace_id).await.unwrap();
        assert_eq!(hits, vec![report.id]);

        search.delete(&[report.id]).await.unwrap();
        assert!(search.query("report", workspace_id).await.unwrap().is_empty());
    }
}
