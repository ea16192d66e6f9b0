//! Search index abstraction for Depot
//!
//! The [`SearchProvider`] trait hides the engine behind an
//! index/update/delete/query surface with AND-joined field-equality
//! filters. [`meilisearch::MeiliProvider`] is the production backend;
//! [`memory::MemorySearchProvider`] implements the same contract for
//! tests. [`FileSearch`] and [`TaskSearch`] are the entity-specific
//! wrappers used by the service layer.

pub mod file_search;
pub mod meilisearch;
pub mod memory;
pub mod task_search;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error;

pub use file_search::FileSearch;
pub use meilisearch::MeiliProvider;
pub use memory::MemorySearchProvider;
pub use task_search::TaskSearch;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Index operation failed: {0}")]
    IndexFailed(String),

    #[error("Delete operation failed: {0}")]
    DeleteFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Search backend error: {0}")]
    BackendError(String),
}

impl From<SearchError> for depot_core::AppError {
    fn from(err: SearchError) -> Self {
        depot_core::AppError::Search(err.to_string())
    }
}

/// AND-joined field-equality filter, rendered as
/// `field = "value" AND other = "value"`.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, String)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl ToString) -> Self {
        self.clauses.push((field.into(), value.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[(String, String)] {
        &self.clauses
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let rendered: Vec<String> = self
            .clauses
            .iter()
            .map(|(field, value)| format!("{} = \"{}\"", field, value))
            .collect();
        write!(f, "{}", rendered.join(" AND "))
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub filter: Option<Filter>,
    pub limit: Option<usize>,
}

/// Engine-agnostic search index surface.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn index(&self, index: &str, documents: Vec<Value>) -> Result<(), SearchError>;

    async fn update(&self, index: &str, documents: Vec<Value>) -> Result<(), SearchError>;

    async fn delete(&self, index: &str, ids: &[String]) -> Result<(), SearchError>;

    async fn query(
        &self,
        index: &str,
        text: &str,
        options: QueryOptions,
    ) -> Result<Vec<Value>, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_rendering() {
        let filter = Filter::new()
            .eq("workspace_id", "X")
            .eq("file_type", "file");
        assert_eq!(filter.to_string(), "workspace_id = \"X\" AND file_type = \"file\"");
    }

    #[test]
    fn test_empty_filter() {
        let filter = Filter::new();
        assert!(filter.is_empty());
        assert_eq!(filter.to_string(), "");
    }
}
