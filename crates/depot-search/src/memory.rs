//! In-memory search provider for tests.
//!
//! Documents are matched by case-insensitive substring over their string
//! fields; filters apply the same AND-joined field-equality semantics as
//! the production backend.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{QueryOptions, SearchError, SearchProvider};

#[derive(Clone, Default)]
pub struct MemorySearchProvider {
    indexes: Arc<Mutex<HashMap<String, HashMap<String, Value>>>>,
}

impl MemorySearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, index: &str, id: &str) -> bool {
        self.indexes
            .lock()
            .unwrap()
            .get(index)
            .is_some_and(|documents| documents.contains_key(id))
    }

    pub fn len(&self, index: &str) -> usize {
        self.indexes
            .lock()
            .unwrap()
            .get(index)
            .map(|documents| documents.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, index: &str) -> bool {
        self.len(index) == 0
    }

    fn document_id(document: &Value) -> Option<String> {
        document
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn matches_text(document: &Value, text: &str) -> bool {
        if text.is_empty() {
            return true;
        }
        let needle = text.to_lowercase();
        document.as_object().is_some_and(|fields| {
            fields
                .values()
                .filter_map(Value::as_str)
                .any(|value| value.to_lowercase().contains(&needle))
        })
    }

    fn matches_filter(document: &Value, options: &QueryOptions) -> bool {
        let Some(ref filter) = options.filter else {
            return true;
        };
        filter.clauses().iter().all(|(field, expected)| {
            document
                .get(field)
                .map(|value| match value {
                    Value::String(s) => s == expected,
                    other => other.to_string() == *expected,
                })
                .unwrap_or(false)
        })
    }
}

#[async_trait]
impl SearchProvider for MemorySearchProvider {
    async fn index(&self, index: &str, documents: Vec<Value>) -> Result<(), SearchError> {
        let mut indexes = self.indexes.lock().unwrap();
        let entries = indexes.entry(index.to_string()).or_default();
        for document in documents {
            let id = Self::document_id(&document)
                .ok_or_else(|| SearchError::IndexFailed("document without id".to_string()))?;
            entries.insert(id, document);
        }
        Ok(())
    }

    async fn update(&self, index: &str, documents: Vec<Value>) -> Result<(), SearchError> {
        self.index(index, documents).await
    }

    async fn delete(&self, index: &str, ids: &[String]) -> Result<(), SearchError> {
        let mut indexes = self.indexes.lock().unwrap();
        if let Some(entries) = indexes.get_mut(index) {
            for id in ids {
                entries.remove(id);
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        index: &str,
        text: &str,
        options: QueryOptions,
    ) -> Result<Vec<Value>, SearchError> {
        let indexes = self.indexes.lock().unwrap();
        let mut hits: Vec<Value> = indexes
            .get(index)
            .map(|entries| {
                entries
                    .values()
                    .filter(|d| Self::matches_text(d, text))
                    .filter(|d| Self::matches_filter(d, &options))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(limit) = options.limit {
            hits.truncate(limit);
        }
        Ok(hits)
    }
}
