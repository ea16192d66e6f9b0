//! Meilisearch-backed search provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{QueryOptions, SearchError, SearchProvider};

#[derive(Clone)]
pub struct MeiliProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Vec<Value>,
}

impl MeiliProvider {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    async fn check(response: reqwest::Response, context: &str) -> Result<reqwest::Response, String> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(format!("{}: {} {}", context, status, body))
        }
    }
}

#[async_trait]
impl SearchProvider for MeiliProvider {
    #[tracing::instrument(skip(self, documents), fields(search.index = %index, count = documents.len()))]
    async fn index(&self, index: &str, documents: Vec<Value>) -> Result<(), SearchError> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/indexes/{}/documents", index),
            )
            .json(&documents)
            .send()
            .await
            .map_err(|e| SearchError::BackendError(e.to_string()))?;
        Self::check(response, "index")
            .await
            .map_err(SearchError::IndexFailed)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, documents), fields(search.index = %index, count = documents.len()))]
    async fn update(&self, index: &str, documents: Vec<Value>) -> Result<(), SearchError> {
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/indexes/{}/documents", index),
            )
            .json(&documents)
            .send()
            .await
            .map_err(|e| SearchError::BackendError(e.to_string()))?;
        Self::check(response, "update")
            .await
            .map_err(SearchError::IndexFailed)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, ids), fields(search.index = %index, count = ids.len()))]
    async fn delete(&self, index: &str, ids: &[String]) -> Result<(), SearchError> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/indexes/{}/documents/delete-batch", index),
            )
            .json(&ids)
            .send()
            .await
            .map_err(|e| SearchError::BackendError(e.to_string()))?;
        Self::check(response, "delete")
            .await
            .map_err(SearchError::DeleteFailed)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, options), fields(search.index = %index))]
    async fn query(
        &self,
        index: &str,
        text: &str,
        options: QueryOptions,
    ) -> Result<Vec<Value>, SearchError> {
        let mut body = json!({ "q": text });
        if let Some(filter) = options.filter.filter(|f| !f.is_empty()) {
            body["filter"] = json!(filter.to_string());
        }
        if let Some(limit) = options.limit {
            body["limit"] = json!(limit);
        }
        let response = self
            .request(reqwest::Method::POST, &format!("/indexes/{}/search", index))
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::BackendError(e.to_string()))?;
        let response = Self::check(response, "query")
            .await
            .map_err(SearchError::QueryFailed)?;
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::QueryFailed(e.to_string()))?;
        Ok(parsed.hits)
    }
}
