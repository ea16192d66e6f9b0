//! Configuration module
//!
//! Environment-backed configuration for the metadata service and its
//! external collaborators (database, blob store, search index, conversion
//! pipeline).

use std::env;

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_PROCESSING_LIMIT_MB: u64 = 512;
const DEFAULT_BULK_CHUNK_SIZE: usize = 1000;

#[derive(Clone, Debug)]
pub struct DepotConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    // Blob storage (S3-compatible endpoint; MinIO in development)
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    // Search index
    pub search_url: String,
    pub search_api_key: Option<String>,
    // Conversion pipeline workers
    pub pipeline_url: String,
    pub pipeline_api_key: Option<String>,
    /// Content larger than this skips automatic processing; the snapshot is
    /// stored as ready with only its original artifact.
    pub processing_limit_mb: u64,
    /// Chunk size for bulk inserts/deletes over subtrees.
    pub bulk_chunk_size: usize,
}

impl DepotConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env if present; ignore absence in production
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            s3_region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            search_url: env::var("SEARCH_URL")
                .unwrap_or_else(|_| "http://localhost:7700".to_string()),
            search_api_key: env::var("SEARCH_API_KEY").ok(),
            pipeline_url: env::var("PIPELINE_URL")
                .unwrap_or_else(|_| "http://localhost:8083".to_string()),
            pipeline_api_key: env::var("PIPELINE_API_KEY").ok(),
            processing_limit_mb: parse_env("PROCESSING_LIMIT_MB", DEFAULT_PROCESSING_LIMIT_MB),
            bulk_chunk_size: parse_env("BULK_CHUNK_SIZE", DEFAULT_BULK_CHUNK_SIZE),
        })
    }

    pub fn processing_limit_bytes(&self) -> u64 {
        self.processing_limit_mb * 1024 * 1024
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_limit_bytes() {
        let config = DepotConfig {
            database_url: "postgres://localhost/depot".to_string(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            s3_endpoint: None,
            s3_region: "us-east-1".to_string(),
            search_url: "http://localhost:7700".to_string(),
            search_api_key: None,
            pipeline_url: "http://localhost:8083".to_string(),
            pipeline_api_key: None,
            processing_limit_mb: 2,
            bulk_chunk_size: DEFAULT_BULK_CHUNK_SIZE,
        };
        assert_eq!(config.processing_limit_bytes(), 2 * 1024 * 1024);
    }
}
