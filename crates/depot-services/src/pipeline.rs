//! Pipeline trigger client and submission service.
//!
//! External workers (conversion, OCR, mosaic, watermark) are driven by a
//! fire-and-forget run call; they report back through the snapshot patch
//! endpoint. A snapshot with a waiting or running task refuses new
//! submissions, which serializes processing per snapshot.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::{Permission, Snapshot, Task, TaskStatus};
use depot_core::AppError;
use depot_db::SnapshotRepo;

use crate::cache::{FileCache, SnapshotCache, TaskCache};
use crate::guard::FileGuard;
use crate::task_service::TaskService;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<String>,
    pub task_id: Uuid,
    pub snapshot_id: Uuid,
    pub bucket: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Trigger contract for the external worker fleet.
#[async_trait]
pub trait PipelineRunner: Send + Sync {
    async fn run(&self, options: &PipelineRunOptions) -> Result<(), AppError>;
}

/// HTTP client for the conversion service.
#[derive(Clone)]
pub struct ConversionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ConversionClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl PipelineRunner for ConversionClient {
    #[tracing::instrument(skip(self, options), fields(task_id = %options.task_id, snapshot_id = %options.snapshot_id))]
    async fn run(&self, options: &PipelineRunOptions) -> Result<(), AppError> {
        let mut request = self
            .client
            .post(format!("{}/v1/pipelines/run", self.base_url))
            .json(options);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AppError::Pipeline(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::Pipeline(format!(
                "pipeline run rejected: {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Submits processing work for a file's active snapshot.
#[derive(Clone)]
pub struct PipelineService {
    file_cache: FileCache,
    file_guard: FileGuard,
    snapshot_repo: Arc<dyn SnapshotRepo>,
    snapshot_cache: SnapshotCache,
    task_cache: TaskCache,
    task_service: TaskService,
    runner: Arc<dyn PipelineRunner>,
}

impl PipelineService {
    pub fn new(
        file_cache: FileCache,
        file_guard: FileGuard,
        snapshot_repo: Arc<dyn SnapshotRepo>,
        snapshot_cache: SnapshotCache,
        task_cache: TaskCache,
        task_service: TaskService,
        runner: Arc<dyn PipelineRunner>,
    ) -> Self {
        Self {
            file_cache,
            file_guard,
            snapshot_repo,
            snapshot_cache,
            task_cache,
            task_service,
            runner,
        }
    }

    /// Whether the snapshot references a task that is still waiting or
    /// running. A missing task is treated as finished; the reference is
    /// cleared on success but a crash may leave it dangling.
    pub async fn is_task_pending(&self, snapshot: &Snapshot) -> Result<bool, AppError> {
        let Some(task_id) = snapshot.task_id else {
            return Ok(false);
        };
        match self.task_cache.get(task_id).await {
            Ok(task) => Ok(task.is_pending()),
            Err(AppError::TaskNotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Submit the file's active snapshot for processing. Fails loudly when
    /// the snapshot is pending or has no original artifact; bulk reprocess
    /// wraps this with silent per-item rejection.
    #[tracing::instrument(skip(self), fields(file_id = %file_id, user_id = %user_id))]
    pub async fn submit(&self, file_id: Uuid, user_id: Uuid) -> Result<Task, AppError> {
        let file = self.file_cache.get(file_id).await?;
        self.file_guard
            .authorize(user_id, &file, Permission::Editor)
            .await?;
        if !file.is_file() {
            return Err(AppError::FileIsNotAFile(file.id.to_string()));
        }
        let snapshot_id = file
            .snapshot_id
            .ok_or_else(|| AppError::SnapshotNotFound(file.id.to_string()))?;
        let mut snapshot = self.snapshot_cache.get(snapshot_id).await?;
        if self.is_task_pending(&snapshot).await? {
            return Err(AppError::SnapshotHasPendingTask(snapshot.id.to_string()));
        }
        let original = snapshot
            .original
            .clone()
            .ok_or_else(|| AppError::MissingOriginalArtifact(snapshot.id.to_string()))?;

        let task = self
            .task_service
            .insert_and_sync(
                Task::new(user_id, "Waiting.", TaskStatus::Waiting)
                    .with_payload_object(file.name.clone()),
            )
            .await?;
        snapshot.task_id = Some(task.id);
        snapshot.touch();
        self.snapshot_repo.save(&snapshot).await?;
        self.snapshot_cache.set(&snapshot).await;

        self.runner
            .run(&PipelineRunOptions {
                pipeline_id: None,
                task_id: task.id,
                snapshot_id: snapshot.id,
                bucket: original.bucket,
                key: original.key,
                intent: None,
                language: snapshot.language.clone(),
            })
            .await?;
        Ok(task)
    }
}
