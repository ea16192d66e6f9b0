//! New-content ingestion.
//!
//! Storing content creates the file's next snapshot version, uploads the
//! original artifact (unless the content already sits in the blob store),
//! makes the snapshot active, and hands the file to the processing
//! pipeline. Content over the processing limit is stored ready as-is,
//! with only its original artifact.

use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::{File, Permission, S3Object, Snapshot, SnapshotStatus};
use depot_core::AppError;
use depot_db::SnapshotRepo;
use depot_storage::{artifact_key, BlobStore};

use crate::cache::{FileCache, WorkspaceCache};
use crate::file::sync::FileSync;
use crate::guard::FileGuard;
use crate::pipeline::PipelineService;
use crate::snapshot_service::SnapshotService;

/// Content already uploaded to the blob store (presigned-upload flows).
#[derive(Debug, Clone)]
pub struct S3Reference {
    pub snapshot_id: Uuid,
    pub bucket: String,
    pub key: String,
    pub size: i64,
    pub content_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub path: Option<PathBuf>,
    pub s3_reference: Option<S3Reference>,
}

struct StoreProperties {
    snapshot_id: Uuid,
    size: i64,
    original: S3Object,
    content_type: String,
    upload_from: Option<PathBuf>,
    exceeds_processing_limit: bool,
}

#[derive(Clone)]
pub struct FileStoreService {
    file_cache: FileCache,
    file_guard: FileGuard,
    file_sync: FileSync,
    workspace_cache: WorkspaceCache,
    snapshot_repo: Arc<dyn SnapshotRepo>,
    snapshot_service: SnapshotService,
    pipeline_service: PipelineService,
    blob_store: Arc<dyn BlobStore>,
    processing_limit_bytes: u64,
}

impl FileStoreService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_cache: FileCache,
        file_guard: FileGuard,
        file_sync: FileSync,
        workspace_cache: WorkspaceCache,
        snapshot_repo: Arc<dyn SnapshotRepo>,
        snapshot_service: SnapshotService,
        pipeline_service: PipelineService,
        blob_store: Arc<dyn BlobStore>,
        processing_limit_bytes: u64,
    ) -> Self {
        Self {
            file_cache,
            file_guard,
            file_sync,
            workspace_cache,
            snapshot_repo,
            snapshot_service,
            pipeline_service,
            blob_store,
            processing_limit_bytes,
        }
    }

    #[tracing::instrument(skip(self, options), fields(file_id = %id, user_id = %user_id))]
    pub async fn store(
        &self,
        id: Uuid,
        options: StoreOptions,
        user_id: Uuid,
    ) -> Result<File, AppError> {
        let file = self.file_cache.get(id).await?;
        self.file_guard
            .authorize(user_id, &file, Permission::Editor)
            .await?;
        if !file.is_file() {
            return Err(AppError::FileIsNotAFile(file.id.to_string()));
        }

        let props = self.resolve_properties(&file, options).await?;
        if let Some(ref path) = props.upload_from {
            let data = tokio::fs::read(path).await?;
            self.blob_store
                .put_object(
                    &props.original.key,
                    Bytes::from(data),
                    &props.content_type,
                    &props.original.bucket,
                )
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;
        }

        let snapshot = self.create_snapshot(&file, &props).await?;
        let file = self.assign_snapshot(file, &snapshot).await?;
        if !props.exceeds_processing_limit {
            self.pipeline_service.submit(file.id, user_id).await?;
        }
        Ok(file)
    }

    async fn resolve_properties(
        &self,
        file: &File,
        options: StoreOptions,
    ) -> Result<StoreProperties, AppError> {
        let mut props = if let Some(reference) = options.s3_reference {
            StoreProperties {
                snapshot_id: reference.snapshot_id,
                size: reference.size,
                original: S3Object::new(reference.bucket, reference.key).with_size(reference.size),
                content_type: reference.content_type,
                upload_from: None,
                exceeds_processing_limit: false,
            }
        } else if let Some(path) = options.path {
            let metadata = tokio::fs::metadata(&path).await?;
            let workspace = self.workspace_cache.get(file.workspace_id).await?;
            let snapshot_id = Uuid::new_v4();
            let extension = path
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
                .unwrap_or_default();
            let key = artifact_key(snapshot_id, &format!("original{}", extension));
            StoreProperties {
                snapshot_id,
                size: metadata.len() as i64,
                original: S3Object::new(workspace.bucket, key).with_size(metadata.len() as i64),
                content_type: content_type_for(&extension),
                upload_from: Some(path),
                exceeds_processing_limit: false,
            }
        } else {
            return Err(AppError::InvalidInput(
                "either path or s3_reference is required".to_string(),
            ));
        };
        props.exceeds_processing_limit = props.size as u64 > self.processing_limit_bytes;
        Ok(props)
    }

    async fn create_snapshot(
        &self,
        file: &File,
        props: &StoreProperties,
    ) -> Result<Snapshot, AppError> {
        let latest_version = self
            .snapshot_repo
            .find_latest_version_for_file(file.id)
            .await?;
        let mut snapshot = Snapshot::new(latest_version + 1);
        snapshot.id = props.snapshot_id;
        snapshot.status = if props.exceeds_processing_limit {
            SnapshotStatus::Ready
        } else {
            SnapshotStatus::Waiting
        };
        snapshot.original = Some(props.original.clone());
        self.snapshot_service.insert_and_sync(&snapshot).await?;
        Ok(snapshot)
    }

    async fn assign_snapshot(&self, mut file: File, snapshot: &Snapshot) -> Result<File, AppError> {
        file.snapshot_id = Some(snapshot.id);
        file.touch();
        self.file_sync.save_and_sync(&file).await?;
        self.snapshot_repo.map_with_file(snapshot.id, file.id).await?;
        Ok(file)
    }
}

/// Minimal extension-to-MIME mapping for original artifacts; the workers
/// sniff the real type during processing.
fn content_type_for(extension: &str) -> String {
    match extension {
        ".pdf" => "application/pdf",
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".tiff" | ".tif" => "image/tiff",
        ".txt" => "text/plain",
        ".csv" => "text/csv",
        ".doc" => "application/msword",
        ".docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".xls" => "application/vnd.ms-excel",
        ".xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".ppt" => "application/vnd.ms-powerpoint",
        ".pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ".odt" => "application/vnd.oasis.opendocument.text",
        _ => "application/octet-stream",
    }
    .to_string()
}
