//! Snapshot/version management.
//!
//! Snapshots are immutable content versions scoped to a file. Versions
//! strictly increase and are never reused; the file's active pointer
//! selects the version presented as its content. Deleting the active
//! snapshot reactivates the immediate predecessor, not the overall latest
//! remaining version.

use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::{
    File, Permission, S3Object, Snapshot, SnapshotStatus, TaskStatus,
};
use depot_core::AppError;
use depot_db::{FileRepo, SnapshotRepo};
use depot_search::FileSearch;
use depot_storage::BlobStore;

use crate::cache::{FileCache, SnapshotCache};
use crate::guard::FileGuard;
use crate::task_service::TaskService;
use crate::{paginate, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotSortBy {
    #[default]
    Version,
    DateCreated,
    DateModified,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotListOptions {
    pub page: u64,
    pub size: u64,
    pub sort_by: SnapshotSortBy,
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone)]
pub struct SnapshotList {
    pub data: Vec<Snapshot>,
    pub active_snapshot_id: Option<Uuid>,
    pub total_pages: u64,
    pub total_elements: u64,
    pub page: u64,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct SnapshotProbe {
    pub total_elements: u64,
    pub total_pages: u64,
}

/// Field-mask update applied by worker callbacks. `task_id` distinguishes
/// "leave unchanged" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct SnapshotPatchOptions {
    pub original: Option<S3Object>,
    pub preview: Option<S3Object>,
    pub ocr: Option<S3Object>,
    pub text: Option<S3Object>,
    pub entities: Option<S3Object>,
    pub mosaic: Option<S3Object>,
    pub thumbnail: Option<S3Object>,
    pub watermark: Option<S3Object>,
    pub status: Option<SnapshotStatus>,
    pub language: Option<String>,
    pub task_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone)]
pub struct SnapshotLanguage {
    pub id: &'static str,
    pub iso639_3: &'static str,
    pub name: &'static str,
}

const LANGUAGES: &[SnapshotLanguage] = &[
    SnapshotLanguage { id: "ara", iso639_3: "ara", name: "Arabic" },
    SnapshotLanguage { id: "chi_sim", iso639_3: "zho", name: "Chinese Simplified" },
    SnapshotLanguage { id: "chi_tra", iso639_3: "zho", name: "Chinese Traditional" },
    SnapshotLanguage { id: "dan", iso639_3: "dan", name: "Danish" },
    SnapshotLanguage { id: "deu", iso639_3: "deu", name: "German" },
    SnapshotLanguage { id: "eng", iso639_3: "eng", name: "English" },
    SnapshotLanguage { id: "fin", iso639_3: "fin", name: "Finnish" },
    SnapshotLanguage { id: "fra", iso639_3: "fra", name: "French" },
    SnapshotLanguage { id: "hin", iso639_3: "hin", name: "Hindi" },
    SnapshotLanguage { id: "ita", iso639_3: "ita", name: "Italian" },
    SnapshotLanguage { id: "jpn", iso639_3: "jpn", name: "Japanese" },
    SnapshotLanguage { id: "nld", iso639_3: "nld", name: "Dutch" },
    SnapshotLanguage { id: "nor", iso639_3: "nor", name: "Norwegian" },
    SnapshotLanguage { id: "por", iso639_3: "por", name: "Portuguese" },
    SnapshotLanguage { id: "rus", iso639_3: "rus", name: "Russian" },
    SnapshotLanguage { id: "spa", iso639_3: "spa", name: "Spanish" },
    SnapshotLanguage { id: "swe", iso639_3: "swe", name: "Swedish" },
];

#[derive(Clone)]
pub struct SnapshotService {
    snapshot_repo: Arc<dyn SnapshotRepo>,
    snapshot_cache: SnapshotCache,
    file_repo: Arc<dyn FileRepo>,
    file_cache: FileCache,
    file_guard: FileGuard,
    file_search: FileSearch,
    task_service: TaskService,
    blob_store: Arc<dyn BlobStore>,
}

impl SnapshotService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        snapshot_repo: Arc<dyn SnapshotRepo>,
        snapshot_cache: SnapshotCache,
        file_repo: Arc<dyn FileRepo>,
        file_cache: FileCache,
        file_guard: FileGuard,
        file_search: FileSearch,
        task_service: TaskService,
        blob_store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            snapshot_repo,
            snapshot_cache,
            file_repo,
            file_cache,
            file_guard,
            file_search,
            task_service,
            blob_store,
        }
    }

    pub fn languages(&self) -> &'static [SnapshotLanguage] {
        LANGUAGES
    }

    pub fn is_valid_language(&self, language: &str) -> bool {
        LANGUAGES.iter().any(|l| l.id == language)
    }

    pub async fn insert_and_sync(&self, snapshot: &Snapshot) -> Result<(), AppError> {
        self.snapshot_repo.insert(snapshot).await?;
        self.snapshot_cache.set(snapshot).await;
        Ok(())
    }

    pub async fn save_and_sync(&self, snapshot: &Snapshot) -> Result<(), AppError> {
        self.snapshot_repo.save(snapshot).await?;
        self.snapshot_cache.set(snapshot).await;
        Ok(())
    }

    pub async fn find_latest_version_for_file(&self, file_id: Uuid) -> Result<i64, AppError> {
        self.snapshot_repo.find_latest_version_for_file(file_id).await
    }

    #[tracing::instrument(skip(self, options), fields(file_id = %file_id))]
    pub async fn list(
        &self,
        file_id: Uuid,
        options: SnapshotListOptions,
        user_id: Uuid,
    ) -> Result<SnapshotList, AppError> {
        let (all, file) = self.find_all(file_id, user_id).await?;
        let sorted = Self::sort(all, options.sort_by, options.sort_order);
        let (paged, total_elements, total_pages) = paginate(sorted, options.page, options.size);
        Ok(SnapshotList {
            size: paged.len() as u64,
            data: paged,
            active_snapshot_id: file.snapshot_id,
            total_pages,
            total_elements,
            page: options.page,
        })
    }

    pub async fn probe(
        &self,
        file_id: Uuid,
        options: SnapshotListOptions,
        user_id: Uuid,
    ) -> Result<SnapshotProbe, AppError> {
        let (all, _) = self.find_all(file_id, user_id).await?;
        let total_elements = all.len() as u64;
        Ok(SnapshotProbe {
            total_elements,
            total_pages: total_elements.div_ceil(options.size.max(1)),
        })
    }

    /// Make the snapshot the file's active version.
    #[tracing::instrument(skip(self), fields(snapshot_id = %id))]
    pub async fn activate(&self, id: Uuid, user_id: Uuid) -> Result<File, AppError> {
        let file_id = self.snapshot_repo.find_file_id(id).await?;
        let mut file = self.file_cache.get(file_id).await?;
        self.file_guard
            .authorize(user_id, &file, Permission::Editor)
            .await?;
        self.snapshot_cache.get(id).await?;
        file.snapshot_id = Some(id);
        self.file_repo.save(&file).await?;
        self.file_search.update(std::slice::from_ref(&file)).await?;
        self.file_cache.set(&file).await;
        Ok(file)
    }

    /// Remove the association between the snapshot and its file. When the
    /// last association drops, the snapshot and its task are deleted.
    #[tracing::instrument(skip(self), fields(snapshot_id = %id))]
    pub async fn detach(&self, id: Uuid, user_id: Uuid) -> Result<File, AppError> {
        let file_id = self.snapshot_repo.find_file_id(id).await?;
        let file = self.file_cache.get(file_id).await?;
        self.file_guard
            .authorize(user_id, &file, Permission::Owner)
            .await?;
        let snapshot = self.snapshot_cache.get(id).await?;

        if file.snapshot_id == Some(id) {
            self.reassign_active(file.clone(), &snapshot).await?;
        }
        self.snapshot_repo.detach(id, file.id).await?;
        let associations = self.snapshot_repo.count_associations(id).await?;
        if associations == 0 {
            if let Some(task_id) = snapshot.task_id {
                self.task_service.delete_and_sync(task_id).await?;
            }
            self.snapshot_repo.delete(id).await?;
            self.snapshot_cache.delete(id).await;
        }
        let file = self.file_cache.refresh(file.id).await?;
        Ok(file)
    }

    /// Delete a snapshot everywhere: mappings, row, cache, task, and blob
    /// artifacts. Files whose active pointer referenced it fall back to
    /// the immediate predecessor version.
    #[tracing::instrument(skip(self), fields(snapshot_id = %id))]
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<File, AppError> {
        let file_id = self.snapshot_repo.find_file_id(id).await?;
        let file = self.file_cache.get(file_id).await?;
        self.file_guard
            .authorize(user_id, &file, Permission::Owner)
            .await?;
        let snapshot = self.snapshot_cache.get(id).await?;

        // Reassign every file whose active pointer references the snapshot
        // before the row disappears.
        for referencing_id in self.file_repo.find_ids_by_snapshot(id).await? {
            let referencing = match self.file_cache.get(referencing_id).await {
                Ok(file) => file,
                Err(AppError::FileNotFound(_)) => continue,
                Err(err) => return Err(err),
            };
            if referencing.snapshot_id == Some(id) {
                self.reassign_active(referencing, &snapshot).await?;
            }
        }

        if let Some(task_id) = snapshot.task_id {
            self.task_service.delete_and_sync(task_id).await?;
        }
        self.delete_artifacts(&snapshot).await;
        // The row goes; ledger rows in the mapping table stay so the
        // version number is never reissued.
        self.snapshot_repo.delete(id).await?;
        self.snapshot_cache.delete(id).await;

        let file = self.file_cache.refresh(file.id).await?;
        Ok(file)
    }

    /// Apply a worker callback. Artifacts, status, language and task
    /// reference are set by field mask; a transition to ready finishes the
    /// linked task (deleted, reference cleared).
    #[tracing::instrument(skip(self, options), fields(snapshot_id = %id))]
    pub async fn patch(
        &self,
        id: Uuid,
        options: SnapshotPatchOptions,
    ) -> Result<Snapshot, AppError> {
        let mut snapshot = self.snapshot_cache.get(id).await?;
        if let Some(original) = options.original {
            snapshot.original = Some(original);
        }
        if let Some(preview) = options.preview {
            snapshot.preview = Some(preview);
        }
        if let Some(ocr) = options.ocr {
            snapshot.ocr = Some(ocr);
        }
        if let Some(text) = options.text {
            snapshot.text = Some(text);
        }
        if let Some(entities) = options.entities {
            snapshot.entities = Some(entities);
        }
        if let Some(mosaic) = options.mosaic {
            snapshot.mosaic = Some(mosaic);
        }
        if let Some(thumbnail) = options.thumbnail {
            snapshot.thumbnail = Some(thumbnail);
        }
        if let Some(watermark) = options.watermark {
            snapshot.watermark = Some(watermark);
        }
        if let Some(language) = options.language {
            snapshot.language = Some(language);
        }
        if let Some(task_id) = options.task_id {
            snapshot.task_id = task_id;
        }
        if let Some(status) = options.status {
            snapshot.status = status;
            if status == SnapshotStatus::Ready {
                if let Some(task_id) = snapshot.task_id.take() {
                    if let Err(err) = self.task_service.delete_and_sync(task_id).await {
                        tracing::error!(error = %err, task_id = %task_id, "Failed to delete finished task");
                    }
                }
            }
        }
        snapshot.touch();
        self.save_and_sync(&snapshot).await?;

        // Every file presenting this snapshot gets a cache and index
        // refresh so readers observe the new artifacts.
        for file_id in self.file_repo.find_ids_by_snapshot(id).await? {
            match self.file_cache.refresh(file_id).await {
                Ok(file) => {
                    self.file_search.update(std::slice::from_ref(&file)).await?;
                }
                Err(AppError::FileNotFound(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(snapshot)
    }

    /// Set the OCR language on the file's active snapshot. Rejected while
    /// a task is pending: the language feeds the next pipeline run.
    #[tracing::instrument(skip(self), fields(file_id = %file_id))]
    pub async fn update_language(
        &self,
        file_id: Uuid,
        language: &str,
        user_id: Uuid,
    ) -> Result<Snapshot, AppError> {
        if !self.is_valid_language(language) {
            return Err(AppError::InvalidInput(format!(
                "unknown language: {}",
                language
            )));
        }
        let file = self.file_cache.get(file_id).await?;
        self.file_guard
            .authorize(user_id, &file, Permission::Editor)
            .await?;
        let snapshot_id = file
            .snapshot_id
            .ok_or_else(|| AppError::SnapshotNotFound(file.id.to_string()))?;
        let mut snapshot = self.snapshot_cache.get(snapshot_id).await?;
        if self.is_task_pending(&snapshot).await? {
            return Err(AppError::SnapshotHasPendingTask(snapshot.id.to_string()));
        }
        snapshot.language = Some(language.to_string());
        snapshot.touch();
        self.save_and_sync(&snapshot).await?;
        Ok(snapshot)
    }

    /// Delete every snapshot owned exclusively by the file, together with
    /// tasks, blob artifacts, cache entries, mappings and rows. Failures
    /// of individual steps are logged and swallowed; this runs behind
    /// already-committed file deletions and cannot roll them back.
    pub async fn delete_for_file(&self, file_id: Uuid) {
        let snapshots = match self.snapshot_repo.find_exclusive_for_file(file_id).await {
            Ok(snapshots) => snapshots,
            Err(err) => {
                tracing::error!(error = %err, file_id = %file_id, "Failed to list snapshots for deletion");
                return;
            }
        };
        for snapshot in &snapshots {
            if let Some(task_id) = snapshot.task_id {
                if let Err(err) = self.task_service.delete_and_sync(task_id).await {
                    tracing::error!(error = %err, task_id = %task_id, "Failed to delete snapshot task");
                }
            }
            self.delete_artifacts(snapshot).await;
            self.snapshot_cache.delete(snapshot.id).await;
        }
        if let Err(err) = self.snapshot_repo.delete_mappings_for_file(file_id).await {
            tracing::error!(error = %err, file_id = %file_id, "Failed to delete snapshot mappings");
            return;
        }
        if let Err(err) = self.file_repo.clear_snapshot_id(file_id).await {
            tracing::error!(error = %err, file_id = %file_id, "Failed to clear active snapshot");
            return;
        }
        for snapshot in &snapshots {
            if let Err(err) = self.snapshot_repo.delete(snapshot.id).await {
                tracing::error!(error = %err, snapshot_id = %snapshot.id, "Failed to delete snapshot");
            }
        }
    }

    pub async fn is_task_pending(&self, snapshot: &Snapshot) -> Result<bool, AppError> {
        let Some(task_id) = snapshot.task_id else {
            return Ok(false);
        };
        match self.task_service.find_unchecked(task_id).await {
            Ok(task) => Ok(matches!(
                task.status,
                TaskStatus::Waiting | TaskStatus::Running
            )),
            Err(AppError::TaskNotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn find_all(
        &self,
        file_id: Uuid,
        user_id: Uuid,
    ) -> Result<(Vec<Snapshot>, File), AppError> {
        let file = self.file_cache.get(file_id).await?;
        self.file_guard
            .authorize(user_id, &file, Permission::Editor)
            .await?;
        if !file.is_file() {
            return Err(AppError::FileIsNotAFile(file.id.to_string()));
        }
        let ids = self.snapshot_repo.find_ids_by_file(file_id).await?;
        let mut snapshots = Vec::with_capacity(ids.len());
        for id in ids {
            snapshots.push(self.snapshot_cache.get(id).await?);
        }
        Ok((snapshots, file))
    }

    /// Pick the new active snapshot for `file` after `deleted` goes away:
    /// none left clears the pointer, a single survivor wins, otherwise the
    /// immediate predecessor version; when the deleted version was the
    /// lowest, the closest successor.
    async fn reassign_active(&self, mut file: File, deleted: &Snapshot) -> Result<(), AppError> {
        let remaining: Vec<Snapshot> = self
            .snapshot_repo
            .find_all_for_file(file.id)
            .await?
            .into_iter()
            .filter(|s| s.id != deleted.id)
            .collect();

        file.snapshot_id = if remaining.is_empty() {
            None
        } else if remaining.len() == 1 {
            Some(remaining[0].id)
        } else {
            let predecessor = remaining
                .iter()
                .filter(|s| s.version < deleted.version)
                .max_by_key(|s| s.version);
            let successor = remaining
                .iter()
                .filter(|s| s.version > deleted.version)
                .min_by_key(|s| s.version);
            predecessor.or(successor).map(|s| s.id)
        };
        self.file_repo.save(&file).await?;
        self.file_cache.set(&file).await;
        self.file_search.update(std::slice::from_ref(&file)).await?;
        Ok(())
    }

    /// Remove the snapshot's blob artifacts. Mosaics are folders of tiles;
    /// everything else is a single object. Failures are logged only.
    async fn delete_artifacts(&self, snapshot: &Snapshot) {
        let objects = [
            &snapshot.original,
            &snapshot.preview,
            &snapshot.ocr,
            &snapshot.text,
            &snapshot.entities,
            &snapshot.thumbnail,
            &snapshot.watermark,
        ];
        for object in objects.into_iter().flatten() {
            if let Err(err) = self.blob_store.remove_object(&object.key, &object.bucket).await {
                tracing::error!(error = %err, key = %object.key, "Failed to delete artifact");
            }
        }
        if let Some(ref mosaic) = snapshot.mosaic {
            if let Err(err) = self.blob_store.remove_folder(&mosaic.key, &mosaic.bucket).await {
                tracing::error!(error = %err, key = %mosaic.key, "Failed to delete mosaic folder");
            }
        }
    }

    fn sort(
        mut snapshots: Vec<Snapshot>,
        sort_by: SnapshotSortBy,
        sort_order: SortOrder,
    ) -> Vec<Snapshot> {
        match sort_by {
            SnapshotSortBy::Version => snapshots.sort_by_key(|s| s.version),
            SnapshotSortBy::DateCreated => snapshots.sort_by_key(|s| s.create_time),
            SnapshotSortBy::DateModified => snapshots.sort_by_key(|s| s.update_time),
        }
        if sort_order == SortOrder::Desc {
            snapshots.reverse();
        }
        snapshots
    }
}
