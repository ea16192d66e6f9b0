//! Wiring helpers for DB-free service tests.
//!
//! [`TestContext`] assembles the full service graph on top of the
//! in-memory repositories, blob store, search provider and a recording
//! pipeline runner.

pub mod memory;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use depot_core::models::{File, FileType, Group, Workspace};
use depot_core::AppError;
use depot_db::{FileRepo, GroupRepo, PermissionRepo, SnapshotRepo, TaskRepo, WorkspaceRepo};
use depot_search::{FileSearch, MemorySearchProvider, TaskSearch};
use depot_storage::{artifact_key, BlobStore, MemoryBlobStore};

use crate::cache::{FileCache, SnapshotCache, TaskCache, WorkspaceCache};
use crate::fanout::Fanout;
use crate::file::{
    FileCopyService, FileCreateOptions, FileCreateService, FileDeleteService, FileFetchService,
    FileMoveService, FilePermissionService, FileReprocessService, FileStoreService, FileSync,
    FileUpdateService, S3Reference, StoreOptions,
};
use crate::guard::{FileGuard, GroupGuard, WorkspaceGuard};
use crate::pipeline::{PipelineRunOptions, PipelineRunner, PipelineService};
use crate::snapshot_service::SnapshotService;
use crate::task_service::TaskService;
use crate::workspace_service::{WorkspaceCreateOptions, WorkspaceService};

pub use memory::MemoryDatabase;

/// Install a test subscriber once; `RUST_LOG` filters as usual.
pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Pipeline runner double: records every run and can be switched to fail.
#[derive(Default)]
pub struct RecordingPipelineRunner {
    runs: Mutex<Vec<PipelineRunOptions>>,
    fail: AtomicBool,
}

impl RecordingPipelineRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> Vec<PipelineRunOptions> {
        self.runs.lock().unwrap().clone()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PipelineRunner for RecordingPipelineRunner {
    async fn run(&self, options: &PipelineRunOptions) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Pipeline("worker unavailable".to_string()));
        }
        self.runs.lock().unwrap().push(options.clone());
        Ok(())
    }
}

pub struct TestContext {
    pub db: MemoryDatabase,
    pub blob_store: Arc<MemoryBlobStore>,
    pub search_provider: Arc<MemorySearchProvider>,
    pub pipeline_runner: Arc<RecordingPipelineRunner>,
    pub fanout: Fanout,

    pub file_repo: Arc<dyn FileRepo>,
    pub snapshot_repo: Arc<dyn SnapshotRepo>,
    pub task_repo: Arc<dyn TaskRepo>,
    pub permission_repo: Arc<dyn PermissionRepo>,
    pub workspace_repo: Arc<dyn WorkspaceRepo>,
    pub group_repo: Arc<dyn GroupRepo>,

    pub file_cache: FileCache,
    pub snapshot_cache: SnapshotCache,
    pub task_cache: TaskCache,
    pub workspace_cache: WorkspaceCache,

    pub file_guard: FileGuard,
    pub workspace_guard: WorkspaceGuard,
    pub group_guard: GroupGuard,

    pub workspace_service: WorkspaceService,
    pub task_service: TaskService,
    pub snapshot_service: SnapshotService,
    pub pipeline_service: PipelineService,
    pub file_create: FileCreateService,
    pub file_fetch: FileFetchService,
    pub file_copy: FileCopyService,
    pub file_move: FileMoveService,
    pub file_delete: FileDeleteService,
    pub file_update: FileUpdateService,
    pub file_permission: FilePermissionService,
    pub file_reprocess: FileReprocessService,
    pub file_store: FileStoreService,
}

impl TestContext {
    pub fn new() -> Self {
        init_tracing();
        let db = MemoryDatabase::new();
        let blob_store = Arc::new(MemoryBlobStore::new());
        let search_provider = Arc::new(MemorySearchProvider::new());
        let pipeline_runner = Arc::new(RecordingPipelineRunner::new());
        let fanout = Fanout::new(4);

        let file_repo: Arc<dyn FileRepo> = Arc::new(db.file_repo());
        let snapshot_repo: Arc<dyn SnapshotRepo> = Arc::new(db.snapshot_repo());
        let task_repo: Arc<dyn TaskRepo> = Arc::new(db.task_repo());
        let permission_repo: Arc<dyn PermissionRepo> = Arc::new(db.permission_repo());
        let workspace_repo: Arc<dyn WorkspaceRepo> = Arc::new(db.workspace_repo());
        let group_repo: Arc<dyn GroupRepo> = Arc::new(db.group_repo());

        let file_cache = FileCache::new(file_repo.clone());
        let snapshot_cache = SnapshotCache::new(snapshot_repo.clone());
        let task_cache = TaskCache::new(task_repo.clone());
        let workspace_cache = WorkspaceCache::new(workspace_repo.clone());

        let file_guard = FileGuard::new(permission_repo.clone(), group_repo.clone());
        let workspace_guard = WorkspaceGuard::new(permission_repo.clone(), group_repo.clone());
        let group_guard = GroupGuard::new(permission_repo.clone(), group_repo.clone());

        let file_search = FileSearch::new(search_provider.clone());
        let task_search = TaskSearch::new(search_provider.clone());
        let file_sync = FileSync::new(file_repo.clone(), file_cache.clone(), file_search.clone());

        let task_service = TaskService::new(task_repo.clone(), task_cache.clone(), task_search);
        let snapshot_service = SnapshotService::new(
            snapshot_repo.clone(),
            snapshot_cache.clone(),
            file_repo.clone(),
            file_cache.clone(),
            file_guard.clone(),
            file_search.clone(),
            task_service.clone(),
            blob_store.clone(),
        );
        let pipeline_service = PipelineService::new(
            file_cache.clone(),
            file_guard.clone(),
            snapshot_repo.clone(),
            snapshot_cache.clone(),
            task_cache.clone(),
            task_service.clone(),
            pipeline_runner.clone(),
        );

        let workspace_service = WorkspaceService::new(
            workspace_repo.clone(),
            workspace_cache.clone(),
            workspace_guard.clone(),
            file_repo.clone(),
            file_cache.clone(),
            file_search.clone(),
        );
        let file_create = FileCreateService::new(
            file_repo.clone(),
            file_cache.clone(),
            file_guard.clone(),
            file_search.clone(),
            file_sync.clone(),
        );
        let file_fetch = FileFetchService::new(
            file_repo.clone(),
            file_cache.clone(),
            file_guard.clone(),
            file_search.clone(),
        );
        let file_copy = FileCopyService::new(
            file_repo.clone(),
            file_cache.clone(),
            file_guard.clone(),
            file_search.clone(),
            file_sync.clone(),
            snapshot_repo.clone(),
            task_service.clone(),
            fanout.clone(),
        );
        let file_move = FileMoveService::new(
            file_repo.clone(),
            file_cache.clone(),
            file_guard.clone(),
            file_sync.clone(),
            task_service.clone(),
        );
        let file_delete = FileDeleteService::new(
            file_repo.clone(),
            file_cache.clone(),
            file_guard.clone(),
            file_search.clone(),
            workspace_cache.clone(),
            snapshot_service.clone(),
            task_service.clone(),
            fanout.clone(),
        );
        let file_update = FileUpdateService::new(
            file_cache.clone(),
            file_guard.clone(),
            file_sync.clone(),
        );
        let file_permission = FilePermissionService::new(
            file_repo.clone(),
            file_cache.clone(),
            file_guard.clone(),
            file_sync.clone(),
            group_repo.clone(),
            group_guard.clone(),
            permission_repo.clone(),
        );
        let file_reprocess = FileReprocessService::new(
            file_repo.clone(),
            file_cache.clone(),
            file_guard.clone(),
            pipeline_service.clone(),
        );
        let file_store = FileStoreService::new(
            file_cache.clone(),
            file_guard.clone(),
            file_sync.clone(),
            workspace_cache.clone(),
            snapshot_repo.clone(),
            snapshot_service.clone(),
            pipeline_service.clone(),
            blob_store.clone(),
            // Small limit so tests can exercise the over-limit path.
            64 * 1024 * 1024,
        );

        Self {
            db,
            blob_store,
            search_provider,
            pipeline_runner,
            fanout,
            file_repo,
            snapshot_repo,
            task_repo,
            permission_repo,
            workspace_repo,
            group_repo,
            file_cache,
            snapshot_cache,
            task_cache,
            workspace_cache,
            file_guard,
            workspace_guard,
            group_guard,
            workspace_service,
            task_service,
            snapshot_service,
            pipeline_service,
            file_create,
            file_fetch,
            file_copy,
            file_move,
            file_delete,
            file_update,
            file_permission,
            file_reprocess,
            file_store,
        }
    }

    pub async fn create_workspace(&self, user_id: Uuid) -> Workspace {
        self.workspace_service
            .create(
                WorkspaceCreateOptions {
                    name: "workspace".to_string(),
                    organization_id: Uuid::new_v4(),
                },
                user_id,
            )
            .await
            .expect("workspace creation failed")
    }

    pub async fn create_folder(&self, workspace: &Workspace, parent_id: Uuid, name: &str, user_id: Uuid) -> File {
        self.file_create
            .create(
                FileCreateOptions {
                    workspace_id: workspace.id,
                    name: name.to_string(),
                    file_type: FileType::Folder,
                    parent_id,
                },
                user_id,
            )
            .await
            .expect("folder creation failed")
    }

    pub async fn create_file(&self, workspace: &Workspace, parent_id: Uuid, name: &str, user_id: Uuid) -> File {
        self.file_create
            .create(
                FileCreateOptions {
                    workspace_id: workspace.id,
                    name: name.to_string(),
                    file_type: FileType::File,
                    parent_id,
                },
                user_id,
            )
            .await
            .expect("file creation failed")
    }

    /// Store text content as the file's next snapshot version, via an
    /// already-uploaded blob reference.
    pub async fn store_content(
        &self,
        workspace: &Workspace,
        file_id: Uuid,
        content: &str,
        user_id: Uuid,
    ) -> Result<File, AppError> {
        let snapshot_id = Uuid::new_v4();
        let key = artifact_key(snapshot_id, "original.txt");
        self.blob_store
            .put_text(&key, content, "text/plain", &workspace.bucket)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        self.file_store
            .store(
                file_id,
                StoreOptions {
                    path: None,
                    s3_reference: Some(S3Reference {
                        snapshot_id,
                        bucket: workspace.bucket.clone(),
                        key,
                        size: content.len() as i64,
                        content_type: "text/plain".to_string(),
                    }),
                },
                user_id,
            )
            .await
    }

    /// Insert a group with an owner grant on the group resource for
    /// `owner_id`, so that user can hand out group permissions.
    pub async fn seed_group(&self, organization_id: Uuid, owner_id: Uuid, members: Vec<Uuid>) -> Group {
        let group = Group {
            id: Uuid::new_v4(),
            organization_id,
            name: "group".to_string(),
            members,
            create_time: chrono::Utc::now(),
            update_time: None,
        };
        self.group_repo
            .insert(&group)
            .await
            .expect("group insert failed");
        self.file_repo
            .grant_user_permission(group.id, owner_id, depot_core::models::Permission::Owner)
            .await
            .expect("group grant failed");
        group
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
