//! Read-optimized entity caches.
//!
//! Each cache is an explicit service injected into its consumers, wrapping
//! the backing repository with a concurrent map. Mutation paths write the
//! store first and then `set`/`refresh`/`delete` the cache in the same
//! logical step; a crash between the two leaves the cache briefly stale,
//! which the platform accepts (write-through, not transactional).

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use depot_core::models::{File, Snapshot, Task, Workspace};
use depot_core::AppError;
use depot_db::{FileRepo, SnapshotRepo, TaskRepo, WorkspaceRepo};

#[derive(Clone)]
pub struct FileCache {
    repo: Arc<dyn FileRepo>,
    entries: Arc<RwLock<HashMap<Uuid, File>>>,
}

impl FileCache {
    pub fn new(repo: Arc<dyn FileRepo>) -> Self {
        Self {
            repo,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Read-through get: serves the cached entry when present, otherwise
    /// loads from the store and caches it.
    pub async fn get(&self, id: Uuid) -> Result<File, AppError> {
        {
            let entries = self.entries.read().await;
            if let Some(file) = entries.get(&id) {
                return Ok(file.clone());
            }
        }
        self.refresh(id).await
    }

    /// Reload from the store, replacing any cached entry.
    pub async fn refresh(&self, id: Uuid) -> Result<File, AppError> {
        let file = self.repo.find(id).await?;
        self.entries.write().await.insert(id, file.clone());
        Ok(file)
    }

    pub async fn set(&self, file: &File) {
        self.entries.write().await.insert(file.id, file.clone());
    }

    pub async fn delete(&self, id: Uuid) {
        self.entries.write().await.remove(&id);
    }
}

#[derive(Clone)]
pub struct SnapshotCache {
    repo: Arc<dyn SnapshotRepo>,
    entries: Arc<RwLock<HashMap<Uuid, Snapshot>>>,
}

impl SnapshotCache {
    pub fn new(repo: Arc<dyn SnapshotRepo>) -> Self {
        Self {
            repo,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Snapshot, AppError> {
        {
            let entries = self.entries.read().await;
            if let Some(snapshot) = entries.get(&id) {
                return Ok(snapshot.clone());
            }
        }
        self.refresh(id).await
    }

    pub async fn refresh(&self, id: Uuid) -> Result<Snapshot, AppError> {
        let snapshot = self.repo.find(id).await?;
        self.entries.write().await.insert(id, snapshot.clone());
        Ok(snapshot)
    }

    pub async fn set(&self, snapshot: &Snapshot) {
        self.entries
            .write()
            .await
            .insert(snapshot.id, snapshot.clone());
    }

    pub async fn delete(&self, id: Uuid) {
        self.entries.write().await.remove(&id);
    }
}

#[derive(Clone)]
pub struct TaskCache {
    repo: Arc<dyn TaskRepo>,
    entries: Arc<RwLock<HashMap<Uuid, Task>>>,
}

impl TaskCache {
    pub fn new(repo: Arc<dyn TaskRepo>) -> Self {
        Self {
            repo,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Task, AppError> {
        {
            let entries = self.entries.read().await;
            if let Some(task) = entries.get(&id) {
                return Ok(task.clone());
            }
        }
        self.refresh(id).await
    }

    pub async fn refresh(&self, id: Uuid) -> Result<Task, AppError> {
        let task = self.repo.find(id).await?;
        self.entries.write().await.insert(id, task.clone());
        Ok(task)
    }

    pub async fn set(&self, task: &Task) {
        self.entries.write().await.insert(task.id, task.clone());
    }

    pub async fn delete(&self, id: Uuid) {
        self.entries.write().await.remove(&id);
    }
}

#[derive(Clone)]
pub struct WorkspaceCache {
    repo: Arc<dyn WorkspaceRepo>,
    entries: Arc<RwLock<HashMap<Uuid, Workspace>>>,
}

impl WorkspaceCache {
    pub fn new(repo: Arc<dyn WorkspaceRepo>) -> Self {
        Self {
            repo,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Workspace, AppError> {
        {
            let entries = self.entries.read().await;
            if let Some(workspace) = entries.get(&id) {
                return Ok(workspace.clone());
            }
        }
        self.refresh(id).await
    }

    pub async fn refresh(&self, id: Uuid) -> Result<Workspace, AppError> {
        let workspace = self.repo.find(id).await?;
        self.entries.write().await.insert(id, workspace.clone());
        Ok(workspace)
    }

    pub async fn set(&self, workspace: &Workspace) {
        self.entries
            .write()
            .await
            .insert(workspace.id, workspace.clone());
    }

    pub async fn delete(&self, id: Uuid) {
        self.entries.write().await.remove(&id);
    }
}
