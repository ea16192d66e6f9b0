//! User-visible task lifecycle.
//!
//! Tasks surface asynchronous work as progress entries. They are created
//! in waiting/running state, mutated by worker callbacks, deleted on
//! success, and kept for explicit dismissal on error.

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::{Task, TaskStatus};
use depot_core::AppError;
use depot_db::TaskRepo;
use depot_search::TaskSearch;

use crate::cache::TaskCache;
use crate::{paginate, SortOrder};

#[derive(Debug, Clone, Default)]
pub struct TaskCreateOptions {
    pub name: String,
    pub error: Option<String>,
    pub percentage: Option<i32>,
    pub is_indeterminate: bool,
    pub status: Option<TaskStatus>,
    pub payload: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskPatchOptions {
    pub name: Option<String>,
    pub error: Option<String>,
    pub percentage: Option<i32>,
    pub is_indeterminate: Option<bool>,
    pub status: Option<TaskStatus>,
    pub payload: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskSortBy {
    #[default]
    DateCreated,
    Name,
}

#[derive(Debug, Clone, Default)]
pub struct TaskListOptions {
    pub query: Option<String>,
    pub page: u64,
    pub size: u64,
    pub sort_by: TaskSortBy,
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone)]
pub struct TaskList {
    pub data: Vec<Task>,
    pub total_pages: u64,
    pub total_elements: u64,
    pub page: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct TaskDismissAllResult {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<Uuid>,
}

#[derive(Clone)]
pub struct TaskService {
    task_repo: Arc<dyn TaskRepo>,
    task_cache: TaskCache,
    task_search: TaskSearch,
}

impl TaskService {
    pub fn new(task_repo: Arc<dyn TaskRepo>, task_cache: TaskCache, task_search: TaskSearch) -> Self {
        Self {
            task_repo,
            task_cache,
            task_search,
        }
    }

    pub async fn create(&self, options: TaskCreateOptions, user_id: Uuid) -> Result<Task, AppError> {
        let mut task = Task::new(
            user_id,
            options.name,
            options.status.unwrap_or(TaskStatus::Waiting),
        );
        task.error = options.error;
        task.percentage = options.percentage;
        task.is_indeterminate = options.is_indeterminate;
        task.payload = options.payload;
        self.insert_and_sync(task).await
    }

    pub async fn insert_and_sync(&self, task: Task) -> Result<Task, AppError> {
        self.task_repo.insert(&task).await?;
        self.task_cache.set(&task).await;
        self.task_search.index(std::slice::from_ref(&task)).await?;
        Ok(task)
    }

    pub async fn save_and_sync(&self, task: &Task) -> Result<(), AppError> {
        self.task_repo.save(task).await?;
        self.task_cache.set(task).await;
        self.task_search.update(std::slice::from_ref(task)).await?;
        Ok(())
    }

    pub async fn delete_and_sync(&self, id: Uuid) -> Result<(), AppError> {
        self.task_repo.delete(id).await?;
        self.task_cache.delete(id).await;
        self.task_search.delete(&[id]).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, options), fields(task_id = %id))]
    pub async fn patch(&self, id: Uuid, options: TaskPatchOptions) -> Result<Task, AppError> {
        let mut task = self.task_cache.get(id).await?;
        if let Some(name) = options.name {
            task.name = name;
        }
        if let Some(error) = options.error {
            task.error = Some(error);
        }
        if let Some(percentage) = options.percentage {
            task.percentage = Some(percentage);
        }
        if let Some(is_indeterminate) = options.is_indeterminate {
            task.is_indeterminate = is_indeterminate;
        }
        if let Some(status) = options.status {
            task.status = status;
        }
        if let Some(payload) = options.payload {
            task.payload = payload;
        }
        task.touch();
        self.save_and_sync(&task).await?;
        Ok(task)
    }

    /// Owner-agnostic lookup for internal orchestration (pending-task
    /// checks, cleanup). API callers go through [`TaskService::find`].
    pub async fn find_unchecked(&self, id: Uuid) -> Result<Task, AppError> {
        self.task_cache.get(id).await
    }

    /// Find a task owned by `user_id`. Tasks of other users read as not
    /// found rather than forbidden.
    pub async fn find(&self, id: Uuid, user_id: Uuid) -> Result<Task, AppError> {
        let task = self.task_cache.get(id).await?;
        if task.user_id != user_id {
            return Err(AppError::TaskNotFound(id.to_string()));
        }
        Ok(task)
    }

    pub async fn list(&self, options: TaskListOptions, user_id: Uuid) -> Result<TaskList, AppError> {
        let all = self.find_all(&options, user_id).await?;
        let sorted = Self::sort(all, options.sort_by, options.sort_order);
        let (paged, total_elements, total_pages) = paginate(sorted, options.page, options.size);
        Ok(TaskList {
            size: paged.len() as u64,
            data: paged,
            total_pages,
            total_elements,
            page: options.page,
        })
    }

    pub async fn count(&self, user_id: Uuid) -> Result<i64, AppError> {
        self.task_repo.count_by_user(user_id).await
    }

    /// Dismiss an errored task. Running tasks cannot be dismissed.
    pub async fn dismiss(&self, id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let task = self.task_cache.get(id).await?;
        if task.user_id != user_id {
            return Err(AppError::TaskBelongsToAnotherUser(id.to_string()));
        }
        if !task.has_error() {
            return Err(AppError::TaskIsRunning(id.to_string()));
        }
        self.delete_and_sync(id).await
    }

    /// Dismiss every errored task of the user; running tasks are skipped.
    pub async fn dismiss_all(&self, user_id: Uuid) -> Result<TaskDismissAllResult, AppError> {
        let ids = self.task_repo.find_ids_by_user(user_id).await?;
        let mut result = TaskDismissAllResult::default();
        for id in ids {
            let task = match self.task_cache.get(id).await {
                Ok(task) => task,
                Err(AppError::TaskNotFound(_)) => continue,
                Err(err) => return Err(err),
            };
            if task.user_id != user_id || !task.has_error() {
                continue;
            }
            match self.delete_and_sync(id).await {
                Ok(()) => result.succeeded.push(id),
                Err(err) => {
                    tracing::error!(error = %err, task_id = %id, "Failed to dismiss task");
                    result.failed.push(id);
                }
            }
        }
        Ok(result)
    }

    async fn find_all(
        &self,
        options: &TaskListOptions,
        user_id: Uuid,
    ) -> Result<Vec<Task>, AppError> {
        let ids = match options.query {
            Some(ref query) if !query.is_empty() => {
                self.task_search.query(query, user_id).await?
            }
            _ => self.task_repo.find_ids_by_user(user_id).await?,
        };
        let mut tasks = Vec::new();
        for id in ids {
            match self.task_cache.get(id).await {
                Ok(task) => {
                    if task.user_id == user_id {
                        tasks.push(task);
                    }
                }
                // The search index may briefly contain deleted tasks.
                Err(AppError::TaskNotFound(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(tasks)
    }

    fn sort(mut tasks: Vec<Task>, sort_by: TaskSortBy, sort_order: SortOrder) -> Vec<Task> {
        match sort_by {
            TaskSortBy::DateCreated => tasks.sort_by_key(|t| t.create_time),
            TaskSortBy::Name => tasks.sort_by(|a, b| a.name.cmp(&b.name)),
        }
        if sort_order == SortOrder::Desc {
            tasks.reverse();
        }
        tasks
    }
}
