//! Task lifecycle and pipeline submission gating.

use depot_core::models::TaskStatus;
use depot_core::AppError;
use depot_services::snapshot_service::SnapshotPatchOptions;
use depot_services::task_service::{TaskListOptions, TaskPatchOptions};
use depot_services::test_helpers::TestContext;
use uuid::Uuid;

#[tokio::test]
async fn test_pending_task_blocks_resubmission() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "doc.txt", user).await;
    let file = ctx
        .store_content(&workspace, file.id, "hello", user)
        .await
        .unwrap();
    let snapshot_id = file.snapshot_id.unwrap();
    let first_task_id = ctx
        .snapshot_cache
        .get(snapshot_id)
        .await
        .unwrap()
        .task_id
        .unwrap();
    assert_eq!(ctx.pipeline_runner.run_count(), 1);

    // Second submission before completion is refused; the task link is
    // untouched
    let err = ctx.pipeline_service.submit(file.id, user).await.unwrap_err();
    assert!(matches!(err, AppError::SnapshotHasPendingTask(_)));
    assert_eq!(
        ctx.snapshot_cache.get(snapshot_id).await.unwrap().task_id,
        Some(first_task_id)
    );
    assert_eq!(ctx.pipeline_runner.run_count(), 1);
}

#[tokio::test]
async fn test_submission_allowed_after_completion() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "doc.txt", user).await;
    let file = ctx
        .store_content(&workspace, file.id, "hello", user)
        .await
        .unwrap();
    let snapshot_id = file.snapshot_id.unwrap();

    ctx.snapshot_service
        .patch(
            snapshot_id,
            SnapshotPatchOptions {
                status: Some(depot_core::models::SnapshotStatus::Ready),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let task = ctx.pipeline_service.submit(file.id, user).await.unwrap();
    assert_eq!(task.status, TaskStatus::Waiting);
    assert_eq!(ctx.pipeline_runner.run_count(), 2);

    // The run carried the original artifact's location
    let run = ctx.pipeline_runner.runs().pop().unwrap();
    assert_eq!(run.snapshot_id, snapshot_id);
    assert_eq!(run.task_id, task.id);
    let snapshot = ctx.snapshot_cache.get(snapshot_id).await.unwrap();
    let original = snapshot.original.unwrap();
    assert_eq!(run.bucket, original.bucket);
    assert_eq!(run.key, original.key);
}

#[tokio::test]
async fn test_submission_without_original_is_rejected() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "doc.txt", user).await;

    // No content stored at all: no active snapshot
    let err = ctx.pipeline_service.submit(file.id, user).await.unwrap_err();
    assert!(matches!(err, AppError::SnapshotNotFound(_)));
}

#[tokio::test]
async fn test_reprocess_is_silent_per_item() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let folder = ctx.create_folder(&workspace, workspace.root_id, "folder", user).await;
    let processed = ctx.create_file(&workspace, folder.id, "processed.txt", user).await;
    let processed = ctx
        .store_content(&workspace, processed.id, "hello", user)
        .await
        .unwrap();
    let empty = ctx.create_file(&workspace, folder.id, "empty.txt", user).await;

    // Finish the first file's pipeline so it is eligible again
    ctx.snapshot_service
        .patch(
            processed.snapshot_id.unwrap(),
            SnapshotPatchOptions {
                status: Some(depot_core::models::SnapshotStatus::Ready),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let result = ctx.file_reprocess.reprocess(folder.id, user).await.unwrap();
    assert_eq!(result.accepted, vec![processed.id]);
    // The folder itself and the content-less file are silently rejected
    assert!(result.rejected.contains(&folder.id));
    assert!(result.rejected.contains(&empty.id));
}

#[tokio::test]
async fn test_pipeline_failure_fails_submission() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "doc.txt", user).await;

    ctx.pipeline_runner.set_fail(true);
    let err = ctx
        .store_content(&workspace, file.id, "hello", user)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Pipeline(_)));
}

#[tokio::test]
async fn test_dismiss_requires_owner_and_error() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let other = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "doc.txt", user).await;
    let file = ctx
        .store_content(&workspace, file.id, "hello", user)
        .await
        .unwrap();
    let task_id = ctx
        .snapshot_cache
        .get(file.snapshot_id.unwrap())
        .await
        .unwrap()
        .task_id
        .unwrap();

    // Still waiting: not dismissible
    let err = ctx.task_service.dismiss(task_id, user).await.unwrap_err();
    assert!(matches!(err, AppError::TaskIsRunning(_)));

    // The worker reports failure; the task stays for dismissal
    ctx.task_service
        .patch(
            task_id,
            TaskPatchOptions {
                status: Some(TaskStatus::Error),
                error: Some("conversion failed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = ctx.task_service.dismiss(task_id, other).await.unwrap_err();
    assert!(matches!(err, AppError::TaskBelongsToAnotherUser(_)));

    ctx.task_service.dismiss(task_id, user).await.unwrap();
    assert_eq!(ctx.db.task_count(), 0);
}

#[tokio::test]
async fn test_find_is_owner_scoped() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let other = Uuid::new_v4();
    let task = ctx
        .task_service
        .create(
            depot_services::task_service::TaskCreateOptions {
                name: "Waiting.".to_string(),
                is_indeterminate: true,
                ..Default::default()
            },
            user,
        )
        .await
        .unwrap();

    assert_eq!(ctx.task_service.find(task.id, user).await.unwrap().id, task.id);
    let err = ctx.task_service.find(task.id, other).await.unwrap_err();
    assert!(matches!(err, AppError::TaskNotFound(_)));
}

#[tokio::test]
async fn test_dismiss_all_skips_running_tasks() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();

    let running = ctx
        .task_service
        .create(
            depot_services::task_service::TaskCreateOptions {
                name: "Running.".to_string(),
                status: Some(TaskStatus::Running),
                is_indeterminate: true,
                ..Default::default()
            },
            user,
        )
        .await
        .unwrap();
    let errored = ctx
        .task_service
        .create(
            depot_services::task_service::TaskCreateOptions {
                name: "Failed.".to_string(),
                status: Some(TaskStatus::Error),
                error: Some("boom".to_string()),
                is_indeterminate: true,
                ..Default::default()
            },
            user,
        )
        .await
        .unwrap();

    let result = ctx.task_service.dismiss_all(user).await.unwrap();
    assert_eq!(result.succeeded, vec![errored.id]);
    assert!(result.failed.is_empty());
    assert_eq!(ctx.db.task_count(), 1);
    assert!(ctx.task_service.find(running.id, user).await.is_ok());
}

#[tokio::test]
async fn test_list_queries_the_search_index() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();

    for name in ["Copying.", "Moving.", "Deleting."] {
        ctx.task_service
            .create(
                depot_services::task_service::TaskCreateOptions {
                    name: name.to_string(),
                    status: Some(TaskStatus::Running),
                    is_indeterminate: true,
                    ..Default::default()
                },
                user,
            )
            .await
            .unwrap();
    }

    let list = ctx
        .task_service
        .list(
            TaskListOptions {
                query: Some("copying".to_string()),
                page: 1,
                size: 10,
                ..Default::default()
            },
            user,
        )
        .await
        .unwrap();
    assert_eq!(list.total_elements, 1);
    assert_eq!(list.data[0].name, "Copying.");

    let list = ctx
        .task_service
        .list(
            TaskListOptions {
                page: 1,
                size: 2,
                ..Default::default()
            },
            user,
        )
        .await
        .unwrap();
    assert_eq!(list.total_elements, 3);
    assert_eq!(list.total_pages, 2);
    assert_eq!(list.data.len(), 2);

    assert_eq!(ctx.task_service.count(user).await.unwrap(), 3);
}
