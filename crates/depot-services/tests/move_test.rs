//! Subtree move: directed placement with loud conflicts.

use depot_core::AppError;
use depot_services::test_helpers::TestContext;
use uuid::Uuid;

#[tokio::test]
async fn test_move_reparents_source() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let docs = ctx.create_folder(&workspace, workspace.root_id, "docs", user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "a.txt", user).await;

    let moved = ctx.file_move.move_one(file.id, docs.id, user).await.unwrap();
    assert_eq!(moved.id, file.id);
    assert_eq!(moved.parent_id, Some(docs.id));
    assert!(moved.update_time.is_some());

    // Target timestamp refreshes synchronously as well
    let docs = ctx.file_cache.get(docs.id).await.unwrap();
    assert!(docs.update_time.is_some());

    // Progress tasks never outlive the operation
    assert_eq!(ctx.db.task_count(), 0);
}

#[tokio::test]
async fn test_move_name_collision_fails_loudly() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let docs = ctx.create_folder(&workspace, workspace.root_id, "docs", user).await;
    ctx.create_file(&workspace, docs.id, "a.txt", user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "a.txt", user).await;

    let err = ctx.file_move.move_one(file.id, docs.id, user).await.unwrap_err();
    assert!(matches!(err, AppError::FileWithSimilarNameExists(_)));

    // Never silently renamed, never moved
    let file = ctx.file_cache.get(file.id).await.unwrap();
    assert_eq!(file.name, "a.txt");
    assert_eq!(file.parent_id, Some(workspace.root_id));
}

#[tokio::test]
async fn test_move_into_own_subtree_is_rejected() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let a = ctx.create_folder(&workspace, workspace.root_id, "a", user).await;
    let b = ctx.create_folder(&workspace, a.id, "b", user).await;

    let err = ctx.file_move.move_one(a.id, b.id, user).await.unwrap_err();
    assert!(matches!(err, AppError::TargetIsGrandChildOfSource(_)));

    // The tree is unchanged: a still has exactly one child, b's parent is a
    let children = ctx.file_fetch.find_children(a.id, user).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, b.id);
    assert_eq!(
        ctx.file_cache.get(a.id).await.unwrap().parent_id,
        Some(workspace.root_id)
    );
}

#[tokio::test]
async fn test_move_into_itself_is_rejected() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let a = ctx.create_folder(&workspace, workspace.root_id, "a", user).await;

    let err = ctx.file_move.move_one(a.id, a.id, user).await.unwrap_err();
    assert!(matches!(err, AppError::FileCannotBeMovedIntoItself(_)));
}

#[tokio::test]
async fn test_move_into_current_parent_is_rejected() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let a = ctx.create_folder(&workspace, workspace.root_id, "a", user).await;
    let b = ctx.create_file(&workspace, a.id, "b.txt", user).await;

    let err = ctx.file_move.move_one(b.id, a.id, user).await.unwrap_err();
    assert!(matches!(err, AppError::FileAlreadyChildOfDestination(_)));
}

#[tokio::test]
async fn test_move_into_file_is_rejected() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let a = ctx.create_file(&workspace, workspace.root_id, "a.txt", user).await;
    let b = ctx.create_file(&workspace, workspace.root_id, "b.txt", user).await;

    let err = ctx.file_move.move_one(a.id, b.id, user).await.unwrap_err();
    assert!(matches!(err, AppError::FileIsNotAFolder(_)));
}

#[tokio::test]
async fn test_move_many_reports_parallel_lists() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let docs = ctx.create_folder(&workspace, workspace.root_id, "docs", user).await;
    let a = ctx.create_file(&workspace, workspace.root_id, "a.txt", user).await;
    let b = ctx.create_file(&workspace, workspace.root_id, "b.txt", user).await;
    // Already present in the destination, so moving b.txt collides
    ctx.create_file(&workspace, docs.id, "b.txt", user).await;

    let result = ctx
        .file_move
        .move_many(&[a.id, b.id], docs.id, user)
        .await
        .unwrap();
    assert_eq!(result.succeeded, vec![a.id]);
    assert_eq!(result.failed, vec![b.id]);
}
