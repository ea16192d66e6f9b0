//! Subtree copy: clone isomorphism, snapshot sharing, collision handling.

use std::collections::HashMap;
use depot_core::AppError;
use depot_services::test_helpers::TestContext;
use uuid::Uuid;

#[tokio::test]
async fn test_copy_clones_subtree_with_fresh_ids() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;

    // a/{b/{d.txt}, c.txt} copied into target/
    let a = ctx.create_folder(&workspace, workspace.root_id, "a", user).await;
    let b = ctx.create_folder(&workspace, a.id, "b", user).await;
    let d = ctx.create_file(&workspace, b.id, "d.txt", user).await;
    let c = ctx.create_file(&workspace, a.id, "c.txt", user).await;
    let target = ctx.create_folder(&workspace, workspace.root_id, "target", user).await;

    let clone_root = ctx.file_copy.copy_one(a.id, target.id, user).await.unwrap();
    assert_ne!(clone_root.id, a.id);
    assert_eq!(clone_root.name, "a");
    assert_eq!(clone_root.parent_id, Some(target.id));

    // Children of the clone mirror the source, with fresh ids throughout
    let clone_children = ctx.file_fetch.find_children(clone_root.id, user).await.unwrap();
    let by_name: HashMap<String, _> = clone_children
        .into_iter()
        .map(|f| (f.name.clone(), f))
        .collect();
    assert_eq!(by_name.len(), 2);
    let clone_b = &by_name["b"];
    let clone_c = &by_name["c.txt"];
    assert!(clone_b.is_folder());
    assert!(clone_c.is_file());
    assert!(![a.id, b.id, c.id, d.id].contains(&clone_b.id));
    assert!(![a.id, b.id, c.id, d.id].contains(&clone_c.id));

    let clone_b_children = ctx.file_fetch.find_children(clone_b.id, user).await.unwrap();
    assert_eq!(clone_b_children.len(), 1);
    assert_eq!(clone_b_children[0].name, "d.txt");

    // The original subtree is untouched
    let originals = ctx.file_fetch.find_children(a.id, user).await.unwrap();
    assert_eq!(originals.len(), 2);

    // The clone owner holds owner permission on every cloned node
    assert!(ctx
        .file_guard
        .is_authorized(user, clone_b, depot_core::models::Permission::Owner)
        .await);

    // Detached re-index lands after the fan-out settles
    ctx.fanout.wait_idle().await;
    assert!(ctx
        .search_provider
        .contains("file", &clone_root.id.to_string()));

    // Progress tasks never outlive the operation
    assert_eq!(ctx.db.task_count(), 0);
}

#[tokio::test]
async fn test_copy_shares_snapshots_through_mapping() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let folder = ctx.create_folder(&workspace, workspace.root_id, "folder", user).await;
    let file = ctx.create_file(&workspace, folder.id, "doc.txt", user).await;
    let file = ctx
        .store_content(&workspace, file.id, "hello", user)
        .await
        .unwrap();
    let snapshot_id = file.snapshot_id.unwrap();
    let target = ctx.create_folder(&workspace, workspace.root_id, "target", user).await;

    ctx.file_copy.copy_one(folder.id, target.id, user).await.unwrap();

    // One snapshot, two associations; content is shared, not duplicated
    assert_eq!(ctx.db.snapshot_count(), 1);
    assert_eq!(
        ctx.snapshot_repo.count_associations(snapshot_id).await.unwrap(),
        2
    );
    let referencing = ctx.file_repo.find_ids_by_snapshot(snapshot_id).await.unwrap();
    assert_eq!(referencing.len(), 2);
}

#[tokio::test]
async fn test_copy_collision_appends_unique_suffix() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let source = ctx.create_file(&workspace, workspace.root_id, "report.pdf", user).await;
    let target = ctx.create_folder(&workspace, workspace.root_id, "target", user).await;
    ctx.create_file(&workspace, target.id, "report.pdf", user).await;

    let clone = ctx.file_copy.copy_one(source.id, target.id, user).await.unwrap();
    assert_ne!(clone.name, "report.pdf");
    assert!(clone.name.starts_with("report "));
    assert!(clone.name.ends_with(".pdf"));
}

#[tokio::test]
async fn test_copy_into_itself_is_rejected() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let a = ctx.create_folder(&workspace, workspace.root_id, "a", user).await;

    let err = ctx.file_copy.copy_one(a.id, a.id, user).await.unwrap_err();
    assert!(matches!(err, AppError::FileCannotBeCopiedIntoItself(_)));
}

#[tokio::test]
async fn test_copy_into_own_subtree_is_rejected() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let a = ctx.create_folder(&workspace, workspace.root_id, "a", user).await;
    let b = ctx.create_folder(&workspace, a.id, "b", user).await;

    let err = ctx.file_copy.copy_one(a.id, b.id, user).await.unwrap_err();
    assert!(matches!(err, AppError::FileCannotBeCopiedIntoOwnSubtree(_)));
    assert_eq!(ctx.db.task_count(), 0);
}

#[tokio::test]
async fn test_copy_many_reports_parallel_lists() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let a = ctx.create_file(&workspace, workspace.root_id, "a.txt", user).await;
    let b = ctx.create_file(&workspace, workspace.root_id, "b.txt", user).await;
    let missing = Uuid::new_v4();
    let target = ctx.create_folder(&workspace, workspace.root_id, "target", user).await;

    let result = ctx
        .file_copy
        .copy_many(&[a.id, missing, b.id], target.id, user)
        .await
        .unwrap();
    assert_eq!(result.succeeded, vec![a.id, b.id]);
    assert_eq!(result.failed, vec![missing]);
    assert_eq!(result.new.len(), 2);
    for new_id in &result.new {
        assert!(![a.id, b.id].contains(new_id));
    }
}

#[tokio::test]
async fn test_copy_bumps_target_update_time() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let source = ctx.create_file(&workspace, workspace.root_id, "a.txt", user).await;
    let target = ctx.create_folder(&workspace, workspace.root_id, "target", user).await;
    assert!(target.update_time.is_none());

    ctx.file_copy.copy_one(source.id, target.id, user).await.unwrap();
    let target = ctx.file_cache.get(target.id).await.unwrap();
    assert!(target.update_time.is_some());
}
