//! File tree creation, rename and lookup behavior.

use depot_core::models::{FileType, Permission};
use depot_core::AppError;
use depot_services::file::FileCreateOptions;
use depot_services::test_helpers::TestContext;
use uuid::Uuid;

#[tokio::test]
async fn test_create_under_parent() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;

    let docs = ctx
        .create_folder(&workspace, workspace.root_id, "docs", user)
        .await;
    assert_eq!(docs.parent_id, Some(workspace.root_id));
    assert_eq!(docs.file_type, FileType::Folder);

    let report = ctx.create_file(&workspace, docs.id, "report.pdf", user).await;
    assert_eq!(report.parent_id, Some(docs.id));
    assert!(report.is_file());

    // Indexed for search as part of creation
    assert!(ctx
        .search_provider
        .contains("file", &report.id.to_string()));
}

#[tokio::test]
async fn test_create_same_name_returns_existing() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;

    let first = ctx.create_file(&workspace, workspace.root_id, "a.txt", user).await;
    let second = ctx.create_file(&workspace, workspace.root_id, "a.txt", user).await;
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn test_create_under_file_fails() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "a.txt", user).await;

    let err = ctx
        .file_create
        .create(
            FileCreateOptions {
                workspace_id: workspace.id,
                name: "b.txt".to_string(),
                file_type: FileType::File,
                parent_id: file.id,
            },
            user,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::FileIsNotAFolder(_)));
}

#[tokio::test]
async fn test_create_requires_editor_on_parent() {
    let ctx = TestContext::new();
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let workspace = ctx.create_workspace(owner).await;

    // A viewer cannot create; the failure names the permission, not the
    // resource's existence, because viewer level was already granted.
    ctx.file_permission
        .grant_user_permission(&[workspace.root_id], stranger, Permission::Viewer, owner)
        .await
        .unwrap();
    let err = ctx
        .file_create
        .create(
            FileCreateOptions {
                workspace_id: workspace.id,
                name: "a.txt".to_string(),
                file_type: FileType::File,
                parent_id: workspace.root_id,
            },
            stranger,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_rename_collision_fails_loudly() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    ctx.create_file(&workspace, workspace.root_id, "a.txt", user).await;
    let b = ctx.create_file(&workspace, workspace.root_id, "b.txt", user).await;

    let err = ctx.file_update.rename(b.id, "a.txt", user).await.unwrap_err();
    assert!(matches!(err, AppError::FileWithSimilarNameExists(_)));

    // Renaming to its own name is a no-op, not a collision
    let renamed = ctx.file_update.rename(b.id, "b.txt", user).await.unwrap();
    assert_eq!(renamed.name, "b.txt");

    let renamed = ctx.file_update.rename(b.id, "c.txt", user).await.unwrap();
    assert_eq!(renamed.name, "c.txt");
    assert!(renamed.update_time.is_some());
    assert_eq!(ctx.file_cache.get(b.id).await.unwrap().name, "c.txt");
}

#[tokio::test]
async fn test_find_children_filters_unauthorized() {
    let ctx = TestContext::new();
    let owner = Uuid::new_v4();
    let viewer = Uuid::new_v4();
    let workspace = ctx.create_workspace(owner).await;
    let visible = ctx.create_file(&workspace, workspace.root_id, "visible.txt", owner).await;
    ctx.create_file(&workspace, workspace.root_id, "hidden.txt", owner).await;

    ctx.file_permission
        .grant_user_permission(
            &[workspace.root_id, visible.id],
            viewer,
            Permission::Viewer,
            owner,
        )
        .await
        .unwrap();

    let children = ctx
        .file_fetch
        .find_children(workspace.root_id, viewer)
        .await
        .unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, visible.id);

    // The owner sees both
    let children = ctx
        .file_fetch
        .find_children(workspace.root_id, owner)
        .await
        .unwrap();
    assert_eq!(children.len(), 2);
}

#[tokio::test]
async fn test_find_path_is_root_to_node() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let docs = ctx.create_folder(&workspace, workspace.root_id, "docs", user).await;
    let nested = ctx.create_folder(&workspace, docs.id, "nested", user).await;

    let path = ctx.file_fetch.find_path(nested.id, user).await.unwrap();
    let ids: Vec<Uuid> = path.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![workspace.root_id, docs.id, nested.id]);
}

#[tokio::test]
async fn test_fetch_unknown_ids_are_skipped() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "a.txt", user).await;

    let found = ctx
        .file_fetch
        .find(&[file.id, Uuid::new_v4()], user)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, file.id);
}

#[tokio::test]
async fn test_workspace_scoped_search() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let report = ctx
        .create_file(&workspace, workspace.root_id, "annual report.pdf", user)
        .await;
    ctx.create_file(&workspace, workspace.root_id, "notes.txt", user).await;

    let hits = ctx
        .file_fetch
        .query("report", workspace.id, user)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, report.id);
}
