//! File tree services: creation, lookup, mutation, permissions, content
//! ingestion and reprocessing.

pub mod copy_service;
pub mod create_service;
pub mod delete_service;
pub mod fetch_service;
pub mod move_service;
pub mod permission_service;
pub mod reprocess_service;
pub mod store_service;
pub mod sync;
pub mod update_service;

pub use copy_service::{FileCopyManyResult, FileCopyService};
pub use create_service::{FileCreateOptions, FileCreateService};
pub use delete_service::{FileDeleteManyResult, FileDeleteService};
pub use fetch_service::FileFetchService;
pub use move_service::{FileMoveManyResult, FileMoveService};
pub use permission_service::FilePermissionService;
pub use reprocess_service::{FileReprocessResult, FileReprocessService};
pub use store_service::{FileStoreService, S3Reference, StoreOptions};
pub use sync::FileSync;
pub use update_service::FileUpdateService;

use uuid::Uuid;

/// Derive a sibling-unique variant of `name` by inserting a short random
/// suffix before the extension. Used by copy, which must always succeed
/// where move fails loudly.
pub(crate) fn unique_name(name: &str) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string()[..8].to_string();
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} {}.{}", stem, suffix, ext),
        _ => format!("{} {}", name, suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_name_keeps_extension() {
        let name = unique_name("report.pdf");
        assert!(name.starts_with("report "));
        assert!(name.ends_with(".pdf"));
        assert_ne!(name, "report.pdf");
    }

    #[test]
    fn test_unique_name_without_extension() {
        let name = unique_name("attachments");
        assert!(name.starts_with("attachments "));
        assert_ne!(name, "attachments");
    }

    #[test]
    fn test_unique_name_dotfile() {
        let name = unique_name(".env");
        assert!(name.starts_with(".env "));
    }
}
