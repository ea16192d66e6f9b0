//! Depot service layer
//!
//! The tree mutation engine, snapshot/version manager, permission guards,
//! task orchestration, and the cache/search synchronization discipline all
//! live here, on top of the repository traits from `depot-db`, the blob
//! store from `depot-storage`, and the search wrappers from `depot-search`.

pub mod cache;
pub mod fanout;
pub mod file;
pub mod guard;
pub mod pipeline;
pub mod snapshot_service;
pub mod task_service;
pub mod test_helpers;
pub mod workspace_service;

pub use cache::{FileCache, SnapshotCache, TaskCache, WorkspaceCache};
pub use fanout::Fanout;
pub use guard::{FileGuard, GroupGuard, WorkspaceGuard};
pub use pipeline::{ConversionClient, PipelineRunOptions, PipelineRunner, PipelineService};
pub use snapshot_service::SnapshotService;
pub use task_service::TaskService;
pub use workspace_service::WorkspaceService;

/// Chunk size for bulk inserts and deletes over subtrees.
pub const BULK_CHUNK_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// 1-based pagination over an already sorted list. Returns the page along
/// with total elements and total pages.
pub(crate) fn paginate<T>(data: Vec<T>, page: u64, size: u64) -> (Vec<T>, u64, u64) {
    let total_elements = data.len() as u64;
    let size = size.max(1);
    let page = page.max(1);
    let total_pages = total_elements.div_ceil(size);
    if page > total_pages {
        return (Vec::new(), total_elements, total_pages);
    }
    let start = ((page - 1) * size) as usize;
    let end = (start + size as usize).min(data.len());
    let paged = data.into_iter().skip(start).take(end - start).collect();
    (paged, total_elements, total_pages)
}
