//! Blob storage abstraction for Depot
//!
//! Snapshot artifacts live in an S3-compatible object store, one bucket per
//! workspace. The [`BlobStore`] trait keeps the service layer independent of
//! the backend; [`s3::S3BlobStore`] is the production implementation and
//! [`memory::MemoryBlobStore`] backs tests.

pub mod keys;
pub mod memory;
pub mod s3;
pub mod traits;

pub use keys::{artifact_key, file_artifact_key};
pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;
pub use traits::{BlobStore, ObjectStat, StorageError, StorageResult};
