//! Shared key composition for snapshot artifacts.
//!
//! Artifacts of a snapshot live under the snapshot id:
//! `{snapshot_id}/{artifact}[.ext]`. Derivatives produced for one specific
//! file (e.g. watermarks, which bake in per-file metadata) are nested under
//! the file id: `{file_id}/{snapshot_id}/{artifact}[.ext]`.

use uuid::Uuid;

/// Key for a snapshot-scoped artifact, e.g. `original` with the source
/// extension or `mosaic` as a folder prefix.
pub fn artifact_key(snapshot_id: Uuid, artifact: &str) -> String {
    format!("{}/{}", snapshot_id, artifact)
}

/// Key for a file-scoped derivative of a snapshot.
pub fn file_artifact_key(file_id: Uuid, snapshot_id: Uuid, artifact: &str) -> String {
    format!("{}/{}/{}", file_id, snapshot_id, artifact)
}
