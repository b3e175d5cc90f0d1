//! Snapshot locator: latest committed etcd revision of a backup location.

use snapstore_client::{SnapshotBackend, SnapstoreError};

/// Latest committed revision in the backup location.
///
/// The tail of the delta chain if there is one, else the latest full
/// snapshot, else 0 (no backup was ever taken).
pub async fn latest_revision(backend: &dyn SnapshotBackend) -> Result<i64, SnapstoreError> {
    let full = backend.list_full().await?;
    let deltas = backend.list_deltas().await?;

    if let Some(delta) = deltas.last() {
        return Ok(delta.last_revision);
    }
    Ok(full.last().map_or(0, |s| s.last_revision))
}
