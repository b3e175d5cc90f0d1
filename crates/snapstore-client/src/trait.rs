//! SnapshotBackend trait for mocking
//!
//! The concrete SnapstoreClient implements this trait, and tests can use the
//! in-memory mock.

use crate::error::SnapstoreError;
use crate::models::Snapshot;

/// Listing operations of a snapshot backup location
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Full snapshots of the latest chain
    async fn list_full(&self) -> Result<Vec<Snapshot>, SnapstoreError>;

    /// Delta snapshots of the latest chain, ascending by revision
    async fn list_deltas(&self) -> Result<Vec<Snapshot>, SnapstoreError>;
}
