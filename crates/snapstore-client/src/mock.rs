//! Mock SnapshotBackend for unit testing
//!
//! Stores snapshots in memory and can be switched into a failing mode to
//! simulate an unreachable backup location.

use crate::error::SnapstoreError;
use crate::models::{Snapshot, SnapshotKind};
use crate::snapstore_trait::SnapshotBackend;
use std::sync::{Arc, Mutex};

/// Mock snapshot store for testing
#[derive(Debug, Clone, Default)]
pub struct MockSnapstoreClient {
    full: Arc<Mutex<Vec<Snapshot>>>,
    deltas: Arc<Mutex<Vec<Snapshot>>>,
    unavailable: Arc<Mutex<Option<String>>>,
    list_calls: Arc<Mutex<u32>>,
}

impl MockSnapstoreClient {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a full snapshot ending at `last_revision`
    pub fn with_full(self, last_revision: i64) -> Self {
        self.full
            .lock()
            .unwrap()
            .push(snapshot(SnapshotKind::Full, 0, last_revision));
        self
    }

    /// Append a delta snapshot ending at `last_revision`
    pub fn with_delta(self, last_revision: i64) -> Self {
        {
            let mut deltas = self.deltas.lock().unwrap();
            let start = deltas.last().map_or(0, |s| s.last_revision + 1);
            deltas.push(snapshot(SnapshotKind::Delta, start, last_revision));
        }
        self
    }

    /// Make every listing fail with the given message
    pub fn unavailable(self, message: impl Into<String>) -> Self {
        *self.unavailable.lock().unwrap() = Some(message.into());
        self
    }

    /// Number of list calls served so far
    pub fn list_calls(&self) -> u32 {
        *self.list_calls.lock().unwrap()
    }

    fn check_available(&self) -> Result<(), SnapstoreError> {
        *self.list_calls.lock().unwrap() += 1;
        match self.unavailable.lock().unwrap().as_ref() {
            Some(message) => Err(SnapstoreError::Api {
                status: 503,
                body: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn snapshot(kind: SnapshotKind, start_revision: i64, last_revision: i64) -> Snapshot {
    let prefix = match kind {
        SnapshotKind::Full => "Full",
        SnapshotKind::Delta => "Incr",
    };
    Snapshot {
        kind,
        start_revision,
        last_revision,
        created_on: None,
        snap_dir: "Backup-mock".to_string(),
        snap_name: format!("{prefix}-{start_revision:08}-{last_revision:08}"),
        is_chunk: false,
        compression_suffix: String::new(),
    }
}

#[async_trait::async_trait]
impl SnapshotBackend for MockSnapstoreClient {
    async fn list_full(&self) -> Result<Vec<Snapshot>, SnapstoreError> {
        self.check_available()?;
        Ok(self.full.lock().unwrap().clone())
    }

    async fn list_deltas(&self) -> Result<Vec<Snapshot>, SnapstoreError> {
        self.check_available()?;
        Ok(self.deltas.lock().unwrap().clone())
    }
}
