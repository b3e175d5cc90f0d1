//! Snapshot store data models
//!
//! Mirrors the JSON returned by the backup-restore sidecar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of snapshot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SnapshotKind {
    /// Full database snapshot
    #[serde(rename = "Full")]
    Full,

    /// Incremental snapshot on top of a full one
    #[serde(rename = "Incr")]
    Delta,
}

/// A single snapshot in the backup location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Snapshot kind
    pub kind: SnapshotKind,

    /// First revision contained in the snapshot
    #[serde(default)]
    pub start_revision: i64,

    /// Last revision contained in the snapshot
    pub last_revision: i64,

    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,

    /// Directory of the snapshot in the store
    #[serde(default)]
    pub snap_dir: String,

    /// Object name of the snapshot
    #[serde(default)]
    pub snap_name: String,

    /// Whether this is a chunk of a multipart upload
    #[serde(default)]
    pub is_chunk: bool,

    /// Compression suffix (e.g. ".gz"), empty when uncompressed
    #[serde(default)]
    pub compression_suffix: String,
}

/// Latest full snapshot plus the deltas taken after it
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LatestSnapshots {
    /// Latest full snapshot, if any
    #[serde(default)]
    pub full_snapshot: Option<Snapshot>,

    /// Delta snapshots on top of the full snapshot, ascending by revision
    #[serde(default)]
    pub delta_snapshots: Vec<Snapshot>,
}
