//! Snapshot Store Client
//!
//! A Rust client for the etcd backup-restore sidecar. It lists the full and
//! incremental (delta) snapshots held in a backup location so that callers can
//! find the latest committed etcd revision.
//!
//! # Example
//!
//! ```no_run
//! use snapstore_client::{SnapstoreClient, SnapshotBackend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SnapstoreClient::new("http://etcd-main-client:8080".to_string())?;
//!
//! let full = client.list_full().await?;
//! let deltas = client.list_deltas().await?;
//! println!("{} full, {} delta snapshots", full.len(), deltas.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod snapstore_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::SnapstoreClient;
pub use error::SnapstoreError;
pub use models::*;
pub use snapstore_trait::SnapshotBackend;
#[cfg(feature = "test-util")]
pub use mock::MockSnapstoreClient;
