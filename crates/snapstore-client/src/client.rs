//! Snapshot store API client
//!
//! Talks to the backup-restore sidecar: `GET /snapshot/latest` returns the
//! latest full snapshot and the delta snapshots taken after it.

use crate::error::SnapstoreError;
use crate::models::{LatestSnapshots, Snapshot};
use crate::snapstore_trait::SnapshotBackend;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Snapshot store API client
#[derive(Debug, Clone)]
pub struct SnapstoreClient {
    client: Client,
    base_url: String,
}

impl SnapstoreClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - Sidecar base URL (e.g., "http://etcd-main-client:8080")
    pub fn new(base_url: String) -> Result<Self, SnapstoreError> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SnapstoreError::InvalidUrl(base_url));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the latest snapshot chain
    pub async fn latest(&self) -> Result<LatestSnapshots, SnapstoreError> {
        let url = format!("{}/snapshot/latest", self.base_url);
        debug!("Fetching latest snapshots: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(SnapstoreError::AccessDenied(format!("{} - {}", status, body)));
        }

        // No snapshot taken yet
        if status == 404 {
            return Ok(LatestSnapshots::default());
        }

        let response_text = response.text().await?;
        if !status.is_success() {
            return Err(SnapstoreError::Api {
                status: status.as_u16(),
                body: response_text.chars().take(500).collect(),
            });
        }

        let latest: LatestSnapshots = serde_json::from_str(&response_text)?;
        debug!(
            "Latest chain: full={}, deltas={}",
            latest.full_snapshot.is_some(),
            latest.delta_snapshots.len()
        );
        Ok(latest)
    }
}

#[async_trait::async_trait]
impl SnapshotBackend for SnapstoreClient {
    async fn list_full(&self) -> Result<Vec<Snapshot>, SnapstoreError> {
        Ok(self.latest().await?.full_snapshot.into_iter().collect())
    }

    async fn list_deltas(&self) -> Result<Vec<Snapshot>, SnapstoreError> {
        let mut deltas = self.latest().await?.delta_snapshots;
        deltas.sort_by_key(|s| s.last_revision);
        Ok(deltas)
    }
}
