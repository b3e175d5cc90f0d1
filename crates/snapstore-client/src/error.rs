//! Snapshot store client errors

use thiserror::Error;

/// Errors that can occur when talking to the snapshot store
#[derive(Debug, Error)]
pub enum SnapstoreError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status
    #[error("Snapshot store error: {status} - {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Credentials were rejected
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The store URL is malformed
    #[error("Invalid store URL: {0}")]
    InvalidUrl(String),
}
