//! Controller-specific error types.
//!
//! Lookups that may legitimately find nothing return `Option` instead of an
//! error, so absence never surfaces here.

use kube::Error as KubeError;
use snapstore_client::SnapstoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the Shoot Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Snapshot listing of the legacy backup location failed
    #[error("snapshot store of backup infrastructure {backup_infrastructure} unavailable: {source}")]
    BackendUnavailable {
        /// Name of the legacy backup infrastructure record
        backup_infrastructure: String,
        /// Underlying store error
        #[source]
        source: SnapstoreError,
    },

    /// A component did not become ready in time
    #[error("{namespace}/{name} not ready after {}s", timeout.as_secs())]
    ReadinessTimeout {
        /// Seed namespace
        namespace: String,
        /// Workload name
        name: String,
        /// Bound that was exceeded
        timeout: Duration,
    },

    /// Invalid configuration or malformed input on the shoot
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization error while building values
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Probe server I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// An error annotated with the step it happened in
    #[error("{step}: {source}")]
    Step {
        /// Step or role, e.g. "deploy etcd-main"
        step: String,
        /// Underlying error
        #[source]
        source: Box<ControllerError>,
    },
}

impl ControllerError {
    /// Annotate the error with the step it occurred in.
    pub fn in_step(self, step: impl Into<String>) -> Self {
        ControllerError::Step {
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// Whether retrying the pass can succeed without a change of the input.
    pub fn is_retryable(&self) -> bool {
        match self {
            ControllerError::InvalidConfig(_) => false,
            ControllerError::Step { source, .. } => source.is_retryable(),
            _ => true,
        }
    }
}

/// Shorthand for `map_err(|e| e.in_step(..))`.
pub(crate) trait StepContext<T> {
    fn step(self, step: impl Into<String>) -> Result<T, ControllerError>;
}

impl<T, E: Into<ControllerError>> StepContext<T> for Result<T, E> {
    fn step(self, step: impl Into<String>) -> Result<T, ControllerError> {
        self.map_err(|e| e.into().in_step(step))
    }
}
