//! Operation annotation command channel
//!
//! Users ask for out-of-band work on a Shoot by setting the operation
//! annotation. Each command has a fixed consumption contract: some are cleared
//! by the component that schedules the reconciliation, others must stay until
//! a downstream process has acted on them.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Commands accepted through the operation annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShootOperation {
    /// Retry a failed operation
    Retry,

    /// Force a reconciliation of a healthy shoot
    Reconcile,

    /// Rotate the kubeconfig credentials
    RotateCredentials,
}

/// Raised when the operation annotation carries an unknown value
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown shoot operation: {0}")]
pub struct UnknownOperation(pub String);

impl ShootOperation {
    /// Annotation value for this command
    pub fn as_str(self) -> &'static str {
        match self {
            ShootOperation::Retry => "retry",
            ShootOperation::Reconcile => "reconcile",
            ShootOperation::RotateCredentials => "rotate-kubeconfig-credentials",
        }
    }

    /// Whether scheduling the reconciliation also clears the annotation.
    ///
    /// Credential rotation is cleared by the process doing the rotation.
    pub fn self_clearing(self) -> bool {
        !matches!(self, ShootOperation::RotateCredentials)
    }
}

impl FromStr for ShootOperation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retry" => Ok(ShootOperation::Retry),
            "reconcile" => Ok(ShootOperation::Reconcile),
            "rotate-kubeconfig-credentials" => Ok(ShootOperation::RotateCredentials),
            other => Err(UnknownOperation(other.to_string())),
        }
    }
}

impl fmt::Display for ShootOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
