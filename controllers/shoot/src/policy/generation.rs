//! Generation bump decision.
//!
//! `decide` is a pure function over the previous and the new version of a
//! shoot. Rules are evaluated in order and the first match wins.

use crds::{LastOperationState, OPERATION_ANNOTATION, Shoot, ShootOperation};

/// Why a new generation has to be started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncrementReason {
    /// The spec changed structurally
    SpecChanged,
    /// The deletion timestamp was newly set
    DeletionRequested,
    /// Retry annotation on a failed shoot
    RetryRequested,
    /// Reconcile annotation on a shoot that is not failed
    ReconcileRequested,
    /// Credential rotation annotation
    CredentialsRotation,
    /// The purpose annotation changed
    PurposeChanged,
}

impl IncrementReason {
    /// Label value used in logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            IncrementReason::SpecChanged => "spec_changed",
            IncrementReason::DeletionRequested => "deletion_requested",
            IncrementReason::RetryRequested => "retry_requested",
            IncrementReason::ReconcileRequested => "reconcile_requested",
            IncrementReason::CredentialsRotation => "credentials_rotation",
            IncrementReason::PurposeChanged => "purpose_changed",
        }
    }
}

/// Outcome of the generation policy for one update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconciliationRequest {
    /// Whether the generation counter has to be incremented
    pub must_increment_generation: bool,
    /// Operation annotation that has to be removed together with the bump
    pub consumed_annotation: Option<ShootOperation>,
    /// First matching rule
    pub reason: Option<IncrementReason>,
}

impl ReconciliationRequest {
    fn increment(reason: IncrementReason) -> Self {
        Self {
            must_increment_generation: true,
            consumed_annotation: None,
            reason: Some(reason),
        }
    }

    fn triggered_by(reason: IncrementReason, operation: ShootOperation) -> Self {
        Self {
            consumed_annotation: Some(operation).filter(|op| op.self_clearing()),
            ..Self::increment(reason)
        }
    }
}

/// Decide whether the update from `old` to `new` starts a new generation.
pub fn decide(old: &Shoot, new: &Shoot) -> ReconciliationRequest {
    if old.spec != new.spec {
        return ReconciliationRequest::increment(IncrementReason::SpecChanged);
    }

    if old.metadata.deletion_timestamp.is_none() && new.metadata.deletion_timestamp.is_some() {
        return ReconciliationRequest::increment(IncrementReason::DeletionRequested);
    }

    let operation = new.operation();

    // A shoot that was never operated on has nothing to retry or reconcile.
    if let (Some(last), Some(op)) = (new.last_operation(), operation) {
        let failed = last.state == LastOperationState::Failed;
        match op {
            ShootOperation::Retry if failed => {
                return ReconciliationRequest::triggered_by(IncrementReason::RetryRequested, op);
            }
            ShootOperation::Reconcile if !failed => {
                return ReconciliationRequest::triggered_by(IncrementReason::ReconcileRequested, op);
            }
            _ => {}
        }
    }

    if operation == Some(ShootOperation::RotateCredentials) {
        return ReconciliationRequest::triggered_by(
            IncrementReason::CredentialsRotation,
            ShootOperation::RotateCredentials,
        );
    }

    if old.purpose() != new.purpose() {
        return ReconciliationRequest::increment(IncrementReason::PurposeChanged);
    }

    ReconciliationRequest::default()
}

/// Decision for a watch event, `previous` being the last version the
/// controller saw.
///
/// The rotate-credentials annotation persists across writes, so status-only
/// events would match it again. It only counts on the event where it appears;
/// afterwards the remaining rules are evaluated without it.
pub fn decide_observed(previous: &Shoot, current: &Shoot) -> ReconciliationRequest {
    let rotating = |shoot: &Shoot| shoot.operation() == Some(ShootOperation::RotateCredentials);
    if !(rotating(previous) && rotating(current)) {
        return decide(previous, current);
    }

    let mut previous = previous.clone();
    let mut current = current.clone();
    for shoot in [&mut previous, &mut current] {
        if let Some(annotations) = shoot.metadata.annotations.as_mut() {
            annotations.remove(OPERATION_ANNOTATION);
        }
    }
    decide(&previous, &current)
}

/// Decision for a shoot seen for the first time (no previous version known).
///
/// The shoot is compared against itself without a deletion timestamp, so a
/// pending deletion and pending operation annotations still count.
pub fn decide_initial(shoot: &Shoot) -> ReconciliationRequest {
    let mut baseline = shoot.clone();
    baseline.metadata.deletion_timestamp = None;
    decide(&baseline, shoot)
}
