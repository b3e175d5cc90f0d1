//! Reconciliation logic for Shoot resources.
//!
//! - `shoot`: the reconciliation pass (policy, annotations, status)
//! - `etcd`: etcd deployment and legacy backup migration
//! - `control_plane`: kube-apiserver and kube-controller-manager
//! - `resources`: kube-apiserver resource tiers
//! - `snapshot`: latest revision of a snapshot store

pub mod control_plane;
pub mod etcd;
pub mod resources;
pub mod shoot;
pub mod snapshot;

use crate::backoff::FibonacciBackoff;
use crate::config::ControllerConfig;
use crate::error::{ControllerError, StepContext};
use crate::gateway::SeedGateways;
use crate::metrics::ShootMetrics;
use crate::naming::compute_secret_checksum;
use crds::Shoot;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// Backoff state for a shoot whose last pass failed
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
    retry_at: Option<Instant>,
}

impl BackoffState {
    fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::new(1, 10), // 1 minute min, 10 minutes max
            error_count: 0,
            retry_at: None,
        }
    }
}

/// Identity of a shoot and where its control plane lives
#[derive(Debug, Clone)]
pub(crate) struct ShootTarget<'a> {
    /// `namespace/name`, for logs
    pub key: String,
    pub project_namespace: &'a str,
    pub seed_namespace: &'a str,
    pub uid: &'a str,
}

impl<'a> ShootTarget<'a> {
    pub fn from_shoot(shoot: &'a Shoot) -> Result<Self, ControllerError> {
        let key = shoot_key(shoot);
        let project_namespace = shoot
            .metadata
            .namespace
            .as_deref()
            .ok_or_else(|| ControllerError::InvalidConfig(format!("shoot {key} has no namespace")))?;
        let seed_namespace = shoot.seed_namespace().ok_or_else(|| {
            ControllerError::InvalidConfig(format!("shoot {key} has no technical ID yet"))
        })?;
        let uid = shoot
            .shoot_uid()
            .ok_or_else(|| ControllerError::InvalidConfig(format!("shoot {key} has no UID")))?;
        Ok(Self {
            key,
            project_namespace,
            seed_namespace,
            uid,
        })
    }
}

/// `namespace/name` of a shoot
pub(crate) fn shoot_key(shoot: &Shoot) -> String {
    format!(
        "{}/{}",
        shoot.namespace().unwrap_or_default(),
        shoot.name_any()
    )
}

/// Reconciles Shoot resources.
#[derive(Debug)]
pub struct Reconciler {
    pub(crate) seed: SeedGateways,
    pub(crate) config: ControllerConfig,
    pub(crate) metrics: ShootMetrics,
    /// Last version of each shoot seen by the controller (namespace/name -> Shoot)
    observed: Mutex<HashMap<String, Shoot>>,
    /// Error tracking per shoot (namespace/name -> BackoffState)
    backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl Reconciler {
    /// Creates a new reconciler.
    pub fn new(seed: SeedGateways, config: ControllerConfig, metrics: ShootMetrics) -> Self {
        Self {
            seed,
            config,
            metrics,
            observed: Mutex::new(HashMap::new()),
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Store `shoot` as the latest observed version and return the previous one.
    fn remember(&self, key: &str, shoot: &Shoot) -> Option<Shoot> {
        match self.observed.lock() {
            Ok(mut observed) => observed.insert(key.to_string(), shoot.clone()),
            Err(e) => {
                warn!("Failed to lock observed shoots: {}", e);
                None
            }
        }
    }

    /// Record a retryable failure and return the requeue delay.
    pub(crate) fn record_failure(&self, key: &str) -> Duration {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(key.to_string()).or_insert_with(BackoffState::new);
                state.error_count += 1;
                let delay = state.backoff.next_backoff();
                state.retry_at = Some(Instant::now() + delay);
                delay
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                Duration::from_secs(60)
            }
        }
    }

    pub(crate) fn record_success(&self, key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(key);
        }
    }

    /// Retry state of a shoot whose last pass failed: `Some(remaining wait)`.
    pub(crate) fn pending_retry(&self, key: &str) -> Option<Duration> {
        let states = self.backoff_states.lock().ok()?;
        let state = states.get(key)?;
        (state.error_count > 0).then(|| {
            state
                .retry_at
                .map(|at| at.saturating_duration_since(Instant::now()))
                .unwrap_or_default()
        })
    }

    /// Number of consecutive failed passes of a shoot
    pub(crate) fn error_count(&self, key: &str) -> u32 {
        self.backoff_states
            .lock()
            .ok()
            .and_then(|states| states.get(key).map(|s| s.error_count))
            .unwrap_or(0)
    }

    /// Checksum pod annotations for the given (annotation, secret) pairs.
    /// Missing secrets are left out.
    pub(crate) async fn checksum_annotations(
        &self,
        namespace: &str,
        secrets: &[(&str, &str)],
    ) -> Result<BTreeMap<String, String>, ControllerError> {
        let mut annotations = BTreeMap::new();
        for (annotation, secret) in secrets {
            if let Some(data) = self
                .seed
                .reader
                .secret_data(namespace, secret)
                .await
                .step(format!("read secret {secret}"))?
            {
                annotations.insert((*annotation).to_string(), compute_secret_checksum(&data));
            }
        }
        Ok(annotations)
    }
}
