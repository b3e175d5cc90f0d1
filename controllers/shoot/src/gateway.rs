//! Seams between the reconcilers and the seed cluster.
//!
//! The reconcilers only talk to these traits. `seed.rs` implements them on
//! top of the Kubernetes API, `test_utils.rs` with in-memory fakes.

use crate::error::ControllerError;
use crds::{Shoot, ShootStatus};
use k8s_openapi::api::core::v1::ResourceRequirements;
use snapstore_client::SnapshotBackend;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Legacy backup infrastructure record of a shoot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReference {
    /// Namespace of the record (the shoot's project namespace)
    pub namespace: String,
    /// Derived record name
    pub name: String,
    /// Base URL of the old snapshot store
    pub snapstore_url: String,
    /// Whether the record is already being deleted
    pub deleting: bool,
}

/// Replica count and container resources of a running workload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedWorkload {
    /// `spec.replicas`
    pub replicas: Option<i32>,
    /// Resources per container name
    pub containers: BTreeMap<String, ResourceRequirements>,
}

impl ObservedWorkload {
    /// Resources of the named container, if it exists and has any
    pub fn container_resources(&self, name: &str) -> Option<&ResourceRequirements> {
        self.containers.get(name)
    }
}

/// Applies a component release into a seed namespace.
///
/// `overrides` are merged over `base`; applying an unchanged release succeeds.
#[async_trait::async_trait]
pub trait DeploymentGateway: Send + Sync {
    async fn apply(
        &self,
        component: &str,
        namespace: &str,
        release: &str,
        base: &serde_json::Value,
        overrides: &serde_json::Value,
    ) -> Result<(), ControllerError>;
}

/// Waits until a workload reports ready.
#[async_trait::async_trait]
pub trait ReadinessGate: Send + Sync {
    /// Waits for `replicas` ready replicas of the current generation.
    /// Fails with `ReadinessTimeout` once `timeout` elapses.
    async fn wait_ready(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
        timeout: Duration,
    ) -> Result<(), ControllerError>;
}

/// Legacy backup infrastructure records.
#[async_trait::async_trait]
pub trait BackupInfrastructureStore: Send + Sync {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BackupReference>, ControllerError>;

    /// Deleting a record that does not exist succeeds.
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ControllerError>;
}

/// Read access to workloads and secrets in the seed.
#[async_trait::async_trait]
pub trait SeedReader: Send + Sync {
    async fn statefulset(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ObservedWorkload>, ControllerError>;

    async fn deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ObservedWorkload>, ControllerError>;

    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, ControllerError>;
}

/// Opens the snapshot backend a legacy record points at.
pub trait SnapshotBackendFactory: Send + Sync {
    fn backend_for(
        &self,
        reference: &BackupReference,
    ) -> Result<Arc<dyn SnapshotBackend>, ControllerError>;
}

/// Writes to Shoot objects.
#[async_trait::async_trait]
pub trait ShootStore: Send + Sync {
    /// Remove the operation annotation, conditional on the observed resourceVersion.
    async fn remove_operation_annotation(&self, shoot: &Shoot) -> Result<(), ControllerError>;

    async fn patch_status(&self, shoot: &Shoot, status: &ShootStatus) -> Result<(), ControllerError>;
}

/// All seams used by one reconciler
#[derive(Clone)]
pub struct SeedGateways {
    pub deployments: Arc<dyn DeploymentGateway>,
    pub readiness: Arc<dyn ReadinessGate>,
    pub backups: Arc<dyn BackupInfrastructureStore>,
    pub reader: Arc<dyn SeedReader>,
    pub snapshots: Arc<dyn SnapshotBackendFactory>,
    pub shoots: Arc<dyn ShootStore>,
}

impl std::fmt::Debug for SeedGateways {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedGateways").finish_non_exhaustive()
    }
}

/// Deep-merge `overrides` over `base`. Objects merge key by key, everything else is replaced.
pub fn merge_values(base: &serde_json::Value, overrides: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match (base, overrides) {
        (Value::Object(b), Value::Object(o)) => {
            let mut merged = b.clone();
            for (key, value) in o {
                let next = match merged.get(key) {
                    Some(existing) => merge_values(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, Value::Null) => base.clone(),
        _ => overrides.clone(),
    }
}
