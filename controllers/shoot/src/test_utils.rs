//! Test utilities for unit testing reconcilers
//!
//! Provides shoot builders and `FakeSeed`, an in-memory implementation of all
//! seed gateways that records every write in order.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::gateway::{
    BackupInfrastructureStore, BackupReference, DeploymentGateway, ObservedWorkload,
    ReadinessGate, SeedGateways, SeedReader, ShootStore, SnapshotBackendFactory, merge_values,
};
use crate::metrics::ShootMetrics;
use crate::reconciler::Reconciler;
use crds::*;
use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;
use snapstore_client::{MockSnapstoreClient, SnapshotBackend};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Helper to create a test Shoot with a technical ID and UID.
///
/// With a `state` the shoot has been observed at generation 1 with that result.
pub fn test_shoot(name: &str, namespace: &str, state: Option<LastOperationState>) -> Shoot {
    let mut spec = ShootSpec::default();
    spec.kubernetes.version = "1.30.2".to_string();
    spec.networking.nodes = Some("10.250.0.0/16".to_string());
    spec.networking.pods = Some("100.96.0.0/11".to_string());
    spec.networking.services = Some("100.64.0.0/13".to_string());
    spec.workers = vec![Worker {
        name: "pool-a".to_string(),
        machine_type: "m5.large".to_string(),
        minimum: 1,
        maximum: 3,
    }];

    Shoot {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{name}")),
            generation: Some(1),
            resource_version: Some("100".to_string()),
            ..Default::default()
        },
        spec,
        status: Some(ShootStatus {
            observed_generation: i64::from(state.is_some()),
            last_operation: state.map(|state| LastOperation {
                type_: LastOperationType::Reconcile,
                state,
                description: String::new(),
                progress: if state == LastOperationState::Succeeded { 100 } else { 0 },
                last_update_time: None,
            }),
            controller_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            technical_id: Some(format!("shoot--dev--{name}")),
            uid: Some(format!("uid-{name}")),
            hibernated: false,
        }),
    }
}

/// Copy of `shoot` carrying the operation annotation `value`
pub fn shoot_with_operation(mut shoot: Shoot, value: &str) -> Shoot {
    shoot
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(OPERATION_ANNOTATION.to_string(), value.to_string());
    shoot
}

/// Copy of `shoot` with hibernation requested
pub fn hibernated(mut shoot: Shoot) -> Shoot {
    shoot.spec.hibernation = Some(Hibernation { enabled: Some(true) });
    shoot
}

/// Requests and limits with the same cpu / memory
pub fn resources(cpu: &str, memory: &str) -> ResourceRequirements {
    let quantities = BTreeMap::from([
        ("cpu".to_string(), Quantity(cpu.to_string())),
        ("memory".to_string(), Quantity(memory.to_string())),
    ]);
    ResourceRequirements {
        requests: Some(quantities.clone()),
        limits: Some(quantities),
        ..Default::default()
    }
}

/// Writes observed by `FakeSeed`, in call order
#[derive(Debug, Clone, PartialEq)]
pub enum SeedEvent {
    Applied {
        component: String,
        namespace: String,
        release: String,
        /// Base and overrides, merged
        values: Value,
    },
    WaitedReady {
        namespace: String,
        name: String,
        replicas: i32,
    },
    DeletedBackupInfrastructure {
        namespace: String,
        name: String,
    },
    AnnotationRemoved {
        name: String,
    },
    StatusPatched {
        state: Option<LastOperationState>,
        observed_generation: i64,
    },
}

impl SeedEvent {
    /// Release name of an `Applied` event
    pub fn applied_release(&self) -> Option<&str> {
        match self {
            SeedEvent::Applied { release, .. } => Some(release),
            _ => None,
        }
    }
}

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// In-memory seed cluster
#[derive(Debug, Default)]
pub struct FakeSeed {
    events: Mutex<Vec<SeedEvent>>,
    statefulsets: HashMap<Key, ObservedWorkload>,
    deployments: HashMap<Key, ObservedWorkload>,
    secrets: HashMap<Key, BTreeMap<String, Vec<u8>>>,
    backups: Mutex<HashMap<Key, BackupReference>>,
    snapshots: MockSnapstoreClient,
    unready: HashSet<String>,
    rejected_releases: HashSet<String>,
    last_status: Mutex<Option<ShootStatus>>,
}

impl FakeSeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statefulset(mut self, namespace: &str, name: &str, workload: ObservedWorkload) -> Self {
        self.statefulsets.insert(key(namespace, name), workload);
        self
    }

    pub fn with_deployment(mut self, namespace: &str, name: &str, workload: ObservedWorkload) -> Self {
        self.deployments.insert(key(namespace, name), workload);
        self
    }

    pub fn with_secret(mut self, namespace: &str, name: &str, data: &[(&str, &str)]) -> Self {
        let data = data
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.as_bytes().to_vec()))
            .collect();
        self.secrets.insert(key(namespace, name), data);
        self
    }

    /// Register a legacy backup infrastructure record
    pub fn with_backup(self, reference: BackupReference) -> Self {
        if let Ok(mut backups) = self.backups.lock() {
            backups.insert(key(&reference.namespace, &reference.name), reference);
        }
        self
    }

    /// Snapshot store returned for every legacy record
    pub fn with_snapshots(mut self, snapshots: MockSnapstoreClient) -> Self {
        self.snapshots = snapshots;
        self
    }

    /// `wait_ready` on `name` times out
    pub fn never_ready(mut self, name: &str) -> Self {
        self.unready.insert(name.to_string());
        self
    }

    /// `apply` of `release` fails
    pub fn rejecting(mut self, release: &str) -> Self {
        self.rejected_releases.insert(release.to_string());
        self
    }

    pub fn events(&self) -> Vec<SeedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Releases applied, in order
    pub fn applied_releases(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(SeedEvent::applied_release)
            .map(str::to_string)
            .collect()
    }

    pub fn has_backup(&self, namespace: &str, name: &str) -> bool {
        self.backups
            .lock()
            .map(|b| b.contains_key(&key(namespace, name)))
            .unwrap_or(false)
    }

    pub fn snapshots(&self) -> &MockSnapstoreClient {
        &self.snapshots
    }

    /// `shoot` as the watch would deliver it after the last status patch:
    /// that status and a new resourceVersion, everything else unchanged.
    pub fn with_last_status(&self, shoot: &Shoot) -> Shoot {
        let mut updated = shoot.clone();
        if let Some(status) = self.last_status.lock().ok().and_then(|s| s.clone()) {
            updated.status = Some(status);
        }
        let version: u64 = shoot
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        updated.metadata.resource_version = Some((version + 1).to_string());
        updated
    }

    fn record(&self, event: SeedEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[async_trait::async_trait]
impl DeploymentGateway for FakeSeed {
    async fn apply(
        &self,
        component: &str,
        namespace: &str,
        release: &str,
        base: &Value,
        overrides: &Value,
    ) -> Result<(), ControllerError> {
        if self.rejected_releases.contains(release) {
            return Err(kube::Error::Service(format!("apply of {release} rejected").into()).into());
        }
        self.record(SeedEvent::Applied {
            component: component.to_string(),
            namespace: namespace.to_string(),
            release: release.to_string(),
            values: merge_values(base, overrides),
        });
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReadinessGate for FakeSeed {
    async fn wait_ready(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
        timeout: Duration,
    ) -> Result<(), ControllerError> {
        if self.unready.contains(name) {
            return Err(ControllerError::ReadinessTimeout {
                namespace: namespace.to_string(),
                name: name.to_string(),
                timeout,
            });
        }
        self.record(SeedEvent::WaitedReady {
            namespace: namespace.to_string(),
            name: name.to_string(),
            replicas,
        });
        Ok(())
    }
}

#[async_trait::async_trait]
impl BackupInfrastructureStore for FakeSeed {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BackupReference>, ControllerError> {
        Ok(self
            .backups
            .lock()
            .ok()
            .and_then(|b| b.get(&key(namespace, name)).cloned()))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        if let Ok(mut backups) = self.backups.lock() {
            backups.remove(&key(namespace, name));
        }
        self.record(SeedEvent::DeletedBackupInfrastructure {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }
}

#[async_trait::async_trait]
impl SeedReader for FakeSeed {
    async fn statefulset(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ObservedWorkload>, ControllerError> {
        Ok(self.statefulsets.get(&key(namespace, name)).cloned())
    }

    async fn deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ObservedWorkload>, ControllerError> {
        Ok(self.deployments.get(&key(namespace, name)).cloned())
    }

    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, ControllerError> {
        Ok(self.secrets.get(&key(namespace, name)).cloned())
    }
}

impl SnapshotBackendFactory for FakeSeed {
    fn backend_for(
        &self,
        _reference: &BackupReference,
    ) -> Result<Arc<dyn SnapshotBackend>, ControllerError> {
        Ok(Arc::new(self.snapshots.clone()))
    }
}

#[async_trait::async_trait]
impl ShootStore for FakeSeed {
    async fn remove_operation_annotation(&self, shoot: &Shoot) -> Result<(), ControllerError> {
        self.record(SeedEvent::AnnotationRemoved {
            name: shoot.metadata.name.clone().unwrap_or_default(),
        });
        Ok(())
    }

    async fn patch_status(&self, _shoot: &Shoot, status: &ShootStatus) -> Result<(), ControllerError> {
        self.record(SeedEvent::StatusPatched {
            state: status.last_operation.as_ref().map(|op| op.state),
            observed_generation: status.observed_generation,
        });
        if let Ok(mut last) = self.last_status.lock() {
            *last = Some(status.clone());
        }
        Ok(())
    }
}

/// Gateways that all point at `seed`
pub fn gateways(seed: &Arc<FakeSeed>) -> SeedGateways {
    SeedGateways {
        deployments: Arc::clone(seed) as Arc<dyn DeploymentGateway>,
        readiness: Arc::clone(seed) as Arc<dyn ReadinessGate>,
        backups: Arc::clone(seed) as Arc<dyn BackupInfrastructureStore>,
        reader: Arc::clone(seed) as Arc<dyn SeedReader>,
        snapshots: Arc::clone(seed) as Arc<dyn SnapshotBackendFactory>,
        shoots: Arc::clone(seed) as Arc<dyn ShootStore>,
    }
}

/// Reconciler backed by `seed`
pub fn test_reconciler(seed: &Arc<FakeSeed>, config: ControllerConfig) -> Reconciler {
    let metrics = ShootMetrics::new().expect("metrics registry");
    Reconciler::new(gateways(seed), config, metrics)
}
