//! Shoot CRD
//!
//! A Shoot is a user-owned Kubernetes cluster whose control plane (etcd,
//! kube-apiserver, kube-controller-manager) runs inside a seed namespace.

use crate::constants::{OPERATION_ANNOTATION, PURPOSE_ANNOTATION};
use crate::operation::ShootOperation;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "shootops.microscaler.io",
    version = "v1alpha1",
    kind = "Shoot",
    namespaced,
    status = "ShootStatus",
    shortname = "shoot",
    printcolumn = r#"{"name":"Seed","type":"string","jsonPath":".spec.seedName"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.kubernetes.version"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.lastOperation.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ShootSpec {
    /// Kubernetes version and component configuration
    pub kubernetes: KubernetesConfig,

    /// Network ranges of the cluster
    #[serde(default)]
    pub networking: Networking,

    /// Hibernation settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hibernation: Option<Hibernation>,

    /// Worker pools
    #[serde(default)]
    pub workers: Vec<Worker>,

    /// Maintenance window and auto-update settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<Maintenance>,

    /// Seed cluster hosting the control plane
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_name: Option<String>,

    /// Infrastructure provider
    #[serde(default)]
    pub provider: Provider,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesConfig {
    /// Kubernetes version (e.g. "1.30.2")
    pub version: String,

    /// kube-apiserver configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_api_server: Option<KubeApiServerConfig>,

    /// kube-controller-manager configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_controller_manager: Option<KubeControllerManagerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct KubeApiServerConfig {
    /// Horizontal autoscaling bounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<ApiServerAutoscaling>,

    /// Feature gates passed to kube-apiserver
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerAutoscaling {
    /// Minimum replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i32>,

    /// Maximum replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct KubeControllerManagerConfig {
    /// Mask size of the per-node pod CIDR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_cidr_mask_size: Option<i32>,

    /// Feature gates passed to kube-controller-manager
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Networking {
    /// Node CIDR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<String>,

    /// Pod CIDR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pods: Option<String>,

    /// Service CIDR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Hibernation {
    /// Whether the cluster should be hibernated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    /// Pool name
    pub name: String,

    /// Machine type of the pool
    #[serde(default)]
    pub machine_type: String,

    /// Minimum number of nodes
    #[serde(default)]
    pub minimum: u32,

    /// Maximum number of nodes
    #[serde(default)]
    pub maximum: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Maintenance {
    /// Daily maintenance window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<MaintenanceTimeWindow>,

    /// Automatic Kubernetes patch version updates
    #[serde(default)]
    pub auto_update_kubernetes_version: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceTimeWindow {
    /// Begin of the window (e.g. "220000+0100")
    pub begin: String,

    /// End of the window
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    /// Provider type (aws, gcp, openstack, ...)
    #[serde(rename = "type", default)]
    pub type_: String,

    /// Region of the cluster
    #[serde(default)]
    pub region: String,

    /// Availability zones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ShootStatus {
    /// Most recent generation observed and processed by the controller
    #[serde(default)]
    pub observed_generation: i64,

    /// Outcome of the most recent operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,

    /// Version of the controller that last reconciled the shoot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_version: Option<String>,

    /// Seed namespace hosting the control plane
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_id: Option<String>,

    /// Stable unique identifier of the shoot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Whether the control plane is currently scaled down
    #[serde(default)]
    pub hibernated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastOperation {
    /// Kind of operation
    #[serde(rename = "type")]
    pub type_: LastOperationType,

    /// State of the operation
    pub state: LastOperationState,

    /// Human readable description
    #[serde(default)]
    pub description: String,

    /// Progress in percent
    #[serde(default)]
    pub progress: i32,

    /// Time of the last update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
/// Kind of the last operation
#[serde(rename_all = "PascalCase")]
pub enum LastOperationType {
    /// Initial creation
    #[serde(alias = "create")]
    Create,

    /// Reconciliation of an existing shoot
    #[serde(alias = "reconcile")]
    Reconcile,

    /// Deletion
    #[serde(alias = "delete")]
    Delete,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
/// State of the last operation
///
/// Serializes as PascalCase but also accepts lowercase values.
#[serde(rename_all = "PascalCase")]
pub enum LastOperationState {
    /// Waiting to be processed
    #[default]
    #[serde(alias = "pending")]
    Pending,

    /// In progress
    #[serde(alias = "processing")]
    Processing,

    /// Finished successfully
    #[serde(alias = "succeeded")]
    Succeeded,

    /// Finished with an error
    #[serde(alias = "failed")]
    Failed,
}

impl Shoot {
    /// Whether hibernation is requested in the spec
    pub fn is_hibernated(&self) -> bool {
        self.spec
            .hibernation
            .as_ref()
            .and_then(|h| h.enabled)
            .unwrap_or(false)
    }

    /// Maximum node count across all worker pools
    pub fn node_count(&self) -> u32 {
        self.spec
            .workers
            .iter()
            .fold(0u32, |acc, w| acc.saturating_add(w.maximum))
    }

    /// Raw value of the operation annotation
    pub fn operation_annotation(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(OPERATION_ANNOTATION))
            .map(String::as_str)
    }

    /// Parsed operation command. Unknown values are treated as absent.
    pub fn operation(&self) -> Option<ShootOperation> {
        self.operation_annotation().and_then(|v| v.parse().ok())
    }

    /// Purpose annotation
    pub fn purpose(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(PURPOSE_ANNOTATION))
            .map(String::as_str)
    }

    /// Last operation recorded in status
    pub fn last_operation(&self) -> Option<&LastOperation> {
        self.status.as_ref().and_then(|s| s.last_operation.as_ref())
    }

    /// Seed namespace hosting the control plane
    pub fn seed_namespace(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.technical_id.as_deref())
    }

    /// Stable shoot UID, taken from status and falling back to object metadata
    pub fn shoot_uid(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.uid.as_deref())
            .or(self.metadata.uid.as_deref())
    }

    /// Generation recorded in object metadata (0 if unset)
    pub fn generation(&self) -> i64 {
        self.metadata.generation.unwrap_or(0)
    }
}
