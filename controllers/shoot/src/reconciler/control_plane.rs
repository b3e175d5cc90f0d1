//! kube-apiserver and kube-controller-manager deployment.
//!
//! Both run as Deployments in the seed namespace and are applied after etcd.

use super::resources::tier;
use super::{Reconciler, ShootTarget};
use crate::error::{ControllerError, StepContext};
use crate::gateway::ObservedWorkload;
use crds::Shoot;
use k8s_openapi::api::core::v1::ResourceRequirements;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

pub const KUBE_APISERVER: &str = "kube-apiserver";
pub const KUBE_CONTROLLER_MANAGER: &str = "kube-controller-manager";

const DEFAULT_MIN_REPLICAS: i32 = 1;
const DEFAULT_MAX_REPLICAS: i32 = 4;

const APISERVER_CHECKSUM_SECRETS: &[(&str, &str)] = &[
    ("checksum/secret-ca", "ca"),
    ("checksum/secret-kube-apiserver", "kube-apiserver"),
    ("checksum/secret-service-account-key", "service-account-key"),
    ("checksum/secret-etcd-ca", "ca-etcd"),
    ("checksum/secret-etcd-client-tls", "etcd-client-tls"),
];

const KCM_CHECKSUM_SECRETS: &[(&str, &str)] = &[
    ("checksum/secret-ca", "ca"),
    ("checksum/secret-kube-controller-manager", "kube-controller-manager"),
    ("checksum/secret-service-account-key", "service-account-key"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeApiServerValues {
    /// Unset lets the chart default apply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    pub min_replicas: i32,
    pub max_replicas: i32,
    /// Horizontal scaling stops here; vertical scaling takes over
    pub last_replica_count_for_hpa: i32,
    pub hvpa: super::etcd::HvpaValues,
    pub api_server_resources: ResourceRequirements,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_seed_resources: Option<ResourceRequirements>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub black_box_exporter_resources: Option<ResourceRequirements>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, bool>,
    pub pod_annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeControllerManagerValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    pub cluster_name: String,
    pub object_count: u32,
    #[serde(rename = "nodeCIDRMaskSize", skip_serializing_if = "Option::is_none")]
    pub node_cidr_mask_size: Option<i32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, bool>,
    pub pod_annotations: BTreeMap<String, String>,
}

/// kube-apiserver values from the shoot and the running deployment.
pub fn kube_apiserver_values(
    shoot: &Shoot,
    observed: Option<&ObservedWorkload>,
    hvpa_enabled: bool,
) -> Result<KubeApiServerValues, ControllerError> {
    let config = shoot.spec.kubernetes.kube_api_server.as_ref();
    let autoscaling = config.and_then(|c| c.autoscaling.as_ref());
    let min_replicas = autoscaling
        .and_then(|a| a.min_replicas)
        .unwrap_or(DEFAULT_MIN_REPLICAS);
    let max_replicas = autoscaling
        .and_then(|a| a.max_replicas)
        .unwrap_or(DEFAULT_MAX_REPLICAS);

    if min_replicas < 1 {
        return Err(ControllerError::InvalidConfig(format!(
            "kube-apiserver minReplicas must be at least 1, got {min_replicas}"
        )));
    }
    if max_replicas < min_replicas {
        return Err(ControllerError::InvalidConfig(format!(
            "kube-apiserver maxReplicas {max_replicas} is lower than minReplicas {min_replicas}"
        )));
    }

    // The HPA owns the replica count once the deployment is running.
    let current = observed.and_then(|o| o.replicas);
    let replicas = match current {
        Some(r) if r > 0 => Some(r),
        _ if shoot.is_hibernated() => Some(0),
        _ => None,
    };

    let last_replica_count_for_hpa = if max_replicas > min_replicas {
        max_replicas - 1
    } else {
        min_replicas
    };

    let mut values = KubeApiServerValues {
        replicas,
        min_replicas,
        max_replicas,
        last_replica_count_for_hpa,
        hvpa: super::etcd::HvpaValues {
            enabled: hvpa_enabled,
        },
        api_server_resources: tier(shoot.node_count(), hvpa_enabled).into_requirements(),
        vpn_seed_resources: None,
        black_box_exporter_resources: None,
        feature_gates: config.map(|c| c.feature_gates.clone()).unwrap_or_default(),
        pod_annotations: BTreeMap::new(),
    };

    if hvpa_enabled {
        if let Some(observed) = observed {
            if let Some(resources) = observed.container_resources(KUBE_APISERVER) {
                values.api_server_resources = resources.clone();
            }
            values.vpn_seed_resources = observed.container_resources("vpn-seed").cloned();
            values.black_box_exporter_resources =
                observed.container_resources("blackbox-exporter").cloned();
        }
    }

    Ok(values)
}

/// kube-controller-manager values. A hibernated shoot keeps the current replica count.
pub fn kube_controller_manager_values(
    shoot: &Shoot,
    seed_namespace: &str,
    observed: Option<&ObservedWorkload>,
) -> KubeControllerManagerValues {
    let config = shoot.spec.kubernetes.kube_controller_manager.as_ref();
    KubeControllerManagerValues {
        replicas: shoot
            .is_hibernated()
            .then(|| observed.and_then(|o| o.replicas).unwrap_or(0)),
        cluster_name: seed_namespace.to_string(),
        object_count: shoot.node_count(),
        node_cidr_mask_size: config.and_then(|c| c.node_cidr_mask_size),
        feature_gates: config.map(|c| c.feature_gates.clone()).unwrap_or_default(),
        pod_annotations: BTreeMap::new(),
    }
}

/// Values shared by the control-plane components of a shoot
fn shoot_base_values(shoot: &Shoot) -> serde_json::Value {
    let networks = &shoot.spec.networking;
    serde_json::json!({
        "kubernetesVersion": shoot.spec.kubernetes.version,
        "shootNetworks": {
            "node": networks.nodes,
            "pod": networks.pods,
            "service": networks.services,
        },
    })
}

impl Reconciler {
    /// Deploy kube-apiserver sized for the shoot's node count.
    pub async fn deploy_kube_apiserver(&self, shoot: &Shoot) -> Result<(), ControllerError> {
        let target = ShootTarget::from_shoot(shoot)?;
        let observed = self
            .seed
            .reader
            .deployment(target.seed_namespace, KUBE_APISERVER)
            .await
            .step("get kube-apiserver deployment")?;

        let mut values = kube_apiserver_values(shoot, observed.as_ref(), self.config.hvpa_enabled)?;
        values.pod_annotations = self
            .checksum_annotations(target.seed_namespace, APISERVER_CHECKSUM_SECRETS)
            .await?;
        debug!(
            "{}: kube-apiserver replicas={:?} min={} max={}",
            target.key, values.replicas, values.min_replicas, values.max_replicas
        );

        self.seed
            .deployments
            .apply(
                KUBE_APISERVER,
                target.seed_namespace,
                KUBE_APISERVER,
                &shoot_base_values(shoot),
                &serde_json::to_value(&values)?,
            )
            .await
    }

    /// Deploy kube-controller-manager.
    pub async fn deploy_kube_controller_manager(&self, shoot: &Shoot) -> Result<(), ControllerError> {
        let target = ShootTarget::from_shoot(shoot)?;
        let observed = if shoot.is_hibernated() {
            self.seed
                .reader
                .deployment(target.seed_namespace, KUBE_CONTROLLER_MANAGER)
                .await
                .step("get kube-controller-manager deployment")?
        } else {
            None
        };

        let mut values =
            kube_controller_manager_values(shoot, target.seed_namespace, observed.as_ref());
        values.pod_annotations = self
            .checksum_annotations(target.seed_namespace, KCM_CHECKSUM_SECRETS)
            .await?;

        self.seed
            .deployments
            .apply(
                KUBE_CONTROLLER_MANAGER,
                target.seed_namespace,
                KUBE_CONTROLLER_MANAGER,
                &shoot_base_values(shoot),
                &serde_json::to_value(&values)?,
            )
            .await
    }
}
