//! etcd orchestration.
//!
//! Deploys the `main` and `events` etcd clusters of a shoot and migrates
//! shoots that still reference a legacy BackupInfrastructure record to the
//! new backup location.

use super::{Reconciler, ShootTarget};
use crate::error::{ControllerError, StepContext};
use crate::gateway::BackupReference;
use crate::naming::backup_infrastructure_name;
use crate::reconciler::snapshot::latest_revision;
use crds::Shoot;
use k8s_openapi::api::core::v1::ResourceRequirements;
use serde::Serialize;
use snapstore_client::SnapstoreError;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Chart / component name of etcd releases
pub const ETCD_COMPONENT: &str = "etcd";

/// Container whose resources are owned by HVPA once the cluster exists
const ETCD_CONTAINER: &str = "etcd";

/// (pod annotation, secret name) pairs whose checksums roll the etcd pods
const CHECKSUM_SECRETS: &[(&str, &str)] = &[
    ("checksum/secret-etcd-ca", "ca-etcd"),
    ("checksum/secret-etcd-server-tls", "etcd-server-tls"),
    ("checksum/secret-etcd-client-tls", "etcd-client-tls"),
];

/// The two etcd clusters of a shoot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EtcdRole {
    /// All cluster data; durability critical
    Main,
    /// Event data only
    Events,
}

impl EtcdRole {
    /// Deployment order
    pub const ALL: [EtcdRole; 2] = [EtcdRole::Main, EtcdRole::Events];

    /// StatefulSet and release name
    pub fn name(self) -> &'static str {
        match self {
            EtcdRole::Main => "etcd-main",
            EtcdRole::Events => "etcd-events",
        }
    }
}

/// Metrics granularity exposed by etcd
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsLevel {
    /// Default metrics
    Basic,
    /// Including histograms
    Extensive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HvpaValues {
    pub enabled: bool,
}

/// Values shared by both roles
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtcdBaseValues {
    pub pod_annotations: BTreeMap<String, String>,
    pub hvpa: HvpaValues,
    pub storage_capacity: String,
}

/// Values of one role
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtcdValues {
    pub role: EtcdRole,
    pub replicas: i32,
    pub metrics: MetricsLevel,
    /// Refuse to serve until at least this revision has been restored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_below_revision: Option<i64>,
    /// Resources preserved from the running StatefulSet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etcd_resources: Option<ResourceRequirements>,
}

impl EtcdValues {
    fn for_role(role: EtcdRole) -> Self {
        Self {
            role,
            replicas: 1,
            metrics: match role {
                EtcdRole::Main => MetricsLevel::Extensive,
                EtcdRole::Events => MetricsLevel::Basic,
            },
            fail_below_revision: None,
            etcd_resources: None,
        }
    }
}

/// Inputs of one pass that are the same for both roles
#[derive(Debug)]
struct EtcdPlan<'a> {
    target: &'a ShootTarget<'a>,
    base: serde_json::Value,
    hibernated: bool,
    /// Latest revision in the legacy backup location (0 = nothing to migrate)
    last_snapshot_revision: i64,
    legacy: Option<BackupReference>,
}

impl Reconciler {
    /// Deploy or migrate both etcd clusters of `shoot`.
    ///
    /// Safe to call repeatedly: every deploy is a declarative upsert and the
    /// legacy record is only deleted after the migrated cluster proved ready.
    pub async fn reconcile_stateful_store(&self, shoot: &Shoot) -> Result<(), ControllerError> {
        let target = ShootTarget::from_shoot(shoot)?;
        let backup_name = backup_infrastructure_name(target.seed_namespace, target.uid);

        let legacy = self
            .seed
            .backups
            .get(target.project_namespace, &backup_name)
            .await
            .step("get backup infrastructure")?;

        let last_snapshot_revision = match &legacy {
            None => {
                debug!("{}: no backup infrastructure {}, nothing to migrate", target.key, backup_name);
                0
            }
            Some(reference) if reference.deleting => {
                debug!("{}: backup infrastructure {} is being deleted, already migrated", target.key, backup_name);
                0
            }
            Some(reference) => {
                info!(
                    "{}: backup infrastructure {} found, looking for latest snapshot revision",
                    target.key, backup_name
                );
                let revision = self
                    .last_snapshot_revision(reference)
                    .await
                    .step("latest snapshot revision")?;
                info!("{}: last snapshot revision on {} is {}", target.key, backup_name, revision);
                revision
            }
        };

        let base = serde_json::to_value(self.etcd_base_values(target.seed_namespace).await?)?;
        let plan = EtcdPlan {
            target: &target,
            base,
            hibernated: shoot.is_hibernated(),
            last_snapshot_revision,
            legacy,
        };

        for role in EtcdRole::ALL {
            self.deploy_etcd_role(role, &plan)
                .await
                .step(format!("deploy {}", role.name()))?;
        }
        Ok(())
    }

    async fn last_snapshot_revision(&self, reference: &BackupReference) -> Result<i64, ControllerError> {
        let unavailable = |source: SnapstoreError| ControllerError::BackendUnavailable {
            backup_infrastructure: reference.name.clone(),
            source,
        };
        let backend = self.seed.snapshots.backend_for(reference)?;
        latest_revision(backend.as_ref()).await.map_err(unavailable)
    }

    pub(crate) async fn etcd_base_values(&self, seed_namespace: &str) -> Result<EtcdBaseValues, ControllerError> {
        let pod_annotations = self
            .checksum_annotations(seed_namespace, CHECKSUM_SECRETS)
            .await?;

        Ok(EtcdBaseValues {
            pod_annotations,
            hvpa: HvpaValues {
                enabled: self.config.hvpa_enabled,
            },
            storage_capacity: self.config.etcd_storage_capacity.clone(),
        })
    }

    async fn deploy_etcd_role(&self, role: EtcdRole, plan: &EtcdPlan<'_>) -> Result<(), ControllerError> {
        let namespace = plan.target.seed_namespace;
        let observed = self.seed.reader.statefulset(namespace, role.name()).await?;

        let mut values = EtcdValues::for_role(role);
        if self.config.hvpa_enabled {
            values.etcd_resources = observed
                .as_ref()
                .and_then(|o| o.container_resources(ETCD_CONTAINER))
                .cloned();
        }

        let migrating = role == EtcdRole::Main && plan.last_snapshot_revision > 0;
        if migrating {
            values.fail_below_revision = Some(plan.last_snapshot_revision);
        }

        if plan.hibernated {
            if migrating {
                // Scale up once so that a snapshot lands in the new backup location.
                values.replicas = 1;
                self.apply_etcd(namespace, &plan.base, &values).await?;
                self.seed
                    .readiness
                    .wait_ready(
                        namespace,
                        role.name(),
                        values.replicas,
                        self.config.etcd_readiness_timeout,
                    )
                    .await?;

                if let Some(legacy) = &plan.legacy {
                    self.seed
                        .backups
                        .delete(&legacy.namespace, &legacy.name)
                        .await
                        .step("delete backup infrastructure")?;
                    self.metrics.legacy_migration_completed();
                    info!("{}: migrated etcd backups, deleted backup infrastructure {}", plan.target.key, legacy.name);
                }
                values.fail_below_revision = None;
            }

            values.replicas = observed.as_ref().and_then(|o| o.replicas).unwrap_or(0);
        }

        self.apply_etcd(namespace, &plan.base, &values).await
    }

    async fn apply_etcd(
        &self,
        namespace: &str,
        base: &serde_json::Value,
        values: &EtcdValues,
    ) -> Result<(), ControllerError> {
        debug!(
            "Applying {} in {} (replicas={}, failBelowRevision={:?})",
            values.role.name(),
            namespace,
            values.replicas,
            values.fail_below_revision
        );
        let overrides = serde_json::to_value(values)?;
        self.seed
            .deployments
            .apply(ETCD_COMPONENT, namespace, values.role.name(), base, &overrides)
            .await
    }
}
