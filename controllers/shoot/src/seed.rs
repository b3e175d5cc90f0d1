//! Kubernetes implementations of the seed gateways.
//!
//! Component releases are written with server-side apply so that repeated
//! passes converge on the same object. Shoot writes are merge patches; the
//! annotation removal carries the observed resourceVersion and fails on
//! conflict.

use crate::error::ControllerError;
use crate::gateway::{
    BackupInfrastructureStore, BackupReference, DeploymentGateway, ObservedWorkload,
    ReadinessGate, SeedGateways, SeedReader, ShootStore, SnapshotBackendFactory, merge_values,
};
use crds::{
    BackupInfrastructure, ComponentRelease, ComponentReleaseSpec, FIELD_MANAGER,
    OPERATION_ANNOTATION, Shoot, ShootStatus,
};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{PodTemplateSpec, Secret};
use kube::api::{DeleteParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use snapstore_client::{SnapshotBackend, SnapstoreClient};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Seed cluster reached through the Kubernetes API.
#[derive(Clone)]
pub struct KubeSeed {
    client: Client,
}

impl std::fmt::Debug for KubeSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSeed").finish_non_exhaustive()
    }
}

impl KubeSeed {
    /// Creates the seed gateways for `client`.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// All gateways backed by this seed
    pub fn gateways(self) -> SeedGateways {
        let seed = Arc::new(self);
        SeedGateways {
            deployments: Arc::clone(&seed) as Arc<dyn DeploymentGateway>,
            readiness: Arc::clone(&seed) as Arc<dyn ReadinessGate>,
            backups: Arc::clone(&seed) as Arc<dyn BackupInfrastructureStore>,
            reader: Arc::clone(&seed) as Arc<dyn SeedReader>,
            snapshots: Arc::clone(&seed) as Arc<dyn SnapshotBackendFactory>,
            shoots: seed as Arc<dyn ShootStore>,
        }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn shoot_api(&self, shoot: &Shoot) -> Result<Api<Shoot>, ControllerError> {
        let namespace = shoot.namespace().ok_or_else(|| {
            ControllerError::InvalidConfig(format!("shoot {} has no namespace", shoot.name_any()))
        })?;
        Ok(self.api(&namespace))
    }
}

fn is_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == 404)
}

/// Resources of every container in a pod template that declares any
fn container_resources(template: Option<&PodTemplateSpec>) -> BTreeMap<String, k8s_openapi::api::core::v1::ResourceRequirements> {
    template
        .and_then(|t| t.spec.as_ref())
        .map(|spec| {
            spec.containers
                .iter()
                .filter_map(|c| c.resources.clone().map(|r| (c.name.clone(), r)))
                .collect()
        })
        .unwrap_or_default()
}

/// Ready once the StatefulSet asks for `replicas` and that many report ready
/// for the current generation.
///
/// A StatefulSet still scaled to a different count is not ready, so a wait
/// right after scaling up cannot pass on the old, scaled-down state.
pub fn is_statefulset_ready(statefulset: Option<&StatefulSet>, replicas: i32) -> bool {
    let Some(statefulset) = statefulset else {
        return false;
    };
    let desired = statefulset
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    if desired != replicas {
        return false;
    }
    let Some(status) = statefulset.status.as_ref() else {
        return false;
    };
    let current_generation = status.observed_generation >= statefulset.metadata.generation;
    current_generation && status.ready_replicas.unwrap_or(0) >= desired
}

#[async_trait::async_trait]
impl DeploymentGateway for KubeSeed {
    async fn apply(
        &self,
        component: &str,
        namespace: &str,
        release: &str,
        base: &serde_json::Value,
        overrides: &serde_json::Value,
    ) -> Result<(), ControllerError> {
        let api: Api<ComponentRelease> = self.api(namespace);
        let object = ComponentRelease::new(
            release,
            ComponentReleaseSpec {
                component: component.to_string(),
                values: merge_values(base, overrides),
            },
        );

        api.patch(
            release,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&object),
        )
        .await?;
        debug!("Applied {} release {}/{}", component, namespace, release);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReadinessGate for KubeSeed {
    async fn wait_ready(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
        timeout: Duration,
    ) -> Result<(), ControllerError> {
        let api: Api<StatefulSet> = self.api(namespace);
        info!(
            "Waiting up to {}s for {} ready replicas of {}/{}",
            timeout.as_secs(),
            replicas,
            namespace,
            name
        );

        let ready = kube_runtime::wait::await_condition(api, name, move |sts: Option<&StatefulSet>| {
            is_statefulset_ready(sts, replicas)
        });
        match tokio::time::timeout(timeout, ready).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ControllerError::Watch(format!(
                "waiting for {namespace}/{name}: {e}"
            ))),
            Err(_) => Err(ControllerError::ReadinessTimeout {
                namespace: namespace.to_string(),
                name: name.to_string(),
                timeout,
            }),
        }
    }
}

#[async_trait::async_trait]
impl BackupInfrastructureStore for KubeSeed {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BackupReference>, ControllerError> {
        let api: Api<BackupInfrastructure> = self.api(namespace);
        Ok(api.get_opt(name).await?.map(|record| BackupReference {
            namespace: namespace.to_string(),
            name: name.to_string(),
            deleting: record.metadata.deletion_timestamp.is_some(),
            snapstore_url: record.spec.snapstore_url,
        }))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        let api: Api<BackupInfrastructure> = self.api(namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!("BackupInfrastructure {}/{} already gone", namespace, name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait::async_trait]
impl SeedReader for KubeSeed {
    async fn statefulset(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ObservedWorkload>, ControllerError> {
        let api: Api<StatefulSet> = self.api(namespace);
        Ok(api.get_opt(name).await?.map(|sts| {
            let spec = sts.spec.as_ref();
            ObservedWorkload {
                replicas: spec.and_then(|s| s.replicas),
                containers: container_resources(spec.map(|s| &s.template)),
            }
        }))
    }

    async fn deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ObservedWorkload>, ControllerError> {
        let api: Api<Deployment> = self.api(namespace);
        Ok(api.get_opt(name).await?.map(|deployment| {
            let spec = deployment.spec.as_ref();
            ObservedWorkload {
                replicas: spec.and_then(|s| s.replicas),
                containers: container_resources(spec.map(|s| &s.template)),
            }
        }))
    }

    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, ControllerError> {
        let api: Api<Secret> = self.api(namespace);
        Ok(api.get_opt(name).await?.map(|secret| {
            secret
                .data
                .unwrap_or_default()
                .into_iter()
                .map(|(key, value)| (key, value.0))
                .collect()
        }))
    }
}

impl SnapshotBackendFactory for KubeSeed {
    fn backend_for(
        &self,
        reference: &BackupReference,
    ) -> Result<Arc<dyn SnapshotBackend>, ControllerError> {
        let client = SnapstoreClient::new(reference.snapstore_url.clone()).map_err(|source| {
            ControllerError::BackendUnavailable {
                backup_infrastructure: reference.name.clone(),
                source,
            }
        })?;
        Ok(Arc::new(client))
    }
}

#[async_trait::async_trait]
impl ShootStore for KubeSeed {
    async fn remove_operation_annotation(&self, shoot: &Shoot) -> Result<(), ControllerError> {
        let api = self.shoot_api(shoot)?;
        let patch = json!({
            "metadata": {
                "resourceVersion": shoot.resource_version(),
                "annotations": { OPERATION_ANNOTATION: null },
            }
        });
        api.patch(&shoot.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn patch_status(&self, shoot: &Shoot, status: &ShootStatus) -> Result<(), ControllerError> {
        let api = self.shoot_api(shoot)?;
        let patch = json!({ "status": status });
        api.patch_status(&shoot.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}
