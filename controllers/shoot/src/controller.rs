//! Main controller implementation.
//!
//! Builds the Kubernetes client, the seed gateways and the reconciler, then
//! runs the Shoot watcher next to the probe/metrics server.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::ShootMetrics;
use crate::reconciler::Reconciler;
use crate::seed::KubeSeed;
use crate::server::{self, ProbeState};
use crate::watcher::Watcher;
use crds::Shoot;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for Shoot control planes.
#[derive(Debug)]
pub struct Controller {
    shoot_watcher: JoinHandle<Result<(), ControllerError>>,
    probe_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Shoot Controller");

        let kube_client = Client::try_default().await?;

        let shoot_api: Api<Shoot> = match config.watch_namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };

        let metrics = ShootMetrics::new()
            .map_err(|e| ControllerError::InvalidConfig(format!("metrics registry: {e}")))?;
        let probes = ProbeState::new(metrics.clone());
        let bind_address = config.metrics_bind_address;

        let reconciler = Arc::new(Reconciler::new(
            KubeSeed::new(kube_client).gateways(),
            config,
            metrics,
        ));
        let watcher = Watcher::new(reconciler, shoot_api);

        let probe_server = {
            let probes = probes.clone();
            tokio::spawn(async move { server::serve(bind_address, probes).await })
        };

        let shoot_watcher = tokio::spawn(async move {
            probes.set_ready();
            watcher.watch_shoots().await
        });

        Ok(Self {
            shoot_watcher,
            probe_server,
        })
    }

    /// Runs until either task finishes.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Shoot Controller running");

        tokio::select! {
            result = &mut self.shoot_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Shoot watcher panicked: {}", e)))??;
                self.probe_server.abort();
            }
            result = &mut self.probe_server => {
                result.map_err(|e| ControllerError::Watch(format!("probe server panicked: {}", e)))??;
            }
        }

        Ok(())
    }
}
