//! Shoot Controller
//!
//! Reconciles the control planes of Shoot clusters hosted in a seed:
//! - decides when a shoot needs a new reconciliation generation
//! - deploys etcd, kube-apiserver and kube-controller-manager
//! - migrates etcd backups away from legacy BackupInfrastructure records

mod backoff;
mod config;
mod controller;
mod error;
mod gateway;
mod metrics;
mod naming;
mod policy;
mod reconciler;
mod seed;
mod server;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        info!("rustls crypto provider already installed");
    }

    info!("Starting Shoot Controller {}", env!("CARGO_PKG_VERSION"));

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  Namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  HVPA enabled: {}", config.hvpa_enabled);
    info!("  etcd storage capacity: {}", config.etcd_storage_capacity);
    info!("  Minimum sync period: {}s", config.min_sync_period.as_secs());
    info!("  Metrics address: {}", config.metrics_bind_address);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
