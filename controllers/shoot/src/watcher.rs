//! Kubernetes resource watchers.
//!
//! Shoots are watched through `kube_runtime::Controller`, which handles
//! reconnection, per-object queueing and requeue scheduling. Scheduling
//! decisions (backoff, sync period, generation policy) are taken by the
//! reconciler and returned as an `Action`.

use crate::error::ControllerError;
use crate::reconciler::{Reconciler, shoot_key};
use crds::Shoot;
use futures::StreamExt;
use kube::Api;
use kube_runtime::{
    Controller, watcher,
    controller::{Action, Config as RuntimeConfig},
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

type ReconcileFuture = Pin<Box<dyn Future<Output = Result<Action, ControllerError>> + Send>>;

/// Generic watcher helper on top of `kube_runtime::Controller`.
///
/// Runs until the watch stream ends. The error policy asks the reconciler for
/// the requeue delay so that backoff state stays in one place.
async fn watch_resource<K, F>(
    api: Api<K>,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    key_fn: fn(&K) -> String,
    resource_name: &'static str,
) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default + std::cmp::Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    F: Fn(Arc<Reconciler>, Arc<K>) -> ReconcileFuture + Send + Sync + Clone + 'static,
{
    info!("Starting {} watcher", resource_name);

    let error_policy = move |obj: Arc<K>, error: &ControllerError, ctx: Arc<Reconciler>| {
        let key = key_fn(&obj);
        let action = ctx.error_action(&key, error);
        error!("Reconciliation error for {} {}: {} (next: {:?})", resource_name, key, error, action);
        action
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            debug!("Reconciling {} {}", resource_name, key_fn(&obj));
            reconcile_fn(ctx, obj).await
        }
    };

    // Debounce batches the status writes of a pass into one event.
    let runtime_config = RuntimeConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(3);

    Controller::new(api, watcher::Config::default())
        .with_config(runtime_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            match res {
                Ok((object, action)) => debug!("{} {} reconciled: {:?}", resource_name, object.name, action),
                Err(e) => debug!("Controller error for {}: {}", resource_name, e),
            }
        })
        .await;

    info!("{} watcher stopped", resource_name);
    Ok(())
}

/// Watches Shoot resources for changes.
#[derive(Debug)]
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    shoot_api: Api<Shoot>,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(reconciler: Arc<Reconciler>, shoot_api: Api<Shoot>) -> Self {
        Self {
            reconciler,
            shoot_api,
        }
    }

    /// Starts watching Shoot resources.
    pub async fn watch_shoots(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.shoot_api.clone(),
            Arc::clone(&self.reconciler),
            |reconciler, shoot| Box::pin(async move { reconciler.reconcile_shoot(&shoot).await }),
            shoot_key,
            "Shoot",
        )
        .await
    }
}
