//! Shoot reconciliation pass.
//!
//! Evaluates the generation policy against the previously observed version,
//! consumes operation annotations, deploys etcd, kube-apiserver and
//! kube-controller-manager, and records the outcome in the shoot status.

use super::{Reconciler, shoot_key};
use crate::error::{ControllerError, StepContext};
use crate::policy::{
    decide_initial, decide_observed, is_deletion_scheduled,
    is_observed_at_latest_generation_and_succeeded, is_shoot_failed, should_ignore_shoot,
    sync_period_of_shoot,
};
use crds::{LastOperation, LastOperationState, LastOperationType, Shoot, ShootStatus};
use kube_runtime::controller::Action;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

impl Reconciler {
    /// Run one reconciliation pass for `shoot`.
    pub async fn reconcile_shoot(&self, shoot: &Shoot) -> Result<Action, ControllerError> {
        let key = shoot_key(shoot);
        let respect = self.config.respect_sync_period_overwrite;
        let sync_period = sync_period_of_shoot(respect, self.config.min_sync_period, shoot);

        if should_ignore_shoot(respect, shoot) {
            info!("{}: ignore annotation set, skipping", key);
            return Ok(Action::await_change());
        }

        let request = match self.remember(&key, shoot) {
            Some(previous) => decide_observed(&previous, shoot),
            None => decide_initial(shoot),
        };
        if let Some(reason) = request.reason {
            info!("{}: new generation required ({})", key, reason.as_str());
            self.metrics.generation_bumped(reason.as_str());
        }

        // User-triggered generations skip the error backoff.
        if !request.must_increment_generation {
            match self.pending_retry(&key) {
                Some(wait) if !wait.is_zero() => {
                    debug!("{}: retry in {}s", key, wait.as_secs());
                    return Ok(Action::requeue(wait));
                }
                Some(_) => {}
                None if is_observed_at_latest_generation_and_succeeded(shoot) => {
                    debug!("{}: up to date, next sync in {}s", key, sync_period.as_secs());
                    return Ok(Action::requeue(sync_period));
                }
                None if is_shoot_failed(shoot, &self.config.controller_version) => {
                    info!("{}: failed at latest generation, waiting for retry annotation", key);
                    return Ok(Action::await_change());
                }
                None if is_deletion_scheduled(shoot) => {
                    debug!("{}: deletion already scheduled", key);
                    return Ok(Action::await_change());
                }
                None => {}
            }
        }

        if let Some(operation) = request.consumed_annotation {
            self.seed
                .shoots
                .remove_operation_annotation(shoot)
                .await
                .step(format!("remove operation annotation {operation}"))?;
            info!("{}: consumed operation annotation {}", key, operation);
        }

        if shoot.metadata.deletion_timestamp.is_some() {
            let status = self.status_for(
                shoot,
                LastOperationType::Delete,
                LastOperationState::Pending,
                "Deletion of the shoot control plane scheduled".to_string(),
                current_observed_generation(shoot),
            );
            self.seed.shoots.patch_status(shoot, &status).await.step("update status")?;
            self.record_success(&key);
            info!("{}: deletion scheduled", key);
            return Ok(Action::await_change());
        }

        let operation_type = if shoot.last_operation().is_none() {
            LastOperationType::Create
        } else {
            LastOperationType::Reconcile
        };
        let processing = self.status_for(
            shoot,
            operation_type,
            LastOperationState::Processing,
            "Reconciling the shoot control plane".to_string(),
            current_observed_generation(shoot),
        );
        self.seed.shoots.patch_status(shoot, &processing).await.step("update status")?;

        let started = Instant::now();
        let result = self.deploy_control_plane(shoot).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(()) => {
                self.record_success(&key);
                self.metrics.reconciled("success", elapsed);

                let mut status = self.status_for(
                    shoot,
                    operation_type,
                    LastOperationState::Succeeded,
                    "Shoot control plane reconciled".to_string(),
                    shoot.generation(),
                );
                status.hibernated = shoot.is_hibernated();
                self.seed.shoots.patch_status(shoot, &status).await.step("update status")?;

                info!("{}: reconciled in {:.1}s", key, elapsed);
                Ok(Action::requeue(sync_period))
            }
            Err(e) => {
                self.metrics.reconciled("failure", elapsed);

                // Retryable failures keep the observed generation so the pass is repeated.
                let observed_generation = if e.is_retryable() {
                    self.record_failure(&key);
                    current_observed_generation(shoot)
                } else {
                    shoot.generation()
                };
                error!(
                    "{}: reconciliation failed ({} consecutive): {}",
                    key,
                    self.error_count(&key),
                    e
                );

                let status = self.status_for(
                    shoot,
                    operation_type,
                    LastOperationState::Failed,
                    e.to_string(),
                    observed_generation,
                );
                if let Err(patch_error) = self.seed.shoots.patch_status(shoot, &status).await {
                    warn!("{}: failed to record failure in status: {}", key, patch_error);
                }
                Err(e)
            }
        }
    }

    /// etcd, then kube-apiserver, then kube-controller-manager.
    pub(crate) async fn deploy_control_plane(&self, shoot: &Shoot) -> Result<(), ControllerError> {
        self.reconcile_stateful_store(shoot).await.step("etcd")?;
        self.deploy_kube_apiserver(shoot).await.step("kube-apiserver")?;
        self.deploy_kube_controller_manager(shoot)
            .await
            .step("kube-controller-manager")?;
        Ok(())
    }

    /// Requeue decision after a failed pass.
    pub fn error_action(&self, key: &str, error: &ControllerError) -> Action {
        if !error.is_retryable() {
            return Action::await_change();
        }
        match self.pending_retry(key) {
            Some(wait) if !wait.is_zero() => Action::requeue(wait),
            _ => Action::requeue(Duration::from_secs(60)),
        }
    }

    fn status_for(
        &self,
        shoot: &Shoot,
        type_: LastOperationType,
        state: LastOperationState,
        description: String,
        observed_generation: i64,
    ) -> ShootStatus {
        let mut status = shoot.status.clone().unwrap_or_default();
        status.last_operation = Some(LastOperation {
            type_,
            state,
            description,
            progress: if state == LastOperationState::Succeeded { 100 } else { 0 },
            last_update_time: Some(chrono::Utc::now()),
        });
        status.observed_generation = observed_generation;
        status.controller_version = Some(self.config.controller_version.clone());
        status
    }
}

fn current_observed_generation(shoot: &Shoot) -> i64 {
    shoot.status.as_ref().map_or(0, |s| s.observed_generation)
}
