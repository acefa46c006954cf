//! Deployment supervision.
//!
//! One monitor task per in-flight deployment: it follows the workflow run
//! to a terminal state, verifies the deployed app's health, and commits
//! the final Shop/Deployment state. Supervision is registered through a
//! persisted lease (deployment id + owner + heartbeat) so a restarted
//! process can resume orphaned deployments and duplicate registration is a
//! no-op.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use shopforge_core::{
    AuditRecord, DeploymentEvent, DeploymentId, DeploymentStatus, Shop, ShopStatus,
};
use shopforge_store::Store;

use crate::notify::Notifier;
use crate::providers::{monitor_run, ComputeProvider, RunOutcome, WorkflowProvider};

/// Monitor timing and identity configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Identifier of this process for lease ownership.
    pub owner: String,

    /// Fixed workflow poll interval.
    pub poll_interval: Duration,

    /// Wall-clock ceiling on workflow supervision.
    pub max_duration: Duration,

    /// Health verification attempts after workflow success.
    pub health_attempts: u32,

    /// Spacing between health verification attempts.
    pub health_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            owner: format!("monitor-{}", uuid::Uuid::new_v4()),
            poll_interval: Duration::from_secs(30),
            max_duration: Duration::from_secs(45 * 60),
            health_attempts: 5,
            health_interval: Duration::from_secs(10),
        }
    }
}

/// Supervises deployments from workflow dispatch to terminal commit.
#[derive(Clone)]
pub struct DeploymentMonitor {
    store: Arc<dyn Store>,
    compute: Option<Arc<dyn ComputeProvider>>,
    workflow: Option<Arc<dyn WorkflowProvider>>,
    notifier: Option<Arc<Notifier>>,
    config: MonitorConfig,
}

impl DeploymentMonitor {
    /// Create a monitor with injected dependencies.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        compute: Option<Arc<dyn ComputeProvider>>,
        workflow: Option<Arc<dyn WorkflowProvider>>,
        notifier: Option<Arc<Notifier>>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            compute,
            workflow,
            notifier,
            config,
        }
    }

    /// Spawn supervision for a deployment as an independent task.
    ///
    /// The caller (the worker) returns immediately; it never waits for
    /// deployment completion.
    pub fn spawn_supervision(&self, deployment_id: DeploymentId) {
        let this = self.clone();
        tokio::spawn(async move {
            this.supervise(deployment_id).await;
        });
    }

    /// Re-attach supervision to deployments left running by a previous
    /// process. Returns how many were resumed.
    pub fn resume_orphaned(&self) -> usize {
        let running = match self.store.list_running_deployments() {
            Ok(deployments) => deployments,
            Err(e) => {
                error!(error = %e, "failed to scan for orphaned deployments");
                return 0;
            }
        };

        let mut resumed = 0;
        for deployment in running {
            let now = Utc::now();
            let fresh_elsewhere = match self.store.get_lease(&deployment.id) {
                Ok(Some(lease)) => lease.owner != self.config.owner && !lease.is_stale(now),
                Ok(None) => false,
                Err(e) => {
                    warn!(deployment_id = %deployment.id, error = %e, "lease lookup failed");
                    continue;
                }
            };
            if fresh_elsewhere {
                continue;
            }

            info!(deployment_id = %deployment.id, "resuming orphaned deployment supervision");
            self.spawn_supervision(deployment.id);
            resumed += 1;
        }
        resumed
    }

    /// Supervise one deployment to its terminal state.
    ///
    /// Acquires the supervision lease first; if another live process holds
    /// it, this is a duplicate registration and returns immediately. The
    /// lease is released on every exit path, and any supervision error is
    /// converted into a `failed` terminal commit rather than a stuck
    /// deployment.
    pub async fn supervise(&self, deployment_id: DeploymentId) {
        match self.store.try_acquire_lease(&deployment_id, &self.config.owner) {
            Ok(true) => {}
            Ok(false) => {
                debug!(deployment_id = %deployment_id, "deployment already supervised");
                return;
            }
            Err(e) => {
                error!(deployment_id = %deployment_id, error = %e, "lease acquisition failed");
                return;
            }
        }

        // Keep the lease fresh while supervision runs.
        let heartbeat = {
            let store = self.store.clone();
            let owner = self.config.owner.clone();
            let interval = self.config.poll_interval;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    if let Err(e) = store.heartbeat_lease(&deployment_id, &owner) {
                        warn!(deployment_id = %deployment_id, error = %e, "lease heartbeat failed");
                    }
                }
            })
        };

        if let Err(message) = self.supervise_inner(deployment_id).await {
            error!(deployment_id = %deployment_id, error = %message, "deployment supervision failed");
            self.commit_terminal(deployment_id, false, &message);
        }

        heartbeat.abort();
        if let Err(e) = self.store.release_lease(&deployment_id, &self.config.owner) {
            warn!(deployment_id = %deployment_id, error = %e, "lease release failed");
        }
    }

    async fn supervise_inner(&self, deployment_id: DeploymentId) -> Result<(), String> {
        let workflow = self
            .workflow
            .clone()
            .ok_or_else(|| "workflow provider not configured".to_string())?;

        let mut deployment = self
            .store
            .get_deployment(&deployment_id)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "deployment record missing".to_string())?;

        if deployment.is_terminal() {
            debug!(deployment_id = %deployment_id, "deployment already terminal");
            return Ok(());
        }

        let run_id = deployment
            .external_run_id
            .clone()
            .ok_or_else(|| "deployment has no workflow run id".to_string())?;

        let shop = self
            .store
            .get_shop(&deployment.shop_id)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "shop record missing".to_string())?;

        let store = &self.store;
        let outcome = monitor_run(
            workflow.as_ref(),
            &run_id,
            self.config.max_duration,
            self.config.poll_interval,
            |status| {
                deployment.push_event(DeploymentEvent::WorkflowStatus {
                    status: status.raw_status.clone(),
                    at: Utc::now(),
                });
                if let Err(e) = store.update_deployment(&deployment) {
                    warn!(deployment_id = %deployment_id, error = %e, "failed to persist workflow status");
                }
            },
        )
        .await;

        match outcome {
            RunOutcome::TimedOut => {
                let minutes = self.config.max_duration.as_secs() / 60;
                self.commit_terminal(
                    deployment_id,
                    false,
                    &format!("supervision timed out: workflow did not complete within {minutes} minutes"),
                );
            }
            RunOutcome::Failed { conclusion } => {
                self.commit_terminal(deployment_id, false, &format!("workflow failed: {conclusion}"));
            }
            RunOutcome::Success => {
                if self.verify_health(deployment_id, &shop).await {
                    self.commit_terminal(deployment_id, true, "deployed and healthy");
                } else {
                    self.commit_terminal(
                        deployment_id,
                        false,
                        &format!(
                            "deployed but unhealthy: app failed {} health checks",
                            self.config.health_attempts
                        ),
                    );
                }
            }
        }

        Ok(())
    }

    /// Run the bounded health-verification loop. Each attempt checks both
    /// the platform-level app status and the public HTTP probe; the loop
    /// succeeds on the first healthy result.
    async fn verify_health(&self, deployment_id: DeploymentId, shop: &Shop) -> bool {
        let Some(compute) = self.compute.clone() else {
            warn!(deployment_id = %deployment_id, "compute provider not configured; cannot verify health");
            self.record_health_attempt(deployment_id, 1, false, "compute provider not configured");
            return false;
        };

        for attempt in 1..=self.config.health_attempts {
            let (healthy, detail) = match compute.app_status(&shop.app_name).await {
                Ok(state) if state.is_running() => {
                    let probe = compute.probe_health(&shop.app_name).await;
                    (probe.is_healthy(), probe.describe())
                }
                Ok(state) => (false, format!("app not running: {state:?}")),
                Err(e) => (false, format!("status check failed: {e}")),
            };

            self.record_health_attempt(deployment_id, attempt, healthy, &detail);

            if healthy {
                return true;
            }
            if attempt < self.config.health_attempts {
                tokio::time::sleep(self.config.health_interval).await;
            }
        }

        false
    }

    fn record_health_attempt(
        &self,
        deployment_id: DeploymentId,
        attempt: u32,
        healthy: bool,
        detail: &str,
    ) {
        let Ok(Some(mut deployment)) = self.store.get_deployment(&deployment_id) else {
            return;
        };
        deployment.push_event(DeploymentEvent::HealthCheckAttempt {
            attempt,
            healthy,
            detail: detail.to_string(),
            at: Utc::now(),
        });
        if let Err(e) = self.store.update_deployment(&deployment) {
            warn!(deployment_id = %deployment_id, error = %e, "failed to persist health attempt");
        }
    }

    /// Commit the terminal deployment state and, when the shop is still
    /// provisioning, the matching shop status. Notification of success is
    /// fire-and-forget. Also used by the inbound deployment webhook, which
    /// is a supplementary signal with the same commit semantics.
    pub fn commit_terminal(&self, deployment_id: DeploymentId, success: bool, message: &str) {
        let deployment = match self.store.get_deployment(&deployment_id) {
            Ok(Some(deployment)) => deployment,
            Ok(None) => {
                error!(deployment_id = %deployment_id, "deployment vanished before terminal commit");
                return;
            }
            Err(e) => {
                error!(deployment_id = %deployment_id, error = %e, "terminal commit read failed");
                return;
            }
        };

        if deployment.is_terminal() {
            debug!(deployment_id = %deployment_id, "terminal state already committed");
            return;
        }

        let now = Utc::now();
        let status = if success {
            DeploymentStatus::Success
        } else {
            DeploymentStatus::Failed
        };

        let mut deployment = deployment;
        deployment.status = status;
        deployment.completed_at = Some(now);
        if !success {
            deployment.error_message = Some(message.to_string());
        }
        deployment.push_event(DeploymentEvent::Terminal {
            outcome: status,
            message: message.to_string(),
            at: now,
        });

        if let Err(e) = self.store.update_deployment(&deployment) {
            error!(deployment_id = %deployment_id, error = %e, "terminal commit write failed");
            return;
        }

        info!(
            deployment_id = %deployment_id,
            success = %success,
            message = %message,
            "deployment terminal state committed"
        );

        // Move the shop only if it is still provisioning; a shop deleted
        // mid-deployment keeps its deleted status.
        match self.store.get_shop(&deployment.shop_id) {
            Ok(Some(mut shop)) if shop.status == ShopStatus::Creating => {
                shop.status = if success {
                    ShopStatus::Active
                } else {
                    ShopStatus::Failed
                };
                shop.updated_at = now;
                if let Err(e) = self.store.put_shop(&shop) {
                    error!(shop_id = %shop.id, error = %e, "shop status commit failed");
                    return;
                }

                let _ = self.store.append_audit(&AuditRecord::new(
                    "deployment.completed",
                    "deployment",
                    deployment_id.to_string(),
                    "monitor",
                    serde_json::json!({
                        "shop_id": shop.id.to_string(),
                        "success": success,
                        "message": message,
                    }),
                ));

                if success {
                    if let Some(notifier) = &self.notifier {
                        notifier.notify_deployment(&shop, status);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!(shop_id = %deployment.shop_id, error = %e, "shop lookup failed during terminal commit");
            }
        }
    }
}
