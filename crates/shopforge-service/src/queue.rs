//! Durable provisioning job queue and worker pool.
//!
//! Jobs are persisted before dispatch so a restart can re-queue anything
//! unfinished. A bounded worker pool drains the dispatch channel; each job
//! gets up to three attempts with exponential backoff, then both the job
//! and its Shop/Deployment records are marked permanently failed. The
//! worker's responsibility ends once the workflow is dispatched and a
//! monitor is attached — it never waits for deployment completion.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

use shopforge_core::{
    backoff_secs, AuditRecord, DeploymentEvent, DeploymentStatus, JobId, JobStatus, ProvisionJob,
    Shop, ShopStatus,
};
use shopforge_store::{Store, StoreError};

use crate::crypto::generate_secret;
use crate::monitor::DeploymentMonitor;
use crate::providers::{ComputeError, ComputeProvider, WorkflowProvider};

/// Capacity of the in-process dispatch channel.
const QUEUE_CAPACITY: usize = 256;

/// Error type for queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Persisting the job failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The dispatch channel is closed or full. The caller must compensate:
    /// this is the explicit, operator-actionable degraded state.
    #[error("job queue unavailable")]
    Unavailable,
}

/// Handle for enqueuing provisioning jobs.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn Store>,
    tx: mpsc::Sender<JobId>,
}

impl JobQueue {
    /// Create a queue and the receiver its worker pool drains.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> (Self, mpsc::Receiver<JobId>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        (Self { store, tx }, rx)
    }

    /// Persist a job and hand it to the worker pool.
    ///
    /// # Errors
    ///
    /// - `QueueError::Store` if the durable write fails.
    /// - `QueueError::Unavailable` if the dispatch channel cannot accept
    ///   the job; the job row stays persisted for startup recovery, but
    ///   the caller must surface the failure.
    pub fn enqueue(&self, job: &ProvisionJob) -> Result<(), QueueError> {
        self.store.put_job(job)?;
        self.tx
            .try_send(job.id)
            .map_err(|_| QueueError::Unavailable)?;
        Ok(())
    }

    /// Re-dispatch persisted jobs that never finished (startup recovery).
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Store` if the job scan fails.
    pub fn requeue_unfinished(&self) -> Result<usize, QueueError> {
        let jobs = self.store.list_unfinished_jobs()?;
        let mut requeued = 0;
        for job in jobs {
            if self.tx.try_send(job.id).is_ok() {
                requeued += 1;
            } else {
                warn!(job_id = %job.id, "dispatch channel full during recovery");
            }
        }
        if requeued > 0 {
            info!(count = %requeued, "re-queued unfinished provisioning jobs");
        }
        Ok(requeued)
    }
}

/// Worker pool settings.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Maximum concurrent provisioning jobs.
    pub concurrency: usize,

    /// Domain under which platform apps are served.
    pub platform_app_domain: String,

    /// Workflow to dispatch.
    pub workflow_name: String,

    /// Git ref the workflow runs on.
    pub workflow_ref: String,

    /// Object-storage access key to inject, when enabled.
    pub storage_access_key: Option<String>,

    /// Object-storage secret key to inject, when enabled.
    pub storage_secret_key: Option<String>,
}

/// Dependencies shared by all workers.
pub struct WorkerContext {
    /// Storage.
    pub store: Arc<dyn Store>,

    /// Compute platform client, if configured.
    pub compute: Option<Arc<dyn ComputeProvider>>,

    /// Workflow provider client, if configured.
    pub workflow: Option<Arc<dyn WorkflowProvider>>,

    /// Deployment monitor to hand dispatched runs to.
    pub monitor: Arc<DeploymentMonitor>,

    /// Settings.
    pub settings: WorkerSettings,
}

/// The bounded worker pool.
pub struct WorkerPool;

impl WorkerPool {
    /// Spawn the pool: a dispatcher that drains the channel and runs each
    /// job on its own task, capped by a semaphore.
    pub fn spawn(
        mut rx: mpsc::Receiver<JobId>,
        ctx: Arc<WorkerContext>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(ctx.settings.concurrency.max(1)));
            while let Some(job_id) = rx.recv().await {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    run_job(&ctx, job_id).await;
                    drop(permit);
                });
            }
        })
    }
}

/// Execute one job to completion or permanent failure.
pub async fn run_job(ctx: &WorkerContext, job_id: JobId) {
    let job = match ctx.store.get_job(&job_id) {
        Ok(Some(job)) => job,
        Ok(None) => {
            warn!(job_id = %job_id, "job record missing");
            return;
        }
        Err(e) => {
            error!(job_id = %job_id, error = %e, "job lookup failed");
            return;
        }
    };

    if !job.status.is_unfinished() {
        return;
    }

    if let Err(e) = execute_job(ctx, job).await {
        error!(job_id = %job_id, error = %e, "job execution aborted on store failure");
    }
}

async fn execute_job(ctx: &WorkerContext, mut job: ProvisionJob) -> Result<(), StoreError> {
    job.status = JobStatus::Running;
    job.updated_at = Utc::now();
    ctx.store.put_job(&job)?;

    if let Some(mut deployment) = ctx.store.get_deployment(&job.deployment_id)? {
        if deployment.started_at.is_none() {
            deployment.started_at = Some(Utc::now());
            if let Err(e) = ctx.store.update_deployment(&deployment) {
                warn!(deployment_id = %job.deployment_id, error = %e, "failed to stamp start time");
            }
        }
    }

    while job.can_retry() {
        job.attempts += 1;
        job.updated_at = Utc::now();
        ctx.store.put_job(&job)?;
        let attempt = job.attempts;

        match attempt_dispatch(ctx, &job, attempt).await {
            Ok(run_id) => {
                job.status = JobStatus::Completed;
                job.last_error = None;
                job.updated_at = Utc::now();
                ctx.store.put_job(&job)?;

                let _ = ctx.store.append_audit(&AuditRecord::new(
                    "job.dispatched",
                    "deployment",
                    job.deployment_id.to_string(),
                    "worker",
                    serde_json::json!({
                        "shop_id": job.shop_id.to_string(),
                        "run_id": run_id,
                        "attempt": attempt,
                    }),
                ));

                info!(
                    job_id = %job.id,
                    deployment_id = %job.deployment_id,
                    run_id = %run_id,
                    attempt = %attempt,
                    "workflow dispatched; handing off to monitor"
                );

                // The worker is done here; supervision is asynchronous.
                ctx.monitor.spawn_supervision(job.deployment_id);
                return Ok(());
            }
            Err(message) => {
                warn!(
                    job_id = %job.id,
                    attempt = %attempt,
                    error = %message,
                    "provisioning dispatch attempt failed"
                );
                job.last_error = Some(message);
                job.updated_at = Utc::now();
                ctx.store.put_job(&job)?;

                tokio::time::sleep(Duration::from_secs(backoff_secs(attempt))).await;
            }
        }
    }

    mark_permanently_failed(ctx, &mut job)
}

/// One dispatch attempt: baseline environment, workflow dispatch, record
/// the run id, and flip the deployment to running.
async fn attempt_dispatch(
    ctx: &WorkerContext,
    job: &ProvisionJob,
    attempt: u32,
) -> Result<String, String> {
    let workflow = ctx
        .workflow
        .as_ref()
        .ok_or_else(|| "workflow provider not configured".to_string())?;

    let shop = ctx
        .store
        .get_shop(&job.shop_id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "shop record missing".to_string())?;

    // Baseline environment is idempotent and non-fatal: a partial failure
    // is logged and the dispatch still proceeds.
    if let Some(compute) = &ctx.compute {
        if let Err(e) = inject_baseline_env(ctx, compute.as_ref(), &shop).await {
            warn!(
                shop_id = %shop.id,
                app_name = %shop.app_name,
                error = %e,
                "baseline environment injection incomplete"
            );
        }
    } else {
        warn!(shop_id = %shop.id, "compute provider not configured; skipping environment injection");
    }

    let inputs = serde_json::json!({
        "app_name": shop.app_name,
        "shop_name": shop.shop_name,
        "slug": shop.slug,
        "plan": shop.plan,
        "base_url": shop.base_url(&ctx.settings.platform_app_domain),
        "admin_email": job.admin_email,
        "admin_password": job.admin_password,
    });

    let run_id = workflow
        .dispatch(&ctx.settings.workflow_name, &ctx.settings.workflow_ref, &inputs)
        .await
        .map_err(|e| e.to_string())?;

    let mut deployment = ctx
        .store
        .get_deployment(&job.deployment_id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "deployment record missing".to_string())?;

    deployment.external_run_id = Some(run_id.clone());
    deployment.status = DeploymentStatus::Running;
    deployment.push_event(DeploymentEvent::Dispatched {
        run_id: run_id.clone(),
        attempt,
        at: Utc::now(),
    });
    ctx.store
        .update_deployment(&deployment)
        .map_err(|e| e.to_string())?;

    Ok(run_id)
}

/// Upsert the baseline environment into the remote app: a generated
/// session secret, the public base URL, and object-storage credentials
/// when enabled.
async fn inject_baseline_env(
    ctx: &WorkerContext,
    compute: &dyn ComputeProvider,
    shop: &Shop,
) -> Result<(), ComputeError> {
    compute.ensure_app(&shop.app_name).await?;

    let mut secrets = vec![
        ("SESSION_SECRET".to_string(), generate_secret()),
        (
            "BASE_URL".to_string(),
            shop.base_url(&ctx.settings.platform_app_domain),
        ),
    ];
    if let (Some(access), Some(secret)) = (
        &ctx.settings.storage_access_key,
        &ctx.settings.storage_secret_key,
    ) {
        secrets.push(("STORAGE_ACCESS_KEY".to_string(), access.clone()));
        secrets.push(("STORAGE_SECRET_KEY".to_string(), secret.clone()));
    }

    compute.put_secrets(&shop.app_name, &secrets).await
}

/// All attempts exhausted: mark the job, deployment, and shop failed with
/// the captured error.
fn mark_permanently_failed(ctx: &WorkerContext, job: &mut ProvisionJob) -> Result<(), StoreError> {
    let message = job
        .last_error
        .clone()
        .unwrap_or_else(|| "provisioning dispatch failed".into());

    job.status = JobStatus::Failed;
    job.updated_at = Utc::now();
    ctx.store.put_job(job)?;

    let now = Utc::now();
    if let Some(mut deployment) = ctx.store.get_deployment(&job.deployment_id)? {
        if !deployment.is_terminal() {
            deployment.status = DeploymentStatus::Failed;
            deployment.error_message = Some(message.clone());
            deployment.completed_at = Some(now);
            deployment.push_event(DeploymentEvent::Terminal {
                outcome: DeploymentStatus::Failed,
                message: message.clone(),
                at: now,
            });
            if let Err(e) = ctx.store.update_deployment(&deployment) {
                error!(deployment_id = %deployment.id, error = %e, "failed to mark deployment failed");
            }
        }
    }

    if let Some(mut shop) = ctx.store.get_shop(&job.shop_id)? {
        if shop.status == ShopStatus::Creating {
            shop.status = ShopStatus::Failed;
            shop.updated_at = now;
            if let Err(e) = ctx.store.put_shop(&shop) {
                error!(shop_id = %shop.id, error = %e, "failed to mark shop failed");
            }
        }
    }

    let _ = ctx.store.append_audit(&AuditRecord::new(
        "job.failed",
        "deployment",
        job.deployment_id.to_string(),
        "worker",
        serde_json::json!({
            "shop_id": job.shop_id.to_string(),
            "attempts": job.attempts,
            "error": message,
        }),
    ));

    error!(
        job_id = %job.id,
        shop_id = %job.shop_id,
        attempts = %job.attempts,
        error = %message,
        "provisioning job permanently failed"
    );

    Ok(())
}
