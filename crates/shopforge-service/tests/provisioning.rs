//! Integration tests for the provisioning pipeline: worker attempts and
//! backoff, monitor supervision, health verification, and timeout
//! handling. Providers are fakes; time is paused so the 45-minute ceiling
//! and the backoff schedule run instantly.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use shopforge_core::{
    Deployment, DeploymentEvent, DeploymentStatus, JobStatus, Plan, ProvisionJob, Shop,
    ShopStatus, User, UserId,
};
use shopforge_service::providers::{
    ComputeAppState, ComputeError, ComputeProvider, HealthStatus, RunState, RunStatus,
    WorkflowError, WorkflowProvider,
};
use shopforge_service::queue::{run_job, JobQueue, WorkerContext, WorkerSettings};
use shopforge_service::{DeploymentMonitor, MonitorConfig};
use shopforge_store::{RocksStore, Store};

// ============================================================================
// Fake providers
// ============================================================================

/// Compute fake: records injected secrets; health is fixed at build time.
struct FakeCompute {
    healthy: bool,
    secrets: Mutex<Vec<(String, String)>>,
    status_checks: AtomicU32,
}

impl FakeCompute {
    fn new(healthy: bool) -> Self {
        Self {
            healthy,
            secrets: Mutex::new(Vec::new()),
            status_checks: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ComputeProvider for FakeCompute {
    async fn ensure_app(&self, _app_name: &str) -> Result<(), ComputeError> {
        Ok(())
    }

    async fn put_secrets(
        &self,
        _app_name: &str,
        secrets: &[(String, String)],
    ) -> Result<(), ComputeError> {
        self.secrets.lock().unwrap().extend_from_slice(secrets);
        Ok(())
    }

    async fn app_status(&self, _app_name: &str) -> Result<ComputeAppState, ComputeError> {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        Ok(ComputeAppState::Running)
    }

    async fn probe_health(&self, _app_name: &str) -> HealthStatus {
        if self.healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unreachable {
                detail: "probe timed out".into(),
            }
        }
    }

    async fn destroy_app(&self, _app_name: &str) -> Result<bool, ComputeError> {
        Ok(true)
    }
}

/// Workflow fake: dispatch may fail; the run completes with a fixed
/// conclusion, or never when `conclusion` is `None`.
struct FakeWorkflow {
    fail_dispatch: bool,
    conclusion: Option<&'static str>,
    dispatches: AtomicU32,
    polls: AtomicU32,
}

impl FakeWorkflow {
    fn completes_with(conclusion: &'static str) -> Self {
        Self {
            fail_dispatch: false,
            conclusion: Some(conclusion),
            dispatches: AtomicU32::new(0),
            polls: AtomicU32::new(0),
        }
    }

    fn never_completes() -> Self {
        Self {
            fail_dispatch: false,
            conclusion: None,
            dispatches: AtomicU32::new(0),
            polls: AtomicU32::new(0),
        }
    }

    fn dispatch_always_fails() -> Self {
        Self {
            fail_dispatch: true,
            conclusion: None,
            dispatches: AtomicU32::new(0),
            polls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl WorkflowProvider for FakeWorkflow {
    async fn dispatch(
        &self,
        _workflow: &str,
        _git_ref: &str,
        _inputs: &serde_json::Value,
    ) -> Result<String, WorkflowError> {
        let n = self.dispatches.fetch_add(1, Ordering::SeqCst);
        if self.fail_dispatch {
            return Err(WorkflowError::Api {
                status: 502,
                message: "dispatch rejected".into(),
            });
        }
        Ok(format!("run-{n}"))
    }

    async fn run_status(&self, _run_id: &str) -> Result<RunStatus, WorkflowError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        match self.conclusion {
            Some(conclusion) => Ok(RunStatus {
                state: if conclusion == "success" {
                    RunState::Success
                } else {
                    RunState::Failed
                },
                raw_status: "completed".into(),
                conclusion: Some(conclusion.to_string()),
                html_url: None,
            }),
            None => Ok(RunStatus {
                state: RunState::Running,
                raw_status: "in_progress".into(),
                conclusion: None,
                html_url: None,
            }),
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Pipeline {
    store: Arc<RocksStore>,
    _temp_dir: TempDir,
    compute: Arc<FakeCompute>,
    workflow: Arc<FakeWorkflow>,
    ctx: Arc<WorkerContext>,
    monitor: Arc<DeploymentMonitor>,
    shop: Shop,
    deployment: Deployment,
    job: ProvisionJob,
}

fn pipeline(workflow: FakeWorkflow, compute: FakeCompute) -> Pipeline {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(RocksStore::open(temp_dir.path()).unwrap());
    let dyn_store: Arc<dyn Store> = store.clone();

    let owner = UserId::generate();
    let user = User::new(owner, "owner@example.com");
    store.put_user(&user).unwrap();

    let shop = Shop::new(owner, "Acme", Plan::Starter);
    store.create_shop(&shop).unwrap();

    let deployment = Deployment::new(shop.id);
    store.create_deployment(&deployment).unwrap();

    let job = ProvisionJob::new(shop.id, deployment.id, owner, "admin@acme.com", "hunter2!");
    store.put_job(&job).unwrap();

    let compute = Arc::new(compute);
    let workflow = Arc::new(workflow);

    let monitor = Arc::new(DeploymentMonitor::new(
        dyn_store.clone(),
        Some(compute.clone() as Arc<dyn ComputeProvider>),
        Some(workflow.clone() as Arc<dyn WorkflowProvider>),
        None,
        MonitorConfig::default(),
    ));

    let ctx = Arc::new(WorkerContext {
        store: dyn_store,
        compute: Some(compute.clone() as Arc<dyn ComputeProvider>),
        workflow: Some(workflow.clone() as Arc<dyn WorkflowProvider>),
        monitor: monitor.clone(),
        settings: WorkerSettings {
            concurrency: 2,
            platform_app_domain: "shops.example.dev".into(),
            workflow_name: "provision-shop".into(),
            workflow_ref: "main".into(),
            storage_access_key: Some("storage-key".into()),
            storage_secret_key: Some("storage-secret".into()),
        },
    });

    Pipeline {
        store,
        _temp_dir: temp_dir,
        compute,
        workflow,
        ctx,
        monitor,
        shop,
        deployment,
        job,
    }
}

/// Wait (in paused virtual time) until the deployment reaches a terminal
/// state.
async fn wait_terminal(store: &Arc<RocksStore>, deployment: &Deployment) -> Deployment {
    for _ in 0..10_000 {
        let current = store.get_deployment(&deployment.id).unwrap().unwrap();
        if current.is_terminal() {
            return current;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    panic!("deployment never reached a terminal state");
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn successful_provisioning_ends_active() {
    let p = pipeline(FakeWorkflow::completes_with("success"), FakeCompute::new(true));

    run_job(&p.ctx, p.job.id).await;

    // The worker's half is done as soon as the dispatch succeeded.
    let job = p.store.get_job(&p.job.id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 1);

    let deployment = wait_terminal(&p.store, &p.deployment).await;
    assert_eq!(deployment.status, DeploymentStatus::Success);
    assert_eq!(deployment.external_run_id.as_deref(), Some("run-0"));
    assert!(deployment.completed_at.is_some());
    assert!(deployment
        .events
        .iter()
        .any(|e| matches!(e, DeploymentEvent::Dispatched { .. })));
    assert!(deployment
        .events
        .iter()
        .any(|e| matches!(e, DeploymentEvent::HealthCheckAttempt { healthy: true, .. })));
    assert!(deployment
        .events
        .iter()
        .any(|e| matches!(e, DeploymentEvent::Terminal { .. })));

    let shop = p.store.get_shop(&p.shop.id).unwrap().unwrap();
    assert_eq!(shop.status, ShopStatus::Active);

    // Baseline environment was injected.
    let secrets = p.compute.secrets.lock().unwrap();
    assert!(secrets.iter().any(|(k, _)| k == "SESSION_SECRET"));
    assert!(secrets
        .iter()
        .any(|(k, v)| k == "BASE_URL" && v == "https://sf-acme.shops.example.dev"));
    assert!(secrets.iter().any(|(k, _)| k == "STORAGE_ACCESS_KEY"));
    drop(secrets);

    // Supervision released its lease.
    assert!(p.store.get_lease(&p.deployment.id).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn workflow_failure_is_terminal_and_distinct() {
    let p = pipeline(
        FakeWorkflow::completes_with("failure"),
        FakeCompute::new(true),
    );

    run_job(&p.ctx, p.job.id).await;
    let deployment = wait_terminal(&p.store, &p.deployment).await;

    assert_eq!(deployment.status, DeploymentStatus::Failed);
    let message = deployment.error_message.unwrap();
    assert!(message.contains("workflow failed"));
    assert!(!message.contains("unhealthy"));

    // No health checks run for a failed workflow.
    assert_eq!(p.compute.status_checks.load(Ordering::SeqCst), 0);

    let shop = p.store.get_shop(&p.shop.id).unwrap().unwrap();
    assert_eq!(shop.status, ShopStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn deployed_but_unhealthy_is_distinct_from_workflow_failure() {
    let p = pipeline(
        FakeWorkflow::completes_with("success"),
        FakeCompute::new(false),
    );

    run_job(&p.ctx, p.job.id).await;
    let deployment = wait_terminal(&p.store, &p.deployment).await;

    assert_eq!(deployment.status, DeploymentStatus::Failed);
    let message = deployment.error_message.unwrap();
    assert!(message.contains("unhealthy"));
    assert!(!message.contains("workflow failed"));

    // All five attempts were made and recorded.
    let attempts: Vec<_> = deployment
        .events
        .iter()
        .filter(|e| matches!(e, DeploymentEvent::HealthCheckAttempt { .. }))
        .collect();
    assert_eq!(attempts.len(), 5);

    let shop = p.store.get_shop(&p.shop.id).unwrap().unwrap();
    assert_eq!(shop.status, ShopStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn dispatch_failures_retry_three_times_with_backoff() {
    let p = pipeline(FakeWorkflow::dispatch_always_fails(), FakeCompute::new(true));

    let started = tokio::time::Instant::now();
    run_job(&p.ctx, p.job.id).await;
    let elapsed = started.elapsed();

    // Exactly three attempts, with 10s + 20s + 40s of backoff.
    assert_eq!(p.workflow.dispatches.load(Ordering::SeqCst), 3);
    assert!(elapsed >= Duration::from_secs(70));
    assert!(elapsed < Duration::from_secs(120));

    let job = p.store.get_job(&p.job.id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 3);
    assert!(job.last_error.unwrap().contains("dispatch rejected"));

    let deployment = p.store.get_deployment(&p.deployment.id).unwrap().unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Failed);
    assert!(deployment.error_message.unwrap().contains("dispatch rejected"));

    let shop = p.store.get_shop(&p.shop.id).unwrap().unwrap();
    assert_eq!(shop.status, ShopStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn supervision_times_out_at_the_ceiling() {
    let p = pipeline(FakeWorkflow::never_completes(), FakeCompute::new(true));

    // Put the deployment into the running state the monitor resumes from.
    let mut deployment = p.store.get_deployment(&p.deployment.id).unwrap().unwrap();
    deployment.status = DeploymentStatus::Running;
    deployment.external_run_id = Some("run-0".into());
    p.store.update_deployment(&deployment).unwrap();

    let started = tokio::time::Instant::now();
    p.monitor.supervise(p.deployment.id).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(45 * 60));

    let deployment = p.store.get_deployment(&p.deployment.id).unwrap().unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Failed);
    assert!(deployment.error_message.unwrap().contains("timed out"));

    let shop = p.store.get_shop(&p.shop.id).unwrap().unwrap();
    assert_eq!(shop.status, ShopStatus::Failed);
    assert!(p.store.get_lease(&p.deployment.id).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn duplicate_supervision_is_a_noop() {
    let p = pipeline(FakeWorkflow::never_completes(), FakeCompute::new(true));

    let mut deployment = p.store.get_deployment(&p.deployment.id).unwrap().unwrap();
    deployment.status = DeploymentStatus::Running;
    deployment.external_run_id = Some("run-0".into());
    p.store.update_deployment(&deployment).unwrap();

    // Another live process already supervises this deployment.
    assert!(p
        .store
        .try_acquire_lease(&p.deployment.id, "other-process")
        .unwrap());

    p.monitor.supervise(p.deployment.id).await;

    // No polling happened and nothing was committed.
    assert_eq!(p.workflow.polls.load(Ordering::SeqCst), 0);
    let deployment = p.store.get_deployment(&p.deployment.id).unwrap().unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Running);
}

#[tokio::test]
async fn queue_persists_jobs_and_requeues_on_recovery() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(RocksStore::open(temp_dir.path()).unwrap());
    let dyn_store: Arc<dyn Store> = store.clone();

    let (queue, mut rx) = JobQueue::new(dyn_store);

    let job = ProvisionJob::new(
        shopforge_core::ShopId::generate(),
        shopforge_core::DeploymentId::generate(),
        UserId::generate(),
        "a@b.c",
        "password",
    );
    queue.enqueue(&job).unwrap();

    // The job is both durable and dispatched.
    assert_eq!(rx.recv().await.unwrap(), job.id);
    assert_eq!(store.list_unfinished_jobs().unwrap().len(), 1);

    // Simulated restart: a fresh queue re-dispatches everything pending.
    let requeued = queue.requeue_unfinished().unwrap();
    assert_eq!(requeued, 1);
    assert_eq!(rx.recv().await.unwrap(), job.id);
}
