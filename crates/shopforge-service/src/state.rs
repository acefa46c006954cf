//! Application state.

use std::sync::Arc;

use tokio::sync::mpsc;

use shopforge_core::JobId;
use shopforge_store::Store;

use crate::config::ServiceConfig;
use crate::monitor::{DeploymentMonitor, MonitorConfig};
use crate::notify::Notifier;
use crate::providers::{
    ChatbotProvider, ComputeProvider, HttpChatbotClient, HttpComputeClient, HttpWorkflowClient,
    WorkflowProvider,
};
use crate::queue::{JobQueue, WorkerContext, WorkerPool, WorkerSettings};

/// Constructor-injected provider clients.
///
/// Built from configuration in production; tests pass fakes.
#[derive(Clone, Default)]
pub struct Providers {
    /// Compute platform client.
    pub compute: Option<Arc<dyn ComputeProvider>>,

    /// Workflow provider client.
    pub workflow: Option<Arc<dyn WorkflowProvider>>,

    /// Chatbot backend client.
    pub chatbot: Option<Arc<dyn ChatbotProvider>>,
}

impl Providers {
    /// Build provider clients from configuration.
    ///
    /// Missing credentials yield a degraded mode with a warning rather
    /// than a startup failure.
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        let compute = config
            .platform_api_url
            .as_ref()
            .zip(config.platform_api_token.as_ref())
            .and_then(|(url, token)| {
                match HttpComputeClient::new(url, token, &config.platform_app_domain) {
                    Ok(client) => {
                        tracing::info!(platform_url = %url, "compute platform integration enabled");
                        Some(Arc::new(client) as Arc<dyn ComputeProvider>)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to create compute platform client");
                        None
                    }
                }
            });
        if compute.is_none() {
            tracing::warn!("compute platform not configured - provisioning will fail health checks");
        }

        let workflow = config
            .workflow_api_url
            .as_ref()
            .zip(config.workflow_api_token.as_ref())
            .and_then(|(url, token)| match HttpWorkflowClient::new(url, token) {
                Ok(client) => {
                    tracing::info!(workflow_url = %url, "workflow provider integration enabled");
                    Some(Arc::new(client) as Arc<dyn WorkflowProvider>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to create workflow provider client");
                    None
                }
            });
        if workflow.is_none() {
            tracing::warn!("workflow provider not configured - provisioning jobs will fail");
        }

        let chatbot = config
            .chatbot_api_url
            .as_ref()
            .zip(config.chatbot_api_token.as_ref())
            .and_then(|(url, token)| match HttpChatbotClient::new(url, token) {
                Ok(client) => {
                    tracing::info!(chatbot_url = %url, "chatbot backend integration enabled");
                    Some(Arc::new(client) as Arc<dyn ChatbotProvider>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to create chatbot backend client");
                    None
                }
            });
        if chatbot.is_none() {
            tracing::warn!("chatbot backend not configured - feature enablement disabled");
        }

        Self {
            compute,
            workflow,
            chatbot,
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Compute platform client (optional).
    pub compute: Option<Arc<dyn ComputeProvider>>,

    /// Workflow provider client (optional).
    pub workflow: Option<Arc<dyn WorkflowProvider>>,

    /// Chatbot backend client (optional).
    pub chatbot: Option<Arc<dyn ChatbotProvider>>,

    /// Provisioning job queue.
    pub queue: JobQueue,

    /// Deployment monitor.
    pub monitor: Arc<DeploymentMonitor>,
}

impl AppState {
    /// Create application state and the worker-pool receiver.
    ///
    /// The caller decides whether to start workers (production and
    /// provisioning tests do; pure API tests don't need to).
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        config: ServiceConfig,
        providers: Providers,
    ) -> (Self, mpsc::Receiver<JobId>) {
        let notifier = config
            .notify_webhook_url
            .as_ref()
            .map(|url| Arc::new(Notifier::new(url)));

        let monitor = Arc::new(DeploymentMonitor::new(
            store.clone(),
            providers.compute.clone(),
            providers.workflow.clone(),
            notifier,
            MonitorConfig::default(),
        ));

        let (queue, rx) = JobQueue::new(store.clone());

        (
            Self {
                store,
                config,
                compute: providers.compute,
                workflow: providers.workflow,
                chatbot: providers.chatbot,
                queue,
                monitor,
            },
            rx,
        )
    }

    /// Build the shared worker context.
    #[must_use]
    pub fn worker_context(&self) -> Arc<WorkerContext> {
        Arc::new(WorkerContext {
            store: self.store.clone(),
            compute: self.compute.clone(),
            workflow: self.workflow.clone(),
            monitor: self.monitor.clone(),
            settings: WorkerSettings {
                concurrency: self.config.worker_concurrency,
                platform_app_domain: self.config.platform_app_domain.clone(),
                workflow_name: self.config.workflow_name.clone(),
                workflow_ref: self.config.workflow_ref.clone(),
                storage_access_key: self.config.storage_access_key.clone(),
                storage_secret_key: self.config.storage_secret_key.clone(),
            },
        })
    }

    /// Start the worker pool and run startup recovery: re-queue unfinished
    /// jobs and resume orphaned deployment supervision.
    pub fn start_workers(&self, rx: mpsc::Receiver<JobId>) -> tokio::task::JoinHandle<()> {
        let handle = WorkerPool::spawn(rx, self.worker_context());

        match self.queue.requeue_unfinished() {
            Ok(count) if count > 0 => {
                tracing::info!(count = %count, "startup recovery re-queued jobs");
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "startup job recovery failed"),
        }

        let resumed = self.monitor.resume_orphaned();
        if resumed > 0 {
            tracing::info!(count = %resumed, "startup recovery resumed deployment monitors");
        }

        handle
    }
}
