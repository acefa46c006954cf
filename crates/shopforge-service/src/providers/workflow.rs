//! Workflow (CI) provider client.
//!
//! Dispatches the remote provisioning workflow and polls run status. The
//! provider's three-state model (`queued`/`in_progress`/`completed` plus a
//! conclusion) is collapsed into this system's two-state view: running
//! until completed, then success or failed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

/// Timeout for workflow API calls.
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for workflow provider operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The workflow API returned an error.
    #[error("workflow API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Client misconfiguration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Collapsed state of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Queued or in progress.
    Running,

    /// Completed with a success conclusion.
    Success,

    /// Completed with any other conclusion (failure, cancelled, timeout).
    Failed,
}

/// Observed status of a workflow run.
#[derive(Debug, Clone)]
pub struct RunStatus {
    /// Collapsed two-state view.
    pub state: RunState,

    /// Raw provider status string, for deployment events.
    pub raw_status: String,

    /// Provider conclusion, present once completed.
    pub conclusion: Option<String>,

    /// Link to the run in the provider UI.
    pub html_url: Option<String>,
}

/// Terminal result of monitoring a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The workflow completed successfully.
    Success,

    /// The workflow completed without success.
    Failed {
        /// The provider conclusion (failure, cancelled, timed_out, ...).
        conclusion: String,
    },

    /// The wall-clock ceiling elapsed before the run completed.
    TimedOut,
}

/// Interface to the workflow provider.
#[async_trait]
pub trait WorkflowProvider: Send + Sync {
    /// Dispatch a named workflow on a ref with a JSON input payload.
    ///
    /// Returns the provider's run identifier.
    async fn dispatch(
        &self,
        workflow: &str,
        git_ref: &str,
        inputs: &serde_json::Value,
    ) -> Result<String, WorkflowError>;

    /// Fetch the current status of a run.
    async fn run_status(&self, run_id: &str) -> Result<RunStatus, WorkflowError>;
}

/// Poll a run on a fixed interval until it reaches a terminal state or the
/// wall-clock ceiling elapses.
///
/// `on_update` is invoked on every observed status change. Transient
/// polling errors are logged and do not abort the loop; the ceiling bounds
/// the total duration either way, so this never polls indefinitely.
pub async fn monitor_run<F>(
    provider: &dyn WorkflowProvider,
    run_id: &str,
    max_duration: Duration,
    poll_interval: Duration,
    mut on_update: F,
) -> RunOutcome
where
    F: FnMut(&RunStatus),
{
    let deadline = tokio::time::Instant::now() + max_duration;
    let mut last_status: Option<String> = None;

    loop {
        if tokio::time::Instant::now() >= deadline {
            return RunOutcome::TimedOut;
        }

        match provider.run_status(run_id).await {
            Ok(status) => {
                if last_status.as_deref() != Some(status.raw_status.as_str()) {
                    last_status = Some(status.raw_status.clone());
                    on_update(&status);
                }

                match status.state {
                    RunState::Success => return RunOutcome::Success,
                    RunState::Failed => {
                        return RunOutcome::Failed {
                            conclusion: status
                                .conclusion
                                .unwrap_or_else(|| "unknown".into()),
                        }
                    }
                    RunState::Running => {}
                }
            }
            Err(e) => {
                // Transient poll failures don't abort supervision.
                warn!(run_id = %run_id, error = %e, "workflow status poll failed");
            }
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// HTTP client for the workflow provider's REST API.
#[derive(Debug, Clone)]
pub struct HttpWorkflowClient {
    client: Client,
    base_url: String,
    api_token: String,
}

#[derive(Debug, Deserialize)]
struct DispatchResponse {
    run_id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RunStatusResponse {
    status: String,
    conclusion: Option<String>,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkflowErrorResponse {
    message: Option<String>,
}

impl HttpWorkflowClient {
    /// Create a new workflow provider client.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Configuration` if the token is empty or the
    /// HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Result<Self, WorkflowError> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(WorkflowError::Configuration(
                "workflow API token is empty".into(),
            ));
        }

        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|e| WorkflowError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
        })
    }

    async fn api_error(response: reqwest::Response) -> WorkflowError {
        let status = response.status().as_u16();
        let message = match response.json::<WorkflowErrorResponse>().await {
            Ok(body) => body.message.unwrap_or_else(|| format!("HTTP {status}")),
            Err(_) => format!("HTTP {status}"),
        };
        WorkflowError::Api { status, message }
    }
}

#[async_trait]
impl WorkflowProvider for HttpWorkflowClient {
    async fn dispatch(
        &self,
        workflow: &str,
        git_ref: &str,
        inputs: &serde_json::Value,
    ) -> Result<String, WorkflowError> {
        let url = format!("{}/v1/workflows/{workflow}/dispatches", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&serde_json::json!({
                "ref": git_ref,
                "inputs": inputs,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: DispatchResponse = response.json().await?;
        // Providers return run ids as either numbers or strings.
        let run_id = match body.run_id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(run_id)
    }

    async fn run_status(&self, run_id: &str) -> Result<RunStatus, WorkflowError> {
        let url = format!("{}/v1/runs/{run_id}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: RunStatusResponse = response.json().await?;
        Ok(translate_status(&body.status, body.conclusion, body.html_url))
    }
}

/// Translate the provider's status/conclusion pair into a [`RunStatus`].
fn translate_status(
    status: &str,
    conclusion: Option<String>,
    html_url: Option<String>,
) -> RunStatus {
    let state = if status.eq_ignore_ascii_case("completed") {
        if conclusion
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case("success"))
        {
            RunState::Success
        } else {
            RunState::Failed
        }
    } else {
        RunState::Running
    };

    RunStatus {
        state,
        raw_status: status.to_string(),
        conclusion,
        html_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn status_translation() {
        assert_eq!(translate_status("queued", None, None).state, RunState::Running);
        assert_eq!(
            translate_status("in_progress", None, None).state,
            RunState::Running
        );
        assert_eq!(
            translate_status("completed", Some("success".into()), None).state,
            RunState::Success
        );
        // Any non-success conclusion maps to failed.
        for conclusion in ["failure", "cancelled", "timed_out"] {
            assert_eq!(
                translate_status("completed", Some(conclusion.into()), None).state,
                RunState::Failed
            );
        }
        assert_eq!(
            translate_status("completed", None, None).state,
            RunState::Failed
        );
    }

    /// A provider whose run never completes.
    struct NeverCompletes {
        polls: AtomicU32,
    }

    #[async_trait]
    impl WorkflowProvider for NeverCompletes {
        async fn dispatch(
            &self,
            _workflow: &str,
            _git_ref: &str,
            _inputs: &serde_json::Value,
        ) -> Result<String, WorkflowError> {
            Ok("run-1".into())
        }

        async fn run_status(&self, _run_id: &str) -> Result<RunStatus, WorkflowError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(translate_status("in_progress", None, None))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_times_out_at_the_ceiling() {
        let provider = NeverCompletes {
            polls: AtomicU32::new(0),
        };
        let max = Duration::from_secs(45 * 60);
        let interval = Duration::from_secs(30);

        let started = tokio::time::Instant::now();
        let mut updates = 0;
        let outcome = monitor_run(&provider, "run-1", max, interval, |_| updates += 1).await;

        assert_eq!(outcome, RunOutcome::TimedOut);
        let elapsed = started.elapsed();
        assert!(elapsed >= max);
        assert!(elapsed < max + Duration::from_secs(60));
        // One status change observed (nothing ever changed after that).
        assert_eq!(updates, 1);
        assert!(provider.polls.load(Ordering::SeqCst) >= 89);
    }

    /// A provider that completes after a fixed number of polls.
    struct CompletesAfter {
        polls: AtomicU32,
        after: u32,
        conclusion: &'static str,
    }

    #[async_trait]
    impl WorkflowProvider for CompletesAfter {
        async fn dispatch(
            &self,
            _workflow: &str,
            _git_ref: &str,
            _inputs: &serde_json::Value,
        ) -> Result<String, WorkflowError> {
            Ok("run-1".into())
        }

        async fn run_status(&self, _run_id: &str) -> Result<RunStatus, WorkflowError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n >= self.after {
                Ok(translate_status(
                    "completed",
                    Some(self.conclusion.to_string()),
                    None,
                ))
            } else {
                Ok(translate_status("in_progress", None, None))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_reports_status_changes_and_success() {
        let provider = CompletesAfter {
            polls: AtomicU32::new(0),
            after: 3,
            conclusion: "success",
        };

        let mut seen = Vec::new();
        let outcome = monitor_run(
            &provider,
            "run-1",
            Duration::from_secs(45 * 60),
            Duration::from_secs(30),
            |status| seen.push(status.raw_status.clone()),
        )
        .await;

        assert_eq!(outcome, RunOutcome::Success);
        assert_eq!(seen, vec!["in_progress".to_string(), "completed".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_maps_cancelled_to_failed() {
        let provider = CompletesAfter {
            polls: AtomicU32::new(0),
            after: 1,
            conclusion: "cancelled",
        };

        let outcome = monitor_run(
            &provider,
            "run-1",
            Duration::from_secs(45 * 60),
            Duration::from_secs(30),
            |_| {},
        )
        .await;

        assert_eq!(
            outcome,
            RunOutcome::Failed {
                conclusion: "cancelled".into()
            }
        );
    }
}
