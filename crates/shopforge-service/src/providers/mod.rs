//! Remote provider clients.
//!
//! Each provider is a thin, stateless HTTP client behind a trait so the
//! worker, monitor, and façade receive them as injected dependencies and
//! tests can substitute fakes.

pub mod chatbot;
pub mod compute;
pub mod workflow;

pub use chatbot::{ChatbotError, ChatbotProvider, HttpChatbotClient};
pub use compute::{
    AppState as ComputeAppState, ComputeError, ComputeProvider, HealthStatus, HttpComputeClient,
};
pub use workflow::{
    monitor_run, HttpWorkflowClient, RunOutcome, RunState, RunStatus, WorkflowError,
    WorkflowProvider,
};
