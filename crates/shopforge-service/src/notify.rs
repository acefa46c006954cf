//! Outbound deployment notifications.
//!
//! Fire-and-forget: a failed notification never affects the committed
//! deployment state.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use shopforge_core::{DeploymentStatus, Shop};

/// Timeout for notification delivery.
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts deployment outcomes to a configured webhook.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
    url: String,
}

impl Notifier {
    /// Create a notifier targeting `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(NOTIFY_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            url: url.into(),
        }
    }

    /// Spawn a fire-and-forget notification for a deployment outcome.
    pub fn notify_deployment(&self, shop: &Shop, outcome: DeploymentStatus) {
        let this = self.clone();
        let payload = serde_json::json!({
            "event": "deployment.completed",
            "shop_id": shop.id.to_string(),
            "slug": shop.slug,
            "app_name": shop.app_name,
            "outcome": outcome,
        });

        tokio::spawn(async move {
            match this.client.post(&this.url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(url = %this.url, "deployment notification delivered");
                }
                Ok(response) => {
                    warn!(url = %this.url, status = %response.status(), "deployment notification rejected");
                }
                Err(e) => {
                    warn!(url = %this.url, error = %e, "deployment notification failed");
                }
            }
        });
    }
}
