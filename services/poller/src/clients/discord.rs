//! Discord webhook client.
//!
//! Webhook executions are spaced at least 1.5 s apart through the session
//! gate; Discord rate-limits the endpoint and a burst of activity would
//! otherwise drop embeds.

use crate::clients::trim_base;
use crate::session::{HttpSession, RequestOpts, WireResponse};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://discord.com/api";
const WEBHOOK_INTERVAL: Duration = Duration::from_millis(1500);

pub struct Discord {
    session: HttpSession,
    base: String,
    webhook_id: String,
    webhook_token: String,
}

impl Discord {
    #[must_use]
    pub fn new(url: &str, webhook_id: &str, webhook_token: &str) -> Self {
        Discord {
            session: HttpSession::new(),
            base: trim_base(url),
            webhook_id: webhook_id.to_owned(),
            webhook_token: webhook_token.to_owned(),
        }
    }

    /// Execute the webhook with the given embeds.
    pub async fn execute_webhook(
        &self,
        username: &str,
        embeds: Vec<serde_json::Value>,
    ) -> WireResponse {
        let url = format!(
            "{}/webhooks/{}/{}",
            self.base, self.webhook_id, self.webhook_token
        );
        self.session
            .post(
                &url,
                RequestOpts {
                    json: Some(serde_json::json!({
                        "username": username,
                        "embeds": embeds,
                    })),
                    min_interval: Some(WEBHOOK_INTERVAL),
                    ..RequestOpts::default()
                },
            )
            .await
    }
}
