//! Discord dispatcher: one embed per event.

use crate::clients::Discord;
use crate::clients::discord::DEFAULT_API_URL;
use crate::dispatch::{DispatchError, Dispatcher};
use async_trait::async_trait;
use dc_events::event::{Action, ActivityEvent};
use dc_events::mapping::Mappings;
use serde::Deserialize;
use std::collections::HashMap;

const MAX_FIELD_LEN: usize = 1024;

fn default_url() -> String {
    DEFAULT_API_URL.to_owned()
}

#[derive(Debug, Deserialize)]
pub struct DiscordConfig {
    #[serde(default = "default_url")]
    pub url: String,
    pub webhook_id: String,
    pub webhook_token: String,
    /// Per-action embed colour overrides (decimal colour strings).
    #[serde(default)]
    pub colors: HashMap<String, String>,
    #[serde(default)]
    pub mappings: Vec<String>,
}

pub struct DiscordDispatcher {
    discord: Discord,
    colors: HashMap<String, String>,
    mappings: Mappings,
}

impl DiscordDispatcher {
    #[must_use]
    pub fn new(config: DiscordConfig) -> Self {
        let mut colors: HashMap<String, String> = [
            ("default", "0"),
            ("move", "3447003"),
            ("create", "5763719"),
            ("delete", "15548997"),
            ("edit", "16776960"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
        colors.extend(config.colors);
        DiscordDispatcher {
            discord: Discord::new(&config.url, &config.webhook_id, &config.webhook_token),
            colors,
            mappings: Mappings::parse(&config.mappings),
        }
    }

    fn color(&self, action: Action) -> &str {
        self.colors
            .get(action.as_str())
            .or_else(|| self.colors.get("default"))
            .map_or("0", String::as_str)
    }
}

#[async_trait]
impl Dispatcher for DiscordDispatcher {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn dispatch(&self, event: &ActivityEvent) -> Result<(), DispatchError> {
        let mut fields = vec![field("Path", &self.mappings.apply(&event.path))];
        if event.action == Action::Move {
            let from = if event.removed_path.is_empty() {
                "unknown".to_owned()
            } else {
                self.mappings.apply(&event.removed_path)
            };
            fields.push(field("From", &from));
        } else if let Some(detail) = event.action_detail.display_text() {
            fields.push(field("Details", detail));
        }
        fields.push(field("ID", event.target.name.as_deref().unwrap_or("unknown")));
        fields.push(field(
            "MIME",
            event.target.mime_type.as_deref().unwrap_or("unknown"),
        ));
        fields.push(field("Link", &event.link));
        fields.push(field("Occurred at", &event.timestamp_text));

        let embed = serde_json::json!({
            "color": self.color(event.action),
            "author": {"name": event.poller},
            "title": event.target.title,
            "description": format!("# {}", event.action.as_str().to_uppercase()),
            "fields": fields,
        });
        let response = self
            .discord
            .execute_webhook("Activity Poller", vec![embed])
            .await;
        tracing::info!(
            title = %event.target.title,
            status = response.status,
            "discord webhook"
        );
        Ok(())
    }
}

fn field(name: &str, value: &str) -> serde_json::Value {
    serde_json::json!({"name": name, "value": truncate(value)})
}

/// Discord rejects field values over 1024 characters.
fn truncate(content: &str) -> String {
    if content.chars().count() <= MAX_FIELD_LEN {
        return content.to_owned();
    }
    let cut: String = content.chars().take(MAX_FIELD_LEN - 3).collect();
    format!("{cut}...")
}
