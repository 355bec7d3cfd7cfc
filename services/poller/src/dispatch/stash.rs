//! Stash sink: one metadata scan per flushed parent.

use crate::clients::Stash;
use crate::dispatch::DispatchError;
use crate::dispatch::buffered::FlushSink;
use async_trait::async_trait;
use dc_events::event::ActivityEvent;
use dc_events::mapping::Mappings;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct StashConfig {
    pub url: String,
    pub apikey: String,
    #[serde(default)]
    pub mappings: Vec<String>,
}

pub struct StashSink {
    stash: Stash,
    mappings: Mappings,
}

impl StashSink {
    #[must_use]
    pub fn new(config: StashConfig) -> Self {
        StashSink {
            stash: Stash::new(&config.url, &config.apikey),
            mappings: Mappings::parse(&config.mappings),
        }
    }
}

#[async_trait]
impl FlushSink for StashSink {
    fn name(&self) -> &'static str {
        "stash"
    }

    async fn flush(&self, parent: &str, _events: &[ActivityEvent]) -> Result<(), DispatchError> {
        self.stash
            .metadata_scan(&[self.mappings.apply(parent)])
            .await;
        Ok(())
    }
}
