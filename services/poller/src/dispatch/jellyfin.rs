//! Jellyfin sink: one library-update call per flushed parent.

use crate::clients::Jellyfin;
use crate::dispatch::DispatchError;
use crate::dispatch::buffered::FlushSink;
use async_trait::async_trait;
use dc_events::event::ActivityEvent;
use dc_events::mapping::Mappings;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct JellyfinConfig {
    pub url: String,
    pub apikey: String,
    #[serde(default)]
    pub mappings: Vec<String>,
}

pub struct JellyfinSink {
    jellyfin: Jellyfin,
    mappings: Mappings,
}

impl JellyfinSink {
    #[must_use]
    pub fn new(config: JellyfinConfig) -> Self {
        JellyfinSink {
            jellyfin: Jellyfin::new(&config.url, &config.apikey),
            mappings: Mappings::parse(&config.mappings),
        }
    }
}

#[async_trait]
impl FlushSink for JellyfinSink {
    fn name(&self) -> &'static str {
        "jellyfin"
    }

    async fn flush(&self, parent: &str, _events: &[ActivityEvent]) -> Result<(), DispatchError> {
        let updates = vec![(self.mappings.apply(parent), "Modified".to_owned())];
        self.jellyfin.media_updated(&updates).await;
        Ok(())
    }
}
