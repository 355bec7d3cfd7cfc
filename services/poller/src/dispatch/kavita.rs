//! Kavita sink: one scan-folder call per flushed target, with token
//! refresh on 401.
//!
//! When any buffered event is a file, scanning the parent covers all of
//! them; an all-folder batch scans each child folder instead.  A scan is
//! retried up to five times, re-authenticating whenever the token has
//! expired; five consecutive 401s abandon the whole flush.

use crate::clients::Kavita;
use crate::dispatch::DispatchError;
use crate::dispatch::buffered::FlushSink;
use async_trait::async_trait;
use dc_events::event::ActivityEvent;
use dc_events::mapping::Mappings;
use dc_events::paths;
use serde::Deserialize;

const MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Deserialize)]
pub struct KavitaConfig {
    pub url: String,
    pub apikey: String,
    #[serde(default)]
    pub mappings: Vec<String>,
}

pub struct KavitaSink {
    kavita: Kavita,
    mappings: Mappings,
}

impl KavitaSink {
    #[must_use]
    pub fn new(config: KavitaConfig) -> Self {
        KavitaSink {
            kavita: Kavita::new(&config.url, &config.apikey),
            mappings: Mappings::parse(&config.mappings),
        }
    }
}

/// Scan the parent itself when any child is a file, else each child
/// folder.
pub(crate) fn scan_folders(parent: &str, events: &[ActivityEvent]) -> Vec<String> {
    if events.iter().any(|e| !e.is_folder) {
        vec![parent.to_owned()]
    } else {
        events
            .iter()
            .map(|e| paths::join(parent, paths::file_name(&e.path)))
            .collect()
    }
}

#[async_trait]
impl FlushSink for KavitaSink {
    fn name(&self) -> &'static str {
        "kavita"
    }

    async fn flush(&self, parent: &str, events: &[ActivityEvent]) -> Result<(), DispatchError> {
        for folder in scan_folders(parent, events) {
            let mapped = self.mappings.apply(&folder);
            let mut delivered = false;
            for _ in 0..MAX_ATTEMPTS {
                let status = self.kavita.scan_folder(&mapped).await;
                if status == 401 {
                    self.kavita.authenticate().await;
                    continue;
                }
                if !(200..300).contains(&status) {
                    tracing::warn!(folder = %mapped, status, "kavita scan rejected");
                }
                delivered = true;
                break;
            }
            if !delivered {
                return Err(DispatchError::Other(format!(
                    "kavita login failed {MAX_ATTEMPTS} times"
                )));
            }
        }
        Ok(())
    }
}
