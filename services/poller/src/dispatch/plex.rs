//! Plex dispatcher: scan the directory containing the event, and the
//! removed side of a move when present.

use crate::clients::Plex;
use crate::dispatch::{DispatchError, Dispatcher};
use async_trait::async_trait;
use dc_events::event::ActivityEvent;
use dc_events::mapping::Mappings;
use dc_events::paths;
use serde::Deserialize;
use std::collections::BTreeSet;

#[derive(Debug, Deserialize)]
pub struct PlexConfig {
    pub url: String,
    pub token: String,
    #[serde(default)]
    pub mappings: Vec<String>,
}

pub struct PlexDispatcher {
    plex: Plex,
    mappings: Mappings,
}

impl PlexDispatcher {
    #[must_use]
    pub fn new(config: PlexConfig) -> Self {
        PlexDispatcher {
            plex: Plex::new(&config.url, &config.token),
            mappings: Mappings::parse(&config.mappings),
        }
    }

    fn scan_dir(&self, path: &str, is_folder: bool) -> String {
        let mapped = self.mappings.apply(path);
        if is_folder {
            mapped
        } else {
            paths::parent_dir(&mapped).to_owned()
        }
    }
}

#[async_trait]
impl Dispatcher for PlexDispatcher {
    fn name(&self) -> &'static str {
        "plex"
    }

    async fn dispatch(&self, event: &ActivityEvent) -> Result<(), DispatchError> {
        // A move across directories needs both sides scanned; a set
        // collapses the same-directory case.
        let mut targets = BTreeSet::new();
        targets.insert(self.scan_dir(&event.path, event.is_folder));
        if !event.removed_path.is_empty() {
            targets.insert(self.scan_dir(&event.removed_path, event.is_folder));
        }
        for target in targets {
            self.plex.scan(&target, true).await;
        }
        Ok(())
    }
}
