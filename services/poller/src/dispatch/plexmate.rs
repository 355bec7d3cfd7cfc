//! plex_mate dispatcher: one scan per event path, plus a matching remove
//! for the source side of a move.

use crate::clients::Flaskfarm;
use crate::dispatch::{DispatchError, Dispatcher};
use async_trait::async_trait;
use dc_events::event::{Action, ActivityEvent};
use dc_events::mapping::Mappings;
use dc_events::paths;
use serde::Deserialize;

const INFO_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

#[derive(Debug, Deserialize)]
pub struct PlexmateConfig {
    pub url: String,
    pub apikey: String,
    #[serde(default)]
    pub mappings: Vec<String>,
}

pub struct PlexmateDispatcher {
    flaskfarm: Flaskfarm,
    mappings: Mappings,
}

impl PlexmateDispatcher {
    #[must_use]
    pub fn new(config: PlexmateConfig) -> Self {
        PlexmateDispatcher {
            flaskfarm: Flaskfarm::new(&config.url, &config.apikey),
            mappings: Mappings::parse(&config.mappings),
        }
    }
}

fn remove_mode(is_folder: bool) -> &'static str {
    if is_folder { "REMOVE_FOLDER" } else { "REMOVE_FILE" }
}

#[async_trait]
impl Dispatcher for PlexmateDispatcher {
    fn name(&self) -> &'static str {
        "plexmate"
    }

    async fn dispatch(&self, event: &ActivityEvent) -> Result<(), DispatchError> {
        let target = self.mappings.apply(&event.path);
        let is_info = paths::extension(&target)
            .is_some_and(|ext| INFO_EXTENSIONS.contains(&ext.as_str()));
        let mode = if is_info {
            "REFRESH"
        } else if event.action == Action::Delete {
            remove_mode(event.is_folder)
        } else {
            "ADD"
        };

        let mut scans = vec![(target, mode)];
        if !event.removed_path.is_empty() {
            scans.push((
                self.mappings.apply(&event.removed_path),
                remove_mode(event.is_folder),
            ));
        }
        for (target, mode) in scans {
            self.flaskfarm.plexmate_scan(&target, mode).await;
        }
        Ok(())
    }
}
