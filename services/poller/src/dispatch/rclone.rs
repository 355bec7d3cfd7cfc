//! Rclone dispatcher: keep the VFS metadata cache honest.
//!
//! Deletes only need the stale entry forgotten.  Everything else forgets
//! the removed side (if any), then forgets and re-refreshes the directory
//! containing the event so the receiver sees the new listing.

use crate::clients::{ClientError, Rclone};
use crate::dispatch::{DispatchError, Dispatcher};
use async_trait::async_trait;
use dc_events::event::{Action, ActivityEvent};
use dc_events::mapping::Mappings;
use dc_events::paths;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RcloneConfig {
    pub url: String,
    #[serde(default)]
    pub mappings: Vec<String>,
}

pub struct RcloneDispatcher {
    rclone: Rclone,
    mappings: Mappings,
}

impl RcloneDispatcher {
    pub fn new(config: RcloneConfig) -> Result<Self, ClientError> {
        Ok(RcloneDispatcher {
            rclone: Rclone::new(&config.url)?,
            mappings: Mappings::parse(&config.mappings),
        })
    }
}

#[async_trait]
impl Dispatcher for RcloneDispatcher {
    fn name(&self) -> &'static str {
        "rclone"
    }

    async fn start(&self) {
        let (dirs, files) = self.rclone.metadata_cache().await;
        tracing::info!(dirs, files, "rclone VFS metadata cache");
    }

    async fn dispatch(&self, event: &ActivityEvent) -> Result<(), DispatchError> {
        let path = self.mappings.apply(&event.path);
        if event.action == Action::Delete {
            self.rclone.forget(&path, event.is_folder).await;
            return Ok(());
        }
        if !event.removed_path.is_empty() {
            let removed = self.mappings.apply(&event.removed_path);
            self.rclone.forget(&removed, event.is_folder).await;
        }
        let dir = if event.is_folder {
            path
        } else {
            paths::parent_dir(&path).to_owned()
        };
        self.rclone.forget(&dir, true).await;
        self.rclone.refresh(&dir, false).await;
        Ok(())
    }
}
