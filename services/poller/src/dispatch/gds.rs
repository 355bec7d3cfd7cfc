//! Flaskfarm broadcast sinks (gds_tool and the Flaskfarmaider bot).
//!
//! Both receivers take the same `(path, scan_mode)` broadcasts, so the
//! per-parent planning is shared and each sink only differs in the wire
//! call.

use crate::clients::{Flaskfarm, FlaskfarmaiderBot};
use crate::dispatch::DispatchError;
use crate::dispatch::buffered::FlushSink;
use async_trait::async_trait;
use dc_events::event::{Action, ActivityEvent};
use dc_events::mapping::Mappings;
use dc_events::paths;
use serde::Deserialize;

const ALLOWED_ACTIONS: [Action; 4] = [Action::Create, Action::Move, Action::Rename, Action::Restore];
const INFO_EXTENSIONS: [&str; 4] = ["json", "yaml", "yml", "nfo"];

/// Turn one parent's events into the broadcasts to issue, in order.
///
/// Deletes: several deletions including a file collapse into one
/// `REMOVE_FOLDER` on the parent (the receiver rescans it wholesale);
/// otherwise each deleted child gets its own `REMOVE_*`.  Non-deletes
/// produce at most one broadcast — files win over folders over info
/// files, and info files ask for `REFRESH` instead of `ADD`.  Folder
/// creations are dropped outright: the files arriving inside them carry
/// the information.
pub(crate) fn plan_broadcasts(
    parent: &str,
    events: &[ActivityEvent],
) -> Vec<(String, &'static str)> {
    let mut targets = Vec::new();

    let deletes: Vec<&ActivityEvent> = events
        .iter()
        .filter(|e| e.action == Action::Delete)
        .collect();
    if !deletes.is_empty() {
        let has_file = deletes.iter().any(|e| !e.is_folder);
        if has_file && deletes.len() > 1 {
            targets.push((parent.to_owned(), "REMOVE_FOLDER"));
            for event in &deletes {
                tracing::debug!(path = %event.path, "skipped: multiple items");
            }
        } else {
            for event in &deletes {
                targets.push((
                    paths::join(parent, paths::file_name(&event.path)),
                    if event.is_folder {
                        "REMOVE_FOLDER"
                    } else {
                        "REMOVE_FILE"
                    },
                ));
            }
        }
    }

    let mut files = Vec::new();
    let mut folders = Vec::new();
    let mut info_files = Vec::new();
    for event in events.iter().filter(|e| e.action != Action::Delete) {
        if !ALLOWED_ACTIONS.contains(&event.action) {
            tracing::warn!(action = %event.action, parent, "no applicable action");
            continue;
        }
        if event.action == Action::Create && event.is_folder {
            tracing::debug!(path = %event.path, "skipped: folder create");
            continue;
        }
        let target = paths::join(parent, paths::file_name(&event.path));
        let is_info = !event.is_folder
            && paths::extension(&target)
                .is_some_and(|ext| INFO_EXTENSIONS.contains(&ext.as_str()));
        if is_info {
            info_files.push((target, "REFRESH"));
        } else if event.is_folder {
            folders.push((target, "ADD"));
        } else {
            files.push((target, "ADD"));
        }
    }
    for (idx, target) in files
        .into_iter()
        .chain(folders)
        .chain(info_files)
        .enumerate()
    {
        if idx > 0 {
            tracing::debug!(path = %target.0, "skipped: multiple items");
            continue;
        }
        targets.push(target);
    }
    targets
}

// ---------------------------------------------------------------------------
// gds_tool
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GdsToolConfig {
    pub url: String,
    pub apikey: String,
    #[serde(default)]
    pub mappings: Vec<String>,
}

pub struct GdsToolSink {
    flaskfarm: Flaskfarm,
    mappings: Mappings,
}

impl GdsToolSink {
    #[must_use]
    pub fn new(config: GdsToolConfig) -> Self {
        GdsToolSink {
            flaskfarm: Flaskfarm::new(&config.url, &config.apikey),
            mappings: Mappings::parse(&config.mappings),
        }
    }
}

#[async_trait]
impl FlushSink for GdsToolSink {
    fn name(&self) -> &'static str {
        "gds_tool"
    }

    async fn flush(&self, parent: &str, events: &[ActivityEvent]) -> Result<(), DispatchError> {
        for (path, mode) in plan_broadcasts(parent, events) {
            self.flaskfarm
                .gds_broadcast(&self.mappings.apply(&path), mode)
                .await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Flaskfarmaider bot
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct FlaskfarmaiderConfig {
    pub url: String,
    pub apikey: String,
    #[serde(default)]
    pub mappings: Vec<String>,
}

pub struct FlaskfarmaiderSink {
    bot: FlaskfarmaiderBot,
    mappings: Mappings,
}

impl FlaskfarmaiderSink {
    #[must_use]
    pub fn new(config: FlaskfarmaiderConfig) -> Self {
        FlaskfarmaiderSink {
            bot: FlaskfarmaiderBot::new(&config.url, &config.apikey),
            mappings: Mappings::parse(&config.mappings),
        }
    }
}

#[async_trait]
impl FlushSink for FlaskfarmaiderSink {
    fn name(&self) -> &'static str {
        "flaskfarmaider"
    }

    async fn flush(&self, parent: &str, events: &[ActivityEvent]) -> Result<(), DispatchError> {
        for (path, mode) in plan_broadcasts(parent, events) {
            self.bot
                .broadcast(&self.mappings.apply(&path), mode)
                .await?;
        }
        Ok(())
    }
}
