//! Aggregating sink: one buffered front coalesces for several receivers.
//!
//! Per flushed parent: the effective deleted-target set is computed once
//! (same file/folder collapse rule as the broadcast sinks), then every
//! sub-receiver gets its job — rclone subs forget the deletes and refresh
//! the parent, plex subs scan the parent or each child folder, and the
//! jellyfin/kavita/stash subs receive the buffered entry as-is.  All jobs
//! for one parent run concurrently and join before the next parent.

use crate::clients::ClientError;
use crate::dispatch::buffered::FlushSink;
use crate::dispatch::jellyfin::{JellyfinConfig, JellyfinSink};
use crate::dispatch::kavita::{KavitaConfig, KavitaSink};
use crate::dispatch::plex::{PlexConfig, PlexDispatcher};
use crate::dispatch::rclone::{RcloneConfig, RcloneDispatcher};
use crate::dispatch::stash::{StashConfig, StashSink};
use crate::dispatch::{DispatchError, Dispatcher};
use async_trait::async_trait;
use chrono::Utc;
use dc_events::event::{Action, ActionDetail, ActivityEvent, TargetInfo};
use dc_events::paths;
use futures::future::BoxFuture;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct MultiServerConfig {
    #[serde(default)]
    pub rclones: Vec<RcloneConfig>,
    #[serde(default)]
    pub plexes: Vec<PlexConfig>,
    #[serde(default)]
    pub jellyfins: Vec<JellyfinConfig>,
    #[serde(default)]
    pub kavitas: Vec<KavitaConfig>,
    #[serde(default)]
    pub stashes: Vec<StashConfig>,
}

pub struct MultiSink {
    rclones: Vec<RcloneDispatcher>,
    plexes: Vec<PlexDispatcher>,
    jellyfins: Vec<JellyfinSink>,
    kavitas: Vec<KavitaSink>,
    stashes: Vec<StashSink>,
}

impl MultiSink {
    pub fn new(config: MultiServerConfig) -> Result<Self, ClientError> {
        Ok(MultiSink {
            rclones: config
                .rclones
                .into_iter()
                .map(RcloneDispatcher::new)
                .collect::<Result<_, _>>()?,
            plexes: config.plexes.into_iter().map(PlexDispatcher::new).collect(),
            jellyfins: config
                .jellyfins
                .into_iter()
                .map(JellyfinSink::new)
                .collect(),
            kavitas: config.kavitas.into_iter().map(KavitaSink::new).collect(),
            stashes: config.stashes.into_iter().map(StashSink::new).collect(),
        })
    }
}

/// Synthetic directory event handed to sub-dispatchers.
fn folder_event(path: &str, action: Action) -> ActivityEvent {
    let mut event = ActivityEvent::new(
        serde_json::Value::Null,
        Utc::now(),
        TargetInfo::default(),
        action,
        ActionDetail::None,
    );
    event.path = path.to_owned();
    event.is_folder = true;
    event
}

/// Deleted-target collapse shared with the broadcast planning: several
/// deletions including a file mean the parent itself, else each child.
fn deleted_targets(parent: &str, events: &[ActivityEvent]) -> Vec<String> {
    let deletes: Vec<&ActivityEvent> = events
        .iter()
        .filter(|e| e.action == Action::Delete)
        .collect();
    if deletes.is_empty() {
        return Vec::new();
    }
    let has_file = deletes.iter().any(|e| !e.is_folder);
    if has_file && deletes.len() > 1 {
        vec![parent.to_owned()]
    } else {
        deletes
            .iter()
            .map(|e| paths::join(parent, paths::file_name(&e.path)))
            .collect()
    }
}

#[async_trait]
impl FlushSink for MultiSink {
    fn name(&self) -> &'static str {
        "multi_server"
    }

    async fn flush(&self, parent: &str, events: &[ActivityEvent]) -> Result<(), DispatchError> {
        let deleted = deleted_targets(parent, events);
        let folders = crate::dispatch::kavita::scan_folders(parent, events);

        let mut jobs: Vec<BoxFuture<'_, ()>> = Vec::new();
        for rclone in &self.rclones {
            let deleted = deleted.clone();
            jobs.push(Box::pin(async move {
                for target in &deleted {
                    if let Err(error) = rclone.dispatch(&folder_event(target, Action::Delete)).await
                    {
                        tracing::warn!(%error, path = %target, "multi: rclone delete failed");
                    }
                }
                let refresh = folder_event(parent, Action::Edit);
                if let Err(error) = rclone.dispatch(&refresh).await {
                    tracing::warn!(%error, parent, "multi: rclone refresh failed");
                }
            }));
        }
        for plex in &self.plexes {
            let folders = folders.clone();
            jobs.push(Box::pin(async move {
                for folder in &folders {
                    if let Err(error) = plex.dispatch(&folder_event(folder, Action::Edit)).await {
                        tracing::warn!(%error, folder, "multi: plex scan failed");
                    }
                }
            }));
        }
        for sink in &self.jellyfins {
            jobs.push(Box::pin(forward_entry(sink, parent, events)));
        }
        for sink in &self.kavitas {
            jobs.push(Box::pin(forward_entry(sink, parent, events)));
        }
        for sink in &self.stashes {
            jobs.push(Box::pin(forward_entry(sink, parent, events)));
        }

        // The whole parent completes before the caller moves on.
        futures::future::join_all(jobs).await;
        Ok(())
    }
}

async fn forward_entry<S: FlushSink>(sink: &S, parent: &str, events: &[ActivityEvent]) {
    if let Err(error) = sink.flush(parent, events).await {
        tracing::warn!(sink = sink.name(), %error, parent, "multi: flush failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_event(id: u32, path: &str, action: Action, is_folder: bool) -> ActivityEvent {
        let mut event = ActivityEvent::new(
            serde_json::json!({"id": id}),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            TargetInfo::default(),
            action,
            ActionDetail::None,
        );
        event.path = path.to_owned();
        event.is_folder = is_folder;
        event
    }

    #[test]
    fn deleted_targets_collapse_like_broadcasts() {
        let events = vec![
            make_event(1, "/p/a.mkv", Action::Delete, false),
            make_event(2, "/p/sub", Action::Delete, true),
        ];
        assert_eq!(deleted_targets("/p", &events), vec!["/p"]);

        let single = vec![make_event(1, "/p/a.mkv", Action::Delete, false)];
        assert_eq!(deleted_targets("/p", &single), vec!["/p/a.mkv"]);

        let none = vec![make_event(1, "/p/a.mkv", Action::Create, false)];
        assert!(deleted_targets("/p", &none).is_empty());
    }

    #[test]
    fn empty_config_builds_an_empty_sink() {
        let sink = MultiSink::new(MultiServerConfig::default()).unwrap();
        assert!(sink.rclones.is_empty());
        assert!(sink.plexes.is_empty());
    }
}
