//! The activity poller: one poll loop per watched target, one dispatch
//! loop draining the shared timestamp-ordered queue.
//!
//! Poll loops only normalise and enqueue — every enrichment decision
//! (folder detection, path resolution, link synthesis, move sources,
//! pattern filtering) happens after dequeue, so the queue carries the raw
//! record untouched.  The watermark advances to the window's end exactly
//! when the window produced activity, and never on a transport failure,
//! so a failed iteration retries the same window.

use crate::activity;
use crate::config::{ConfigError, PollerSettings};
use crate::dispatch::Dispatcher;
use crate::drive::{ActivityQuery, DriveApi};
use crate::resolver::{PathResolver, Resolved};
use chrono::{DateTime, Duration as ChronoDuration, Local, Utc};
use dc_events::event::{Action, ActionDetail, ActivityEvent};
use dc_events::paths;
use dc_events::pattern::PatternSet;
use dc_events::queue::EventQueue;
use dc_events::target::WatchTarget;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;

/// Concurrent metadata fetches during enrichment; caps pressure on the
/// provider quota under a burst.
const ENRICH_CONCURRENCY: usize = 5;

/// Per-target poll state.  Owned by the target's poll loop; nothing else
/// mutates it.
struct TargetState {
    /// Upper bound already delivered; monotone non-decreasing.
    last_activity: DateTime<Utc>,
    /// Wall clock of the last "no activity" report.
    last_silence_report: Instant,
}

pub struct ActivityPoller {
    settings: PollerSettings,
    drive: Arc<dyn DriveApi>,
    resolver: Arc<PathResolver>,
    dispatchers: Vec<Arc<dyn Dispatcher>>,
    actions: HashSet<Action>,
    patterns: PatternSet,
    queue: Arc<Mutex<EventQueue>>,
    semaphore: Semaphore,
    stop: watch::Sender<bool>,
    tasks: tokio::sync::Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl ActivityPoller {
    pub fn new(
        settings: PollerSettings,
        drive: Arc<dyn DriveApi>,
        resolver: Arc<PathResolver>,
        dispatchers: Vec<Arc<dyn Dispatcher>>,
    ) -> Result<Self, ConfigError> {
        let patterns = PatternSet::new(&settings.patterns, &settings.ignore_patterns)
            .map_err(|e| ConfigError::InvalidValue(format!("pattern: {e}")))?;
        let actions = settings.actions.iter().copied().collect();
        let (stop, _) = watch::channel(false);
        Ok(ActivityPoller {
            settings,
            drive,
            resolver,
            dispatchers,
            actions,
            patterns,
            queue: Arc::new(Mutex::new(EventQueue::new())),
            semaphore: Semaphore::new(ENRICH_CONCURRENCY),
            stop,
            tasks: tokio::sync::Mutex::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    fn target_label(target: &WatchTarget) -> &str {
        target.root_label.as_deref().unwrap_or(&target.id)
    }

    /// Bring up the dispatch loop, one poll loop per target, and every
    /// dispatcher.  Idempotent while the loops are running.
    pub async fn start(self: &Arc<Self>) {
        self.stop.send_replace(false);
        let mut tasks = self.tasks.lock().await;
        if tasks.iter().any(|(_, t)| !t.is_finished()) {
            return;
        }
        tasks.clear();
        for dispatcher in &self.dispatchers {
            dispatcher.start().await;
        }
        let this = Arc::clone(self);
        tasks.push((
            format!("dispatching-{}", self.name()),
            tokio::spawn(async move { this.dispatch_loop().await }),
        ));
        for target in self.settings.targets.clone() {
            let this = Arc::clone(self);
            let name = format!("polling-{}", Self::target_label(&target));
            tasks.push((
                name,
                tokio::spawn(async move { this.poll_loop(target).await }),
            ));
        }
        tracing::info!(poller = %self.name(), tasks = tasks.len(), "poller started");
    }

    /// Signal stop, stop the dispatchers, settle every task.  Tasks that
    /// do not unwind promptly are aborted; their errors are collected,
    /// never raised.
    pub async fn stop(&self) {
        self.stop.send_replace(true);
        for dispatcher in &self.dispatchers {
            dispatcher.stop().await;
        }
        let mut tasks = self.tasks.lock().await;
        for (name, mut task) in tasks.drain(..) {
            if tokio::time::timeout(Duration::from_secs(2), &mut task)
                .await
                .is_err()
            {
                task.abort();
                let _ = task.await;
                tracing::warn!(task = %name, "task aborted on stop");
            }
        }
        tracing::info!(poller = %self.name(), "poller stopped");
    }

    /// Log the liveness of every task; used by the supervisor watchdog.
    pub async fn report_health(&self) {
        let tasks = self.tasks.lock().await;
        let finished = tasks.iter().filter(|(_, t)| t.is_finished()).count();
        let queued = self.queue.lock().expect("queue poisoned").len();
        tracing::info!(
            poller = %self.name(),
            tasks = tasks.len(),
            finished,
            queued,
            "poller health"
        );
        for (name, _) in tasks.iter().filter(|(_, t)| t.is_finished()) {
            tracing::warn!(task = %name, "task is no longer running");
        }
    }

    // -----------------------------------------------------------------
    // Polling
    // -----------------------------------------------------------------

    async fn poll_loop(&self, target: WatchTarget) {
        tracing::info!(ancestor = %target.id, "polling task starts");
        let mut stop = self.stop.subscribe();
        let mut state = TargetState {
            last_activity: Utc::now()
                - ChronoDuration::seconds(self.settings.polling_delay as i64),
            last_silence_report: Instant::now(),
        };
        loop {
            self.poll_once(&target, &mut state).await;
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(self.settings.polling_interval)) => {}
                _ = stop.changed() => {}
            }
            if *stop.borrow() {
                break;
            }
        }
        tracing::info!(ancestor = %target.id, "polling task ends");
    }

    /// One poll window, paged to exhaustion.
    async fn poll_once(&self, target: &WatchTarget, state: &mut TargetState) {
        let stop = self.stop.subscribe();
        let mut page_token: Option<String> = None;
        loop {
            if *stop.borrow() {
                return;
            }
            let start = state.last_activity;
            let end = Utc::now() - ChronoDuration::seconds(self.settings.polling_delay as i64);
            let query = ActivityQuery {
                ancestor_id: target.id.clone(),
                page_size: self.settings.page_size,
                page_token: page_token.take(),
                start_ms: start.timestamp_millis(),
                end_ms: end.timestamp_millis(),
            };
            let page = match self.drive.query_activities(&query).await {
                Ok(page) => page,
                Err(error) => {
                    // Watermark untouched: the next interval retries this
                    // window.
                    tracing::error!(ancestor = %target.id, %error, "polling failed");
                    return;
                }
            };
            page_token = page.next_page_token;
            if page.activities.is_empty() {
                let interval = self.settings.task_check_interval;
                if interval > 0
                    && state.last_silence_report.elapsed() > Duration::from_secs(interval as u64)
                {
                    tracing::debug!(
                        ancestor = %Self::target_label(target),
                        since = %start,
                        "no activity"
                    );
                    state.last_silence_report = Instant::now();
                }
                return;
            }
            state.last_activity = end;
            for raw in &page.activities {
                let Some(mut event) = activity::normalize(raw) else {
                    continue;
                };
                event.ancestor_id = target.id.clone();
                event.root_label = target.root_label.clone();
                event.poller = self.name().to_owned();
                tracing::info!(
                    action = %event.action,
                    title = %event.target.title,
                    at = %event.timestamp,
                    ancestor = %Self::target_label(target),
                    "activity"
                );
                self.queue.lock().expect("queue poisoned").push(event);
            }
            if page_token.is_none() {
                return;
            }
            // More pages: continue immediately, no interval sleep.
        }
    }

    // -----------------------------------------------------------------
    // Dispatching
    // -----------------------------------------------------------------

    async fn dispatch_loop(&self) {
        tracing::info!(poller = %self.name(), "dispatching task starts");
        let mut stop = self.stop.subscribe();
        loop {
            if *stop.borrow() {
                break;
            }
            let event = self.queue.lock().expect("queue poisoned").pop();
            match event {
                Some(event) => self.process(event).await,
                None => {
                    tokio::select! {
                        () = tokio::time::sleep(Duration::from_secs(self.settings.dispatch_interval.max(1))) => {}
                        _ = stop.changed() => {}
                    }
                }
            }
        }
        tracing::info!(poller = %self.name(), "dispatching task ends");
    }

    async fn resolve_gated(&self, item_id: &str, event: &ActivityEvent) -> Option<Resolved> {
        let _permit = self.semaphore.acquire().await.ok()?;
        self.resolver
            .resolve(item_id, &event.ancestor_id, event.root_label.as_deref())
            .await
    }

    /// Enrich one dequeued event and fan it out.
    async fn process(&self, mut event: ActivityEvent) {
        if !self.actions.contains(&event.action) {
            tracing::debug!(title = %event.target.title, action = %event.action, "skipped: action");
            return;
        }
        event.is_folder = event.target.is_folder_mime();
        if self.settings.ignore_folder && event.is_folder {
            tracing::debug!(title = %event.target.title, "skipped: folder");
            return;
        }
        // Permanently deleted items have no resolvable path left.
        if event.action == Action::Delete && event.action_detail.note() != Some("TRASH") {
            tracing::debug!(title = %event.target.title, "skipped: deleted permanently");
            return;
        }

        let item_id = event.target.item_id().to_owned();
        match self.resolve_gated(&item_id, &event).await {
            Some(resolved) => {
                event.size = resolved.size;
                if resolved.parent.name.is_empty() {
                    tracing::warn!(
                        item_id,
                        ancestor = %event.ancestor_id,
                        "could not figure out its path"
                    );
                    event.path = format!("/unknown/{}", event.target.title);
                } else {
                    event.path = resolved.path;
                }
                event.parent = resolved.parent;
                event.link = resolved
                    .web_link
                    .map(|link| link.trim().to_owned())
                    .unwrap_or_default();
            }
            None => {
                event.path = format!("/unknown/{}", event.target.title);
            }
        }
        if event.link.is_empty() {
            let folder_id = if event.is_folder {
                item_id.as_str()
            } else {
                event.parent.id.as_str()
            };
            event.link = format!("https://drive.google.com/drive/folders/{folder_id}");
        }

        match event.action {
            Action::Move => {
                if let Some(source) = event.action_detail.moved_from().cloned() {
                    tracing::debug!(from = %source.title, "moved from");
                    // A move from another ancestor resolves to nothing;
                    // the event then goes out without a removed path.
                    let source_parent = source.item_id().to_owned();
                    if let Some(resolved) = self.resolve_gated(&source_parent, &event).await {
                        event.removed_path = paths::join(&resolved.path, &event.target.title);
                    }
                }
            }
            Action::Rename => {
                if let Some(old_title) = event.action_detail.note() {
                    if !event.path.is_empty() {
                        event.removed_path = paths::with_file_name(&event.path, old_title);
                    }
                }
            }
            _ => {}
        }

        event.timestamp_text = event
            .timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%dT%H:%M:%S%z")
            .to_string();

        // Pattern filters apply to each side independently.
        if !event.path.is_empty() && !self.patterns.keeps(&event.path) {
            tracing::debug!(path = %event.path, "skipped: patterns");
            event.path.clear();
        }
        if !event.removed_path.is_empty() && !self.patterns.keeps(&event.removed_path) {
            tracing::debug!(removed_path = %event.removed_path, "skipped: patterns");
            event.removed_path.clear();
        }

        // Reconcile: an event whose only surviving side is the removed
        // one becomes a synthetic delete; an event with neither side is
        // dropped.
        match (!event.path.is_empty(), !event.removed_path.is_empty()) {
            (true, _) => {}
            (false, true) => {
                event.path = std::mem::take(&mut event.removed_path);
                event.action = Action::Delete;
                if let Some(source) = event.action_detail.moved_from() {
                    event.link = format!(
                        "https://drive.google.com/drive/folders/{}",
                        source.item_id()
                    );
                }
                event.action_detail = ActionDetail::Note(format!(
                    "Moved but not accessible: {}",
                    event.target.name.as_deref().unwrap_or("unknown")
                ));
            }
            (false, false) => {
                tracing::info!(title = %event.target.title, "skipped: no applicable path");
                return;
            }
        }

        for dispatcher in &self.dispatchers {
            if let Err(error) = dispatcher.dispatch(&event).await {
                tracing::error!(
                    dispatcher = dispatcher.name(),
                    %error,
                    path = %event.path,
                    "dispatch failed"
                );
            }
        }
    }
}
