//! Generic coalescing wrapper for per-parent receivers.
//!
//! `dispatch` never touches the receiver: a move/rename event is split
//! into its delete side (`path` = the removed path) and its keep side,
//! and both land in the folder buffer.  The flush loop wakes every
//! `buffer_interval` seconds and drains at most the number of parents
//! present at the start of the tick, so a continuous stream of new
//! parents cannot starve the interval; each parent is handed to the sink
//! once and discarded whatever the outcome (at-most-once).

use crate::dispatch::{DispatchError, Dispatcher};
use async_trait::async_trait;
use dc_events::buffer::FolderBuffer;
use dc_events::event::{Action, ActivityEvent};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The receiver-specific half of a buffered dispatcher.
#[async_trait]
pub trait FlushSink: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Deliver one parent's accumulated events.
    async fn flush(&self, parent: &str, events: &[ActivityEvent]) -> Result<(), DispatchError>;
}

pub struct Buffered<S: FlushSink> {
    sink: Arc<S>,
    interval: Duration,
    buffer: Arc<Mutex<FolderBuffer>>,
    stop: watch::Sender<bool>,
    flush_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<S: FlushSink> Buffered<S> {
    pub fn new(sink: S, buffer_interval_secs: u64) -> Self {
        let (stop, _) = watch::channel(false);
        Buffered {
            sink: Arc::new(sink),
            interval: Duration::from_secs(buffer_interval_secs.max(1)),
            buffer: Arc::new(Mutex::new(FolderBuffer::new())),
            stop,
            flush_task: tokio::sync::Mutex::new(None),
        }
    }

    /// Parents currently buffered; used by health reporting and tests.
    #[must_use]
    pub fn pending_parents(&self) -> usize {
        self.buffer.lock().expect("folder buffer poisoned").len()
    }
}

#[async_trait]
impl<S: FlushSink> Dispatcher for Buffered<S> {
    fn name(&self) -> &'static str {
        self.sink.name()
    }

    async fn start(&self) {
        self.stop.send_replace(false);
        let mut task = self.flush_task.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        *task = Some(tokio::spawn(flush_loop(
            Arc::clone(&self.sink),
            Arc::clone(&self.buffer),
            self.interval,
            self.stop.subscribe(),
        )));
    }

    async fn stop(&self) {
        self.stop.send_replace(true);
        if let Some(mut task) = self.flush_task.lock().await.take() {
            // A sink stuck mid-flush must not hold shutdown hostage.
            if tokio::time::timeout(Duration::from_secs(1), &mut task)
                .await
                .is_err()
            {
                task.abort();
                let _ = task.await;
            }
        }
    }

    async fn dispatch(&self, event: &ActivityEvent) -> Result<(), DispatchError> {
        let mut buffer = self.buffer.lock().expect("folder buffer poisoned");
        if !event.removed_path.is_empty() {
            let mut removed = event.clone();
            removed.action = Action::Delete;
            removed.path = event.removed_path.clone();
            removed.removed_path.clear();
            buffer.put(removed);
        }
        let mut kept = event.clone();
        kept.removed_path.clear();
        buffer.put(kept);
        Ok(())
    }
}

async fn flush_loop<S: FlushSink>(
    sink: Arc<S>,
    buffer: Arc<Mutex<FolderBuffer>>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    tracing::debug!(sink = sink.name(), "flush loop starts");
    loop {
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            _ = stop.changed() => {}
        }
        if *stop.borrow() {
            break;
        }
        // Snapshot the tick's workload; parents arriving mid-drain wait
        // for the next tick.
        let pending = buffer.lock().expect("folder buffer poisoned").len();
        for _ in 0..pending {
            if *stop.borrow() {
                return;
            }
            let item = buffer.lock().expect("folder buffer poisoned").pop();
            let Some((parent, events)) = item else {
                break;
            };
            if let Err(error) = sink.flush(&parent, &events).await {
                tracing::warn!(sink = sink.name(), parent, %error, "buffered flush failed");
            }
        }
    }
    tracing::debug!(sink = sink.name(), "flush loop ends");
}
