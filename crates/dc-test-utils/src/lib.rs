// dc-test-utils: scripted backends for the integration suites.
//
// `FakeDrive` stands in for the provider: activity pages are queued per
// ancestor and file metadata comes from an in-memory table.  The
// `RecordingDispatcher` captures delivered events for assertions.

use async_trait::async_trait;
use poller::dispatch::{DispatchError, Dispatcher};
use poller::drive::{ActivityPage, ActivityQuery, DriveApi, DriveError, DriveFile};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

// ---------------------------------------------------------------------------
// FakeDrive
// ---------------------------------------------------------------------------

/// Scripted Drive backend.
///
/// `push_page` queues one activity page for an ancestor; queries drain the
/// queue in order and answer empty pages once it runs dry.  Files are
/// served from the table loaded with `insert_file`.
#[derive(Default)]
pub struct FakeDrive {
    pages: Mutex<HashMap<String, VecDeque<Result<ActivityPage, DriveError>>>>,
    files: Mutex<HashMap<String, DriveFile>>,
}

impl FakeDrive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_page(&self, ancestor_id: &str, page: ActivityPage) {
        self.pages
            .lock()
            .unwrap()
            .entry(ancestor_id.to_owned())
            .or_default()
            .push_back(Ok(page));
    }

    pub fn push_activities(&self, ancestor_id: &str, activities: Vec<serde_json::Value>) {
        self.push_page(
            ancestor_id,
            ActivityPage {
                activities,
                next_page_token: None,
            },
        );
    }

    pub fn push_error(&self, ancestor_id: &str, error: DriveError) {
        self.pages
            .lock()
            .unwrap()
            .entry(ancestor_id.to_owned())
            .or_default()
            .push_back(Err(error));
    }

    pub fn insert_file(&self, file: DriveFile) {
        self.files.lock().unwrap().insert(file.id.clone(), file);
    }

    /// Load a chain of `(id, name, parent)` entries in one call.
    pub fn insert_tree(&self, entries: &[(&str, &str, Option<&str>)]) {
        for (id, name, parent) in entries {
            self.insert_file(DriveFile {
                id: (*id).to_owned(),
                name: (*name).to_owned(),
                parents: parent.map(|p| vec![p.to_owned()]).unwrap_or_default(),
                mime_type: None,
                web_view_link: None,
                size: 0,
            });
        }
    }
}

#[async_trait]
impl DriveApi for FakeDrive {
    async fn query_activities(&self, query: &ActivityQuery) -> Result<ActivityPage, DriveError> {
        self.pages
            .lock()
            .unwrap()
            .get_mut(&query.ancestor_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(ActivityPage::default()))
    }

    async fn get_file(&self, item_id: &str) -> Result<DriveFile, DriveError> {
        self.files
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .ok_or(DriveError::Http {
                status: 404,
                url: format!("files/{item_id}"),
                reason: "not found".to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// RecordingDispatcher
// ---------------------------------------------------------------------------

/// Captures every delivered event.
#[derive(Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<dc_events::event::ActivityEvent>>,
}

impl RecordingDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn received(&self) -> Vec<dc_events::event::ActivityEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Poll until `count` events arrived or `timeout` elapsed.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.events.lock().unwrap().len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn dispatch(
        &self,
        event: &dc_events::event::ActivityEvent,
    ) -> Result<(), DispatchError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
