//! End-to-end pipeline harness: scripted Drive -> poller -> recording
//! dispatcher.
//!
//! The provider is a `FakeDrive` loaded with activity pages and a file
//! table; the poller runs for real (poll loop, queue, dispatch loop,
//! enrichment) and delivers into a `RecordingDispatcher`.
//!
//! # Coverage
//! - Single file create: path, link, folder flag, size.
//! - Move across directories: removed path from the source parent.
//! - Rename: removed path from the old title.
//! - Permanent delete: dropped before any dispatcher runs.

use dc_events::event::Action;
use dc_test_utils::{FakeDrive, RecordingDispatcher};
use poller::config::PollerSettings;
use poller::dispatch::Dispatcher;
use poller::poller::ActivityPoller;
use poller::resolver::PathResolver;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const ANCESTOR: &str = "AncestorAncestorAncestor01";

// ---------------------------------------------------------------------------
// Harness helpers
// ---------------------------------------------------------------------------

fn settings() -> PollerSettings {
    PollerSettings {
        name: "e2e".to_owned(),
        targets: vec![format!("{ANCESTOR}#MOVIES").parse().unwrap()],
        dispatchers: Vec::new(),
        polling_interval: 1,
        polling_delay: 0,
        dispatch_interval: 1,
        task_check_interval: -1,
        page_size: 100,
        ignore_folder: true,
        patterns: Vec::new(),
        ignore_patterns: Vec::new(),
        actions: Action::ALL.to_vec(),
        buffer_interval: 30,
    }
}

fn start_pipeline(
    drive: Arc<FakeDrive>,
) -> (Arc<ActivityPoller>, Arc<RecordingDispatcher>) {
    let resolver = Arc::new(PathResolver::new(
        drive.clone(),
        None,
        Duration::from_secs(600),
    ));
    let recording = Arc::new(RecordingDispatcher::new());
    let poller = Arc::new(
        ActivityPoller::new(
            settings(),
            drive,
            resolver,
            vec![recording.clone() as Arc<dyn Dispatcher>],
        )
        .unwrap(),
    );
    (poller, recording)
}

fn movie_tree(drive: &FakeDrive) {
    drive.insert_tree(&[
        ("FID", "m.mkv", Some("DID")),
        ("DID", "dir", Some(ANCESTOR)),
        (ANCESTOR, "watched", None),
    ]);
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_file_create_is_delivered_enriched() {
    let drive = Arc::new(FakeDrive::new());
    movie_tree(&drive);
    drive.push_activities(
        ANCESTOR,
        vec![json!({
            "timestamp": "2024-01-01T00:00:00Z",
            "primaryActionDetail": {"create": {"new": {}}},
            "targets": [{"driveItem": {
                "title": "m.mkv",
                "name": "items/FID",
                "mimeType": "video/x-matroska",
            }}],
        })],
    );

    let (poller, recording) = start_pipeline(drive);
    poller.start().await;
    assert!(recording.wait_for(1, Duration::from_secs(5)).await);
    poller.stop().await;

    let events = recording.received();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.action, Action::Create);
    assert_eq!(event.path, "/MOVIES/dir/m.mkv");
    assert!(!event.is_folder);
    assert_eq!(event.link, "https://drive.google.com/drive/folders/DID");
    assert_eq!(event.poller, "e2e");
}

#[tokio::test]
async fn move_across_directories_carries_both_sides() {
    let drive = Arc::new(FakeDrive::new());
    drive.insert_tree(&[
        ("FID", "m.mkv", Some("NEWD")),
        ("NEWD", "new", Some(ANCESTOR)),
        ("OPID", "old", Some(ANCESTOR)),
        (ANCESTOR, "watched", None),
    ]);
    drive.push_activities(
        ANCESTOR,
        vec![json!({
            "timestamp": "2024-01-01T00:00:00Z",
            "primaryActionDetail": {"move": {"removedParents": [
                {"driveItem": {
                    "title": "old",
                    "name": "items/OPID",
                    "mimeType": "application/vnd.google-apps.folder",
                }},
            ]}},
            "targets": [{"driveItem": {
                "title": "m.mkv",
                "name": "items/FID",
                "mimeType": "video/x-matroska",
            }}],
        })],
    );

    let (poller, recording) = start_pipeline(drive);
    poller.start().await;
    assert!(recording.wait_for(1, Duration::from_secs(5)).await);
    poller.stop().await;

    let events = recording.received();
    assert_eq!(events[0].path, "/MOVIES/new/m.mkv");
    assert_eq!(events[0].removed_path, "/MOVIES/old/m.mkv");
    assert_eq!(events[0].action, Action::Move);
}

#[tokio::test]
async fn rename_derives_removed_path_from_old_title() {
    let drive = Arc::new(FakeDrive::new());
    drive.insert_tree(&[
        ("FID", "new.mkv", Some("DID")),
        ("DID", "dir", Some(ANCESTOR)),
        (ANCESTOR, "watched", None),
    ]);
    drive.push_activities(
        ANCESTOR,
        vec![json!({
            "timestamp": "2024-01-01T00:00:00Z",
            "primaryActionDetail": {"rename": {"oldTitle": "old.mkv"}},
            "targets": [{"driveItem": {
                "title": "new.mkv",
                "name": "items/FID",
                "mimeType": "video/x-matroska",
            }}],
        })],
    );

    let (poller, recording) = start_pipeline(drive);
    poller.start().await;
    assert!(recording.wait_for(1, Duration::from_secs(5)).await);
    poller.stop().await;

    let events = recording.received();
    assert_eq!(events[0].path, "/MOVIES/dir/new.mkv");
    assert_eq!(events[0].removed_path, "/MOVIES/dir/old.mkv");
}

#[tokio::test]
async fn permanent_delete_reaches_no_dispatcher() {
    let drive = Arc::new(FakeDrive::new());
    movie_tree(&drive);
    drive.push_activities(
        ANCESTOR,
        vec![json!({
            "timestamp": "2024-01-01T00:00:00Z",
            "primaryActionDetail": {"delete": {"type": "PERMANENT_DELETE"}},
            "targets": [{"driveItem": {
                "title": "m.mkv",
                "name": "items/FID",
                "mimeType": "video/x-matroska",
            }}],
        })],
    );

    let (poller, recording) = start_pipeline(drive);
    poller.start().await;
    // Give the pipeline a couple of poll/dispatch cycles.
    assert!(!recording.wait_for(1, Duration::from_secs(3)).await);
    poller.stop().await;
    assert!(recording.received().is_empty());
}

#[tokio::test]
async fn events_are_dispatched_in_timestamp_order() {
    let drive = Arc::new(FakeDrive::new());
    movie_tree(&drive);
    // One page, deliberately out of order.
    let activity = |secs: u32| {
        json!({
            "timestamp": format!("2024-01-01T00:00:{secs:02}Z"),
            "primaryActionDetail": {"create": {"new": {}}},
            "targets": [{"driveItem": {
                "title": "m.mkv",
                "name": "items/FID",
                "mimeType": "video/x-matroska",
            }}],
        })
    };
    drive.push_activities(ANCESTOR, vec![activity(30), activity(10), activity(20)]);

    let (poller, recording) = start_pipeline(drive);
    poller.start().await;
    assert!(recording.wait_for(3, Duration::from_secs(5)).await);
    poller.stop().await;

    let stamps: Vec<_> = recording
        .received()
        .iter()
        .map(|e| e.timestamp)
        .collect();
    let mut sorted = stamps.clone();
    sorted.sort();
    assert_eq!(stamps, sorted);
}
