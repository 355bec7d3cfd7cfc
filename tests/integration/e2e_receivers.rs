//! Receiver-facing harness: buffered dispatchers against an in-process
//! mock Kavita server.
//!
//! # Coverage
//! - Buffered coalescing: five sibling creates produce exactly one
//!   scan-folder call, with the mapped parent as the folder path.
//! - 401 handling: a rejected scan re-authenticates once and retries.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use dc_events::event::{Action, ActionDetail, ActivityEvent, TargetInfo};
use poller::config::DispatcherSpec;
use poller::dispatch;
use serde_json::json;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Mock Kavita
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockKavita {
    auth_calls: Mutex<usize>,
    scan_bodies: Mutex<Vec<serde_json::Value>>,
    /// Statuses to answer scans with; empty means 200.
    scan_statuses: Mutex<VecDeque<u16>>,
}

async fn authenticate(State(state): State<Arc<MockKavita>>) -> Json<serde_json::Value> {
    *state.auth_calls.lock().unwrap() += 1;
    Json(json!({"token": "fresh-token", "refreshToken": "r"}))
}

async fn scan_folder(
    State(state): State<Arc<MockKavita>>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    state.scan_bodies.lock().unwrap().push(body);
    let status = state
        .scan_statuses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(200);
    StatusCode::from_u16(status).unwrap_or(StatusCode::OK)
}

async fn start_mock_kavita(state: Arc<MockKavita>) -> SocketAddr {
    let app = Router::new()
        .route("/api/Plugin/authenticate", post(authenticate))
        .route("/api/Library/scan-folder", post(scan_folder))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock kavita died");
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    addr
}

// ---------------------------------------------------------------------------
// Harness helpers
// ---------------------------------------------------------------------------

fn kavita_spec(addr: SocketAddr, buffer_interval: u64) -> DispatcherSpec {
    let options: serde_yaml::Value = serde_yaml::from_str(&format!(
        r"
class: KavitaDispatcher
url: 'http://{addr}'
apikey: test-key
mappings:
  - '/MOVIES:/library'
"
    ))
    .unwrap();
    DispatcherSpec {
        class: "KavitaDispatcher".to_owned(),
        buffer_interval,
        options,
    }
}

fn create_event(id: u32, path: &str) -> ActivityEvent {
    let mut event = ActivityEvent::new(
        json!({"id": id}),
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, id).unwrap(),
        TargetInfo::new(
            path.rsplit('/').next().unwrap(),
            Some(format!("items/F{id}")),
            Some("video/x-matroska".to_owned()),
        ),
        Action::Create,
        ActionDetail::Note("new".to_owned()),
    );
    event.path = path.to_owned();
    event
}

async fn wait_for_scans(state: &MockKavita, count: usize, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if state.scan_bodies.lock().unwrap().len() >= count {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn burst_of_siblings_coalesces_into_one_scan() {
    let state = Arc::new(MockKavita::default());
    let addr = start_mock_kavita(Arc::clone(&state)).await;
    let dispatcher = dispatch::build(&kavita_spec(addr, 1)).unwrap();

    dispatcher.start().await;
    for id in 0..5 {
        let event = create_event(id, &format!("/MOVIES/series/{id}.mkv"));
        dispatcher.dispatch(&event).await.unwrap();
    }
    assert!(wait_for_scans(&state, 1, Duration::from_secs(5)).await);
    dispatcher.stop().await;

    let bodies = state.scan_bodies.lock().unwrap().clone();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["folderPath"], "/library/series");
    assert_eq!(bodies[0]["apiKey"], "test-key");
}

#[tokio::test]
async fn rejected_scan_reauthenticates_once_and_retries() {
    let state = Arc::new(MockKavita::default());
    state.scan_statuses.lock().unwrap().push_back(401);
    let addr = start_mock_kavita(Arc::clone(&state)).await;
    let dispatcher = dispatch::build(&kavita_spec(addr, 1)).unwrap();

    dispatcher.start().await;
    dispatcher
        .dispatch(&create_event(1, "/MOVIES/series/1.mkv"))
        .await
        .unwrap();
    assert!(wait_for_scans(&state, 2, Duration::from_secs(5)).await);
    dispatcher.stop().await;

    // One 401, one re-auth, one successful retry; no further attempts.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(*state.auth_calls.lock().unwrap(), 1);
    assert_eq!(state.scan_bodies.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn duplicate_events_flush_once() {
    let state = Arc::new(MockKavita::default());
    let addr = start_mock_kavita(Arc::clone(&state)).await;
    let dispatcher = dispatch::build(&kavita_spec(addr, 1)).unwrap();

    dispatcher.start().await;
    let event = create_event(7, "/MOVIES/series/7.mkv");
    dispatcher.dispatch(&event).await.unwrap();
    dispatcher.dispatch(&event).await.unwrap();
    assert!(wait_for_scans(&state, 1, Duration::from_secs(5)).await);
    dispatcher.stop().await;

    assert_eq!(state.scan_bodies.lock().unwrap().len(), 1);
}
