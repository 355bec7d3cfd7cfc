//! Cancellation latency: stopping a buffered dispatcher mid-flush must
//! complete within its bound even when the receiver hangs.

use axum::Router;
use axum::routing::post;
use chrono::{TimeZone, Utc};
use dc_events::event::{Action, ActionDetail, ActivityEvent, TargetInfo};
use poller::config::DispatcherSpec;
use poller::dispatch;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

async fn start_hanging_receiver(entered: Arc<AtomicUsize>) -> SocketAddr {
    let app = Router::new()
        .route(
            "/api/Library/scan-folder",
            post(move || {
                let entered = Arc::clone(&entered);
                async move {
                    entered.fetch_add(1, Ordering::SeqCst);
                    // Never answers within the test's lifetime.
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    "late"
                }
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("receiver died");
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    addr
}

#[tokio::test]
async fn buffered_stop_completes_within_a_second_of_a_hung_receiver() {
    let entered = Arc::new(AtomicUsize::new(0));
    let addr = start_hanging_receiver(Arc::clone(&entered)).await;

    let options: serde_yaml::Value = serde_yaml::from_str(&format!(
        "{{class: KavitaDispatcher, url: 'http://{addr}', apikey: k}}"
    ))
    .unwrap();
    let dispatcher = dispatch::build(&DispatcherSpec {
        class: "KavitaDispatcher".to_owned(),
        buffer_interval: 1,
        options,
    })
    .unwrap();

    dispatcher.start().await;
    let mut event = ActivityEvent::new(
        json!({"id": 1}),
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        TargetInfo::new("x.mkv", None, None),
        Action::Create,
        ActionDetail::None,
    );
    event.path = "/lib/x.mkv".to_owned();
    dispatcher.dispatch(&event).await.unwrap();

    // Wait for the flush loop to enter the hung receiver call.
    let deadline = Instant::now() + Duration::from_secs(5);
    while entered.load(Ordering::SeqCst) == 0 {
        assert!(Instant::now() < deadline, "flush never reached the receiver");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let begin = Instant::now();
    dispatcher.stop().await;
    assert!(
        begin.elapsed() < Duration::from_millis(1500),
        "stop took {:?}",
        begin.elapsed()
    );
}
