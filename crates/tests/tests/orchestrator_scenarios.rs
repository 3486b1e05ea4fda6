use std::sync::Arc;

use camfeed_config::{PortRangeSettings, RecordingSettings, RouterSettings};
use camfeed_core::{CoreError, IngestionOrchestrator, PortAllocator, RoomHealthTracker, SessionRegistry};
use camfeed_db::models::stream::StreamState;
use camfeed_tests::fixtures::{FakeRouterClient, FakeStreamRepository};
use uuid::Uuid;

fn test_camera(rtsp_url: &str) -> camfeed_db::models::camera::Camera {
    let now = chrono::Utc::now();
    camfeed_db::models::camera::Camera {
        id: Uuid::new_v4(),
        name: "back-yard".to_string(),
        location: None,
        rtsp_url: rtsp_url.to_string(),
        created_at: now,
        updated_at: now,
    }
}

fn router_settings() -> RouterSettings {
    RouterSettings {
        url: "ws://127.0.0.1:1".to_string(),
        host: "127.0.0.1".to_string(),
        request_timeout_secs: 1,
        reconnect_backoff_ms: 10,
    }
}

/// `ffmpeg` is very unlikely to be on the PATH of a sandboxed test runner,
/// so starting a stream there fails before ever touching the router — and
/// must land the stream in ERROR rather than hang or panic.
#[tokio::test]
async fn start_stream_surfaces_an_error_when_the_transcoder_cannot_start() {
    let camera = test_camera("rtsp://127.0.0.1:5540/back-yard");
    let camera_id = camera.id;
    let repo = Arc::new(FakeStreamRepository::new().with_camera(camera));
    let router = FakeRouterClient::new();
    router.set_down(true);

    let tmp = tempfile::tempdir().unwrap();
    let ports = Arc::new(PortAllocator::new(PortRangeSettings { start: 43000, end: 43050 }));
    let registry = Arc::new(SessionRegistry::new());
    let orchestrator = IngestionOrchestrator::new(
        repo.clone(),
        router,
        ports,
        registry,
        RecordingSettings {
            root: tmp.path().to_string_lossy().to_string(),
            retention_days: 7,
            segment_seconds: 6,
            playlist_segment_count: 100,
        },
        router_settings(),
        RoomHealthTracker::new(),
    );

    let result = orchestrator.start_stream(camera_id).await;
    assert!(result.is_err());

    let streams = repo.list_streams().await.unwrap();
    let stream = streams
        .into_iter()
        .find(|s| s.camera_id == camera_id)
        .expect("start_stream must persist a stream row even when it ends in error");
    assert_eq!(stream.state, StreamState::Error);
}

/// Stopping a camera with no in-memory session (nothing was ever started,
/// or the process restarted) is a no-op rather than an error — there is
/// nothing to tear down.
#[tokio::test]
async fn stop_stream_with_no_active_session_is_a_noop() {
    let camera = test_camera("rtsp://127.0.0.1:5540/idle");
    let camera_id = camera.id;
    let repo = Arc::new(FakeStreamRepository::new().with_camera(camera));
    let router = FakeRouterClient::new();

    let tmp = tempfile::tempdir().unwrap();
    let ports = Arc::new(PortAllocator::new(PortRangeSettings { start: 43100, end: 43150 }));
    let registry = Arc::new(SessionRegistry::new());
    let orchestrator = IngestionOrchestrator::new(
        repo,
        router,
        ports,
        registry,
        RecordingSettings {
            root: tmp.path().to_string_lossy().to_string(),
            retention_days: 7,
            segment_seconds: 6,
            playlist_segment_count: 100,
        },
        router_settings(),
        RoomHealthTracker::new(),
    );

    orchestrator.stop_stream(camera_id, "never started").await.unwrap();
}

/// `CoreError::RouterUnavailable` maps from a router-down condition, used
/// directly by the fake so scenario tests don't need a live router process.
#[test]
fn router_unavailable_error_message_names_the_cause() {
    let err = CoreError::RouterUnavailable("down for test".to_string());
    assert!(err.to_string().contains("down for test"));
}
