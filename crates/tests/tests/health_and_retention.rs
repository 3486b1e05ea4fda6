use std::sync::Arc;

use camfeed_config::{HealthMonitorSettings, PortRangeSettings, RecordingSettings, RouterSettings};
use camfeed_core::{HealthMonitor, IngestionOrchestrator, PortAllocator, RetentionManager, RoomHealthTracker, SessionRegistry};
use camfeed_db::models::camera::Camera;
use camfeed_db::models::stream::{Stream, StreamState};
use camfeed_tests::fixtures::{FakeRouterClient, FakeStreamRepository};
use uuid::Uuid;

fn test_camera() -> Camera {
    let now = chrono::Utc::now();
    Camera {
        id: Uuid::new_v4(),
        name: "front-door".to_string(),
        location: Some("entrance".to_string()),
        rtsp_url: "rtsp://127.0.0.1:5540/front-door".to_string(),
        created_at: now,
        updated_at: now,
    }
}

fn health_settings() -> HealthMonitorSettings {
    HealthMonitorSettings {
        check_interval_secs: 1,
        stale_threshold: 2,
        restart_cooldown_secs: 0,
        max_restart_attempts: 2,
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

fn recording_settings(root: &std::path::Path) -> RecordingSettings {
    RecordingSettings {
        root: root.to_string_lossy().to_string(),
        retention_days: 7,
        segment_seconds: 6,
        playlist_segment_count: 100,
    }
}

/// A producer whose `packets_received` never advances across
/// `stale_threshold` consecutive checks gets a restart attempted, and
/// restarts stop once the attempt cap is hit rather than looping forever
/// against a camera whose source is genuinely gone.
#[tokio::test]
async fn health_monitor_caps_restart_attempts() {
    let camera = test_camera();
    let camera_id = camera.id;
    let room_id = camera_id.to_string();
    let tmp = tempfile::tempdir().unwrap();

    let repo = Arc::new(FakeStreamRepository::new().with_camera(camera.clone()));
    let router = FakeRouterClient::new();

    let mut stream = Stream::new(camera_id);
    stream.state = StreamState::Live;
    repo.streams.insert(stream.id, stream.clone());

    let transport = router.create_plain_rtp_transport(&room_id, None).await.unwrap();
    let producer_id = router
        .create_producer(&transport.transport_id, "video", &serde_json::json!({}))
        .await
        .unwrap();
    router.set_packets_received(&producer_id, 100);

    let ports = Arc::new(PortAllocator::new(PortRangeSettings { start: 41000, end: 41100 }));
    let registry = Arc::new(SessionRegistry::new());
    let room_health = RoomHealthTracker::new();
    let orchestrator = Arc::new(IngestionOrchestrator::new(
        repo.clone(),
        router.clone(),
        ports,
        registry,
        recording_settings(tmp.path()),
        router_settings(),
        room_health.clone(),
    ));

    let monitor = HealthMonitor::new(router.clone(), orchestrator, room_health.clone(), health_settings());

    // First check only establishes the packet-count baseline.
    monitor.check_once().await.unwrap();
    assert!(!room_health.is_failed(camera_id));

    // The producer's counter never advances again: each pair of stale
    // checks attempts a restart (always failing here, since there is no
    // real ffmpeg binary in this environment) until the attempt cap trips.
    for _ in 0..10 {
        monitor.check_once().await.unwrap();
    }

    assert!(room_health.is_failed(camera_id));
}

/// A producer whose packet count keeps advancing is never treated as
/// stale, no matter how many checks run.
#[tokio::test]
async fn health_monitor_leaves_advancing_producers_alone() {
    let camera = test_camera();
    let camera_id = camera.id;
    let room_id = camera_id.to_string();
    let tmp = tempfile::tempdir().unwrap();

    let repo = Arc::new(FakeStreamRepository::new().with_camera(camera.clone()));
    let router = FakeRouterClient::new();

    let transport = router.create_plain_rtp_transport(&room_id, None).await.unwrap();
    let producer_id = router
        .create_producer(&transport.transport_id, "video", &serde_json::json!({}))
        .await
        .unwrap();

    let ports = Arc::new(PortAllocator::new(PortRangeSettings { start: 41200, end: 41300 }));
    let registry = Arc::new(SessionRegistry::new());
    let room_health = RoomHealthTracker::new();
    let orchestrator = Arc::new(IngestionOrchestrator::new(
        repo,
        router.clone(),
        ports,
        registry,
        recording_settings(tmp.path()),
        router_settings(),
        room_health.clone(),
    ));
    let monitor = HealthMonitor::new(router.clone(), orchestrator, room_health.clone(), health_settings());

    for i in 0..5 {
        router.advance_packets(&producer_id, 10 + i);
        monitor.check_once().await.unwrap();
    }

    assert!(!room_health.is_failed(camera_id));
}

/// Segments in `<camera_id>/<YYYYMMDD>` directories older than the
/// retention window are pruned as whole directories; a fresh day survives
/// a sweep.
#[tokio::test]
async fn retention_manager_prunes_segments_past_the_window() {
    let tmp = tempfile::tempdir().unwrap();
    let camera_dir = tmp.path().join(Uuid::new_v4().to_string());

    let old_day = camera_dir.join("20200101");
    std::fs::create_dir_all(&old_day).unwrap();
    std::fs::write(old_day.join("segment-1577836800.ts"), vec![0u8; 1024]).unwrap();

    let fresh_day = camera_dir.join(chrono::Utc::now().format("%Y%m%d").to_string());
    std::fs::create_dir_all(&fresh_day).unwrap();
    std::fs::write(fresh_day.join("segment-1.ts"), b"fresh").unwrap();

    let settings = RecordingSettings {
        root: tmp.path().to_string_lossy().to_string(),
        retention_days: 7,
        segment_seconds: 6,
        playlist_segment_count: 100,
    };
    let manager = RetentionManager::new(settings);
    manager.sweep().await.unwrap();

    assert!(!old_day.exists(), "stale day directory should be removed wholesale");
    assert!(fresh_day.exists(), "today's directory must survive the sweep");
}

