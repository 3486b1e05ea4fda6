use std::sync::Arc;
use std::time::Duration;

use camfeed_config::{RecordingSettings, RouterSettings};
use camfeed_db::models::camera::Camera;
use camfeed_db::models::stream::{AuditActor, SessionMetadata, Stream, StreamState};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::port_allocator::PortAllocator;
use crate::registry::{CameraSession, SessionRegistry};
use crate::repository::StreamRepository;
use crate::room_health::RoomHealthTracker;
use crate::router_client::RouterClient;
use crate::ssrc_capture::SsrcCapture;
use crate::state_machine::check_transition;
use crate::transcoder::{self, TranscoderSupervisor};

/// Outcome of a Start call: a fresh session, or a short-circuit onto a
/// session the router confirms is already flowing for this camera.
pub struct StartResult {
    pub stream: Stream,
    pub reconnect: bool,
}

/// Drives a camera's Stream through its full lifecycle: spins up the
/// transcoder, learns its SSRC, hands it to the router, and waits for the
/// router to confirm the producer is flowing before calling the stream
/// LIVE. Every public entry point takes the camera's registry lock first,
/// so Start/Stop/Restart against the same camera never interleave.
pub struct IngestionOrchestrator {
    repo: Arc<dyn StreamRepository>,
    router: Arc<dyn RouterClient>,
    ports: Arc<PortAllocator>,
    registry: Arc<SessionRegistry>,
    recording: RecordingSettings,
    router_settings: RouterSettings,
    room_health: Arc<RoomHealthTracker>,
    ssrc_capture_timeout: Duration,
    producer_ready_timeout: Duration,
}

impl IngestionOrchestrator {
    pub fn new(
        repo: Arc<dyn StreamRepository>,
        router: Arc<dyn RouterClient>,
        ports: Arc<PortAllocator>,
        registry: Arc<SessionRegistry>,
        recording: RecordingSettings,
        router_settings: RouterSettings,
        room_health: Arc<RoomHealthTracker>,
    ) -> Self {
        Self {
            repo,
            router,
            ports,
            registry,
            recording,
            router_settings,
            room_health,
            ssrc_capture_timeout: Duration::from_secs(15),
            producer_ready_timeout: Duration::from_secs(8),
        }
    }

    pub async fn start_stream(&self, camera_id: Uuid) -> CoreResult<StartResult> {
        let _guard = self.registry.lock_camera(camera_id).await;
        let room_id = camera_id.to_string();

        if let Some(existing) = self.repo.find_active_stream_for_camera(camera_id).await? {
            if !matches!(existing.state, StreamState::Stopped | StreamState::Error) {
                // The DB says this camera is already up — but only trust
                // that if the router still actually reports a producer for
                // it (§4.6 step 1). A stale row with nothing live behind it
                // must re-establish the session, not short-circuit.
                let producers = self.router.get_producers(&room_id).await.unwrap_or_default();
                if !producers.is_empty() {
                    self.room_health.mark_healthy(camera_id);
                    return Ok(StartResult { stream: existing, reconnect: true });
                }
                warn!(%camera_id, "stream record is active but router has no producer, re-establishing");
                let camera = self.repo.get_camera(camera_id).await?;
                let stream = self.drive_to_live(&camera, existing, "start-stream:reconcile").await?;
                self.room_health.mark_healthy(camera_id);
                return Ok(StartResult { stream, reconnect: true });
            }
        }

        let camera = self.repo.get_camera(camera_id).await?;
        let stream = Stream::new(camera_id);
        self.repo.insert_stream(&stream).await?;

        let stream = self.drive_to_live(&camera, stream, "start-stream").await?;
        self.room_health.mark_healthy(camera_id);
        Ok(StartResult { stream, reconnect: false })
    }

    async fn drive_to_live(
        &self,
        camera: &Camera,
        mut stream: Stream,
        reason: &str,
    ) -> CoreResult<Stream> {
        let camera_id = stream.camera_id;
        let stream_id = stream.id;
        let room_id = camera.room_id();

        // Step 2: a prior, unclean shutdown may have left ffmpeg running
        // against this same RTSP source — kill it before starting another.
        if let Err(e) = transcoder::kill_orphans(&camera.rtsp_url).await {
            warn!(%camera_id, error = %e, "orphan transcoder sweep failed, continuing");
        }

        // Step 3: release whatever transports the router still holds for
        // this room, and give the kernel a moment to free their UDP ports
        // before allocating a new one.
        match self.router.close_transports_for_room(&room_id).await {
            Ok(count) if count > 0 => tokio::time::sleep(Duration::from_millis(400)).await,
            Ok(_) => {}
            Err(e) => warn!(%camera_id, error = %e, "close_transports_for_room failed, continuing"),
        }

        let port = self.ports.allocate(camera_id)?;
        let ssrc = transcoder::chosen_ssrc(camera_id);

        let transcoder = match TranscoderSupervisor::spawn(
            stream_id,
            camera_id,
            &camera.rtsp_url,
            port,
            ssrc,
            &self.router_settings.host,
            &self.recording,
        ) {
            Ok(t) => t,
            Err(e) => {
                self.ports.release(port);
                self.mark_error(stream_id, stream.state, &e.to_string()).await?;
                return Err(e);
            }
        };

        self.registry.insert(
            camera_id,
            CameraSession { stream_id, transcoder, rtp_port: port },
        );

        // SSRC capture confirms packets are actually arriving, but it is a
        // liveness signal, not a precondition for going LIVE: a genuinely
        // silent source (scenario: camera powered but not streaming) still
        // reaches LIVE, reported with ssrc=0. Only a transcoder that has
        // already exited turns this into a real failure.
        let ssrc = match SsrcCapture::capture(stream_id, port, self.ssrc_capture_timeout).await {
            Ok(s) => s,
            Err(e) => {
                let exited = self
                    .registry
                    .with_session_mut(camera_id, |s| s.transcoder.try_wait().ok().flatten())
                    .flatten()
                    .is_some();
                if exited {
                    let reported = self
                        .registry
                        .with_session_mut(camera_id, |s| s.transcoder.connection_failure_reason())
                        .flatten()
                        .map(CoreError::RtspConnectionFailed)
                        .unwrap_or(e);
                    self.teardown_session(camera_id, port).await;
                    self.mark_error(stream_id, stream.state, &reported.to_string()).await?;
                    return Err(reported);
                }
                warn!(%camera_id, %stream_id, error = %e, "ssrc capture timed out, proceeding with ssrc=0");
                0
            }
        };

        check_transition(stream_id, stream.state, StreamState::Ready)?;
        self.repo
            .transition_stream(
                stream_id,
                stream.state,
                StreamState::Ready,
                reason,
                AuditActor::System,
                json!({ "ssrc": ssrc }),
                bson::doc! {},
            )
            .await?;
        stream.state = StreamState::Ready;

        // Step 8: close any producer a previous session in this room left
        // active — closing transports above doesn't always imply this.
        if let Ok(existing_producers) = self.router.get_producers(&room_id).await {
            for producer_id in existing_producers {
                if let Err(e) = self.router.close_producer(&producer_id).await {
                    warn!(%camera_id, %producer_id, error = %e, "failed to close pre-existing producer");
                }
            }
        }

        let transport = match self.router.create_plain_rtp_transport(&room_id, Some(port)).await {
            Ok(t) => t,
            Err(e) => {
                self.teardown_session(camera_id, port).await;
                self.mark_error(stream_id, stream.state, &e.to_string()).await?;
                return Err(e);
            }
        };

        // Step 10: without connecting the transport to a peer it can never
        // receive the packets ffmpeg is sending.
        if let Err(e) = self
            .router
            .connect_plain_transport(&transport.transport_id, &self.router_settings.host, transport.assigned_port)
            .await
        {
            self.teardown_session(camera_id, port).await;
            self.mark_error(stream_id, stream.state, &e.to_string()).await?;
            return Err(e);
        }

        let rtp_parameters = json!({
            "codecs": [{
                "mimeType": format!("video/{}", stream.codec.codec_name),
                "payloadType": stream.codec.payload_type,
            }],
            "encodings": [{ "ssrc": ssrc }],
        });
        let router_producer_id = match self
            .router
            .create_producer(&transport.transport_id, "video", &rtp_parameters)
            .await
        {
            Ok(p) => p,
            Err(e) => {
                self.teardown_session(camera_id, port).await;
                self.mark_error(stream_id, stream.state, &e.to_string()).await?;
                return Err(e);
            }
        };

        // Step 11: a producer that hasn't reported packets yet is not an
        // error — a silent source can sit LIVE with no traffic. The health
        // monitor is the one that acts on continued staleness, not Start.
        if !self.wait_producer_ready(&router_producer_id).await? {
            warn!(
                %camera_id, %stream_id, router_producer_id,
                "producer not confirmed flowing within deadline, leaving to health monitor"
            );
        }

        let db_producer =
            camfeed_db::models::producer::Producer::new(stream_id, router_producer_id.clone(), ssrc);
        self.repo.insert_producer(&db_producer).await?;

        let metadata = SessionMetadata {
            transport_id: Some(transport.transport_id),
            producer_id: Some(router_producer_id),
            ssrc: Some(ssrc),
            started_at: Some(chrono::Utc::now()),
            last_restart_reason: None,
        };
        let patch = bson::doc! {
            "session_metadata": bson::to_bson(&metadata).map_err(|e| CoreError::Internal(e.into()))?,
        };

        check_transition(stream_id, stream.state, StreamState::Live)?;
        self.repo
            .transition_stream(
                stream_id,
                stream.state,
                StreamState::Live,
                reason,
                AuditActor::System,
                json!({ "producer_id": db_producer.id }),
                patch,
            )
            .await?;
        stream.state = StreamState::Live;
        stream.session_metadata = metadata;

        info!(%camera_id, %stream_id, "stream is live");
        Ok(stream)
    }

    /// Polls the router's producer stats until `router_producer_id` reports
    /// at least one received packet, or the deadline passes. Never fails the
    /// caller on timeout — returns `false` so Start can proceed anyway and
    /// let the health monitor act on continued silence (§4.6 step 11).
    async fn wait_producer_ready(&self, router_producer_id: &str) -> CoreResult<bool> {
        let deadline = tokio::time::Instant::now() + self.producer_ready_timeout;
        loop {
            match self.router.get_all_producer_stats().await {
                Ok(stats) => {
                    if stats
                        .iter()
                        .any(|p| p.producer_id == router_producer_id && p.packets_received > 0)
                    {
                        return Ok(true);
                    }
                }
                Err(e) => {
                    warn!(router_producer_id, error = %e, "producer stats unavailable while waiting for ready");
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
    }

    pub async fn stop_stream(&self, camera_id: Uuid, reason: &str) -> CoreResult<()> {
        let _guard = self.registry.lock_camera(camera_id).await;
        self.stop_stream_locked(camera_id, reason).await
    }

    async fn stop_stream_locked(&self, camera_id: Uuid, reason: &str) -> CoreResult<()> {
        let Some(stream_id) = self.registry.stream_id_for(camera_id) else {
            return Ok(());
        };
        let stream = self.repo.get_stream(stream_id).await?;
        let room_id = camera_id.to_string();

        // Close every producer the router has for this room, not just the
        // one this process happens to have a DB row for.
        if let Ok(producer_ids) = self.router.get_producers(&room_id).await {
            for producer_id in producer_ids {
                if let Err(e) = self.router.close_producer(&producer_id).await {
                    warn!(%stream_id, %producer_id, error = %e, "router close_producer failed, continuing teardown");
                }
            }
        }
        if let Some(producer) = self.repo.find_active_producer(stream_id).await? {
            self.repo.close_producer(producer.id).await?;
        }

        if let Err(e) = self.router.close_transports_for_room(&room_id).await {
            warn!(%stream_id, error = %e, "close_transports_for_room failed during stop");
        }

        if let Some(port) = self.registry.with_session_mut(camera_id, |s| s.rtp_port) {
            self.teardown_session(camera_id, port).await;
        }

        if matches!(stream.state, StreamState::Live | StreamState::Ready | StreamState::Error) {
            check_transition(stream_id, stream.state, StreamState::Stopped)?;
            self.repo
                .transition_stream(
                    stream_id,
                    stream.state,
                    StreamState::Stopped,
                    reason,
                    AuditActor::User,
                    json!({}),
                    bson::doc! {},
                )
                .await?;
        }
        Ok(())
    }

    pub async fn restart_stream(&self, camera_id: Uuid, reason: &str) -> CoreResult<Stream> {
        let _guard = self.registry.lock_camera(camera_id).await;

        self.stop_stream_locked(camera_id, reason).await?;

        let camera = self.repo.get_camera(camera_id).await?;
        let Some(existing) = self.repo.find_active_stream_for_camera(camera_id).await? else {
            return self.start_stream(camera_id).await.map(|r| r.stream);
        };

        let stream_id = existing.id;
        check_transition(stream_id, existing.state, StreamState::Initializing)?;
        self.repo
            .transition_stream(
                stream_id,
                existing.state,
                StreamState::Initializing,
                reason,
                AuditActor::HealthMonitor,
                json!({}),
                bson::doc! { "session_metadata.last_restart_reason": reason },
            )
            .await?;

        let mut refreshed = existing;
        refreshed.state = StreamState::Initializing;
        let stream = self.drive_to_live(&camera, refreshed, reason).await?;
        self.room_health.mark_healthy(camera_id);
        Ok(stream)
    }

    async fn teardown_session(&self, camera_id: Uuid, port: u16) {
        if let Some(mut session) = self.registry.remove(camera_id) {
            if let Err(e) = session.transcoder.terminate(Duration::from_secs(5)).await {
                warn!(%camera_id, error = %e, "error terminating transcoder");
            }
        }
        self.ports.release(port);
    }

    async fn mark_error(&self, stream_id: Uuid, from: StreamState, reason: &str) -> CoreResult<()> {
        if !crate::state_machine::is_legal_transition(from, StreamState::Error) {
            return Ok(());
        }
        self.repo
            .transition_stream(
                stream_id,
                from,
                StreamState::Error,
                reason,
                AuditActor::System,
                json!({ "reason": reason }),
                bson::doc! {},
            )
            .await?;
        Ok(())
    }
}
