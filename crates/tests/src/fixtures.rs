use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use camfeed_core::dao::{DaoError, DaoResult};
use camfeed_core::router_client::{PlainTransport, ProducerStats, RouterClient};
use camfeed_core::{CoreError, CoreResult, StreamRepository};
use camfeed_db::models::audit_log::AuditLog;
use camfeed_db::models::camera::Camera;
use camfeed_db::models::producer::{Producer, ProducerState};
use camfeed_db::models::stream::{AuditActor, Stream, StreamState};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

/// In-memory stand-in for `MongoStreamRepository`, mirroring the
/// compare-and-swap semantics of its `transition_stream` so scenario
/// tests exercise the same invariants without a live MongoDB instance.
#[derive(Default)]
pub struct FakeStreamRepository {
    pub cameras: DashMap<Uuid, Camera>,
    pub streams: DashMap<Uuid, Stream>,
    pub producers: DashMap<Uuid, Producer>,
    pub audit_logs: Mutex<Vec<AuditLog>>,
}

impl FakeStreamRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_camera(self, camera: Camera) -> Self {
        self.cameras.insert(camera.id, camera);
        self
    }
}

#[async_trait]
impl StreamRepository for FakeStreamRepository {
    async fn get_camera(&self, camera_id: Uuid) -> DaoResult<Camera> {
        self.cameras.get(&camera_id).map(|c| c.clone()).ok_or(DaoError::NotFound)
    }

    async fn get_stream(&self, stream_id: Uuid) -> DaoResult<Stream> {
        self.streams.get(&stream_id).map(|s| s.clone()).ok_or(DaoError::NotFound)
    }

    async fn find_active_stream_for_camera(&self, camera_id: Uuid) -> DaoResult<Option<Stream>> {
        Ok(self
            .streams
            .iter()
            .filter(|e| e.value().camera_id == camera_id && e.value().state != StreamState::Closed)
            .map(|e| e.value().clone())
            .next())
    }

    async fn insert_stream(&self, stream: &Stream) -> DaoResult<()> {
        self.streams.insert(stream.id, stream.clone());
        Ok(())
    }

    async fn transition_stream(
        &self,
        stream_id: Uuid,
        from: StreamState,
        to: StreamState,
        reason: &str,
        actor: AuditActor,
        metadata: Value,
        patch: bson::Document,
    ) -> DaoResult<bool> {
        let Some(mut entry) = self.streams.get_mut(&stream_id) else {
            return Ok(false);
        };
        if entry.state != from {
            return Ok(false);
        }
        entry.state = to;
        if let Ok(metadata_bson) = patch.get_document("session_metadata") {
            if let Ok(decoded) = bson::from_document(metadata_bson.clone()) {
                entry.session_metadata = decoded;
            }
        } else if let Ok(reason_str) = patch.get_str("session_metadata.last_restart_reason") {
            entry.session_metadata.last_restart_reason = Some(reason_str.to_string());
        }
        drop(entry);

        self.audit_logs.lock().push(AuditLog::new(
            stream_id,
            from.as_str(),
            to.as_str(),
            reason,
            actor,
            metadata,
        ));
        Ok(true)
    }

    async fn insert_producer(&self, producer: &Producer) -> DaoResult<()> {
        self.producers.insert(producer.id, producer.clone());
        Ok(())
    }

    async fn close_producer(&self, producer_id: Uuid) -> DaoResult<bool> {
        let Some(mut p) = self.producers.get_mut(&producer_id) else {
            return Ok(false);
        };
        p.state = ProducerState::Closed;
        p.closed_at = Some(chrono::Utc::now());
        Ok(true)
    }

    async fn find_active_producer(&self, stream_id: Uuid) -> DaoResult<Option<Producer>> {
        Ok(self
            .producers
            .iter()
            .filter(|e| e.value().stream_id == stream_id && e.value().state == ProducerState::Active)
            .map(|e| e.value().clone())
            .next())
    }

    async fn list_live_streams(&self) -> DaoResult<Vec<Stream>> {
        Ok(self
            .streams
            .iter()
            .filter(|e| e.value().state == StreamState::Live)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn list_streams(&self) -> DaoResult<Vec<Stream>> {
        Ok(self.streams.iter().map(|e| e.value().clone()).collect())
    }
}

struct FakeProducer {
    room_id: String,
    packets_received: AtomicU64,
}

/// Scriptable `RouterClient` double covering the full §4.1 surface. A
/// producer's `packets_received` is driven explicitly by the test via
/// `set_packets_received`/`advance_packets` rather than a single
/// active/inactive flag, so health-monitor tests can exercise the real
/// staleness rule (no advance between two checks).
pub struct FakeRouterClient {
    pub fail_all: AtomicBool,
    transport_rooms: DashMap<String, String>,
    producers: DashMap<String, FakeProducer>,
}

impl FakeRouterClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_all: AtomicBool::new(false),
            transport_rooms: DashMap::new(),
            producers: DashMap::new(),
        })
    }

    pub fn set_down(&self, down: bool) {
        self.fail_all.store(down, Ordering::SeqCst);
    }

    pub fn set_packets_received(&self, producer_id: &str, value: u64) {
        if let Some(p) = self.producers.get(producer_id) {
            p.packets_received.store(value, Ordering::SeqCst);
        }
    }

    pub fn advance_packets(&self, producer_id: &str, delta: u64) {
        if let Some(p) = self.producers.get(producer_id) {
            p.packets_received.fetch_add(delta, Ordering::SeqCst);
        }
    }

    pub fn producer_ids_for_room(&self, room_id: &str) -> Vec<String> {
        self.producers
            .iter()
            .filter(|e| e.value().room_id == room_id)
            .map(|e| e.key().clone())
            .collect()
    }

    fn check_down(&self) -> CoreResult<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(CoreError::RouterUnavailable("down for test".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RouterClient for FakeRouterClient {
    async fn get_router_rtp_capabilities(&self) -> CoreResult<Value> {
        self.check_down()?;
        Ok(serde_json::json!({}))
    }

    async fn create_plain_rtp_transport(
        &self,
        room_id: &str,
        fixed_port: Option<u16>,
    ) -> CoreResult<PlainTransport> {
        self.check_down()?;
        let transport_id = Uuid::new_v4().to_string();
        self.transport_rooms.insert(transport_id.clone(), room_id.to_string());
        Ok(PlainTransport {
            transport_id,
            assigned_port: fixed_port.unwrap_or(0),
        })
    }

    async fn connect_plain_transport(&self, _transport_id: &str, _peer_ip: &str, _peer_port: u16) -> CoreResult<()> {
        self.check_down()
    }

    async fn create_producer(&self, transport_id: &str, _kind: &str, _rtp_parameters: &Value) -> CoreResult<String> {
        self.check_down()?;
        let room_id = self
            .transport_rooms
            .get(transport_id)
            .map(|r| r.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let producer_id = Uuid::new_v4().to_string();
        self.producers.insert(
            producer_id.clone(),
            FakeProducer { room_id, packets_received: AtomicU64::new(0) },
        );
        Ok(producer_id)
    }

    async fn create_webrtc_transport(&self, _room_id: &str) -> CoreResult<Value> {
        self.check_down()?;
        Ok(serde_json::json!({}))
    }

    async fn connect_webrtc_transport(&self, _transport_id: &str, _dtls_parameters: &Value) -> CoreResult<()> {
        self.check_down()
    }

    async fn consume(&self, _transport_id: &str, _producer_id: &str, _rtp_capabilities: &Value) -> CoreResult<Value> {
        self.check_down()?;
        Ok(serde_json::json!({}))
    }

    async fn get_producers(&self, room_id: &str) -> CoreResult<Vec<String>> {
        self.check_down()?;
        Ok(self.producer_ids_for_room(room_id))
    }

    async fn get_all_producer_stats(&self) -> CoreResult<Vec<ProducerStats>> {
        self.check_down()?;
        Ok(self
            .producers
            .iter()
            .map(|e| ProducerStats {
                producer_id: e.key().clone(),
                room_id: e.value().room_id.clone(),
                packets_received: e.value().packets_received.load(Ordering::SeqCst),
                transport_stats: None,
            })
            .collect())
    }

    async fn close_producer(&self, producer_id: &str) -> CoreResult<()> {
        self.producers.remove(producer_id);
        Ok(())
    }

    async fn close_transport(&self, transport_id: &str) -> CoreResult<()> {
        self.transport_rooms.remove(transport_id);
        Ok(())
    }

    async fn close_transports_for_room(&self, room_id: &str) -> CoreResult<u32> {
        let matching: Vec<String> = self
            .transport_rooms
            .iter()
            .filter(|e| e.value() == room_id)
            .map(|e| e.key().clone())
            .collect();
        for id in &matching {
            self.transport_rooms.remove(id);
        }
        Ok(matching.len() as u32)
    }
}
