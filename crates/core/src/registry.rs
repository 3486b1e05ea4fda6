use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::transcoder::TranscoderSupervisor;

/// Live session state for a camera currently being ingested: the
/// transcoder child process and the RTP port it was given. Held only
/// while a stream is READY or LIVE.
pub struct CameraSession {
    pub stream_id: Uuid,
    pub transcoder: TranscoderSupervisor,
    pub rtp_port: u16,
}

/// Tracks in-process sessions and guarantees that Start/Stop/Restart for a
/// given camera never interleave — each camera gets its own async mutex,
/// so a Stop that's mid-flight blocks a concurrent Start instead of racing
/// it.
#[derive(Default)]
pub struct SessionRegistry {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    sessions: DashMap<Uuid, CameraSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the per-camera lock, serializing any orchestration flow
    /// against others for the same camera.
    pub async fn lock_camera(&self, camera_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(camera_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    pub fn insert(&self, camera_id: Uuid, session: CameraSession) {
        self.sessions.insert(camera_id, session);
    }

    pub fn remove(&self, camera_id: Uuid) -> Option<CameraSession> {
        self.sessions.remove(camera_id).map(|(_, v)| v)
    }

    pub fn contains(&self, camera_id: Uuid) -> bool {
        self.sessions.contains_key(&camera_id)
    }

    pub fn live_pids(&self) -> Vec<u32> {
        self.sessions
            .iter()
            .filter_map(|entry| entry.value().transcoder.pid())
            .collect()
    }

    pub fn stream_id_for(&self, camera_id: Uuid) -> Option<Uuid> {
        self.sessions.get(&camera_id).map(|s| s.stream_id)
    }

    pub fn with_session_mut<R>(
        &self,
        camera_id: Uuid,
        f: impl FnOnce(&mut CameraSession) -> R,
    ) -> Option<R> {
        self.sessions.get_mut(&camera_id).map(|mut s| f(&mut s))
    }

    pub fn camera_ids(&self) -> Vec<Uuid> {
        self.sessions.iter().map(|e| *e.key()).collect()
    }
}
