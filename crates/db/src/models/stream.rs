use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Finite state set for a Stream's lifecycle (§3). Transitions are owned by
/// `camfeed_core::state_machine`; this type only carries the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Initializing,
    Ready,
    Live,
    Error,
    Stopped,
    Closed,
}

impl StreamState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamState::Initializing => "initializing",
            StreamState::Ready => "ready",
            StreamState::Live => "live",
            StreamState::Error => "error",
            StreamState::Stopped => "stopped",
            StreamState::Closed => "closed",
        }
    }
}

/// Codec descriptor carried in a Stream record (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecDescriptor {
    pub codec_name: String,
    pub profile: String,
    pub payload_type: u8,
}

impl Default for CodecDescriptor {
    fn default() -> Self {
        Self {
            codec_name: "H264".to_string(),
            profile: "baseline".to_string(),
            payload_type: 96,
        }
    }
}

/// Session metadata snapshot written into the Stream row on each LIVE
/// transition (§3, §4.6 step 12).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub transport_id: Option<String>,
    pub producer_id: Option<String>,
    pub ssrc: Option<u32>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_restart_reason: Option<String>,
}

/// Per-camera stream lifecycle record. Exactly zero-or-one per Camera at any
/// time (§3). Mutated exclusively through the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub camera_id: Uuid,
    pub state: StreamState,
    pub codec: CodecDescriptor,
    pub session_metadata: SessionMetadata,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Stream {
    pub const COLLECTION: &'static str = "streams";

    pub fn new(camera_id: Uuid) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            camera_id,
            state: StreamState::Initializing,
            codec: CodecDescriptor::default(),
            session_metadata: SessionMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Reason an audit row was written — matches the transition event, not the
/// free-text reason string carried alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditActor {
    User,
    HealthMonitor,
    System,
}
