use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a Producer as reported by the router (§3, external
/// collaborator view — this crate never mutates these beyond mirroring
/// what the router told us).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerState {
    Active,
    Closed,
}

/// A Producer created on the router for a Stream's RTP session (§3).
///
/// Invariant I1: exactly one ACTIVE Producer per LIVE Stream.
/// Invariant I2: `stream.session_metadata.ssrc` equals the `ssrc` of its
/// ACTIVE Producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub stream_id: Uuid,
    pub router_producer_id: String,
    pub ssrc: u32,
    pub state: ProducerState,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub closed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Producer {
    pub const COLLECTION: &'static str = "producers";

    pub fn new(stream_id: Uuid, router_producer_id: String, ssrc: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            stream_id,
            router_producer_id,
            ssrc,
            state: ProducerState::Active,
            created_at: chrono::Utc::now(),
            closed_at: None,
        }
    }
}
