use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A Consumer attached to a Stream's Producer on the router side (§3).
/// Purely an external-collaborator view: created by downstream viewers
/// consuming the router's output, never by the ingestion core itself.
/// Retained here only so health and audit reporting can count live
/// viewers against a Stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consumer {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub stream_id: Uuid,
    pub router_consumer_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Consumer {
    pub const COLLECTION: &'static str = "consumers";
}
