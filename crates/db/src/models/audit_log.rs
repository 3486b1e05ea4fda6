use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::stream::AuditActor;

/// One row per state transition a Stream undergoes (§3, invariant I5:
/// "every transition writes an audit entry"). Written in the same
/// persistence operation as the Stream update it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub stream_id: Uuid,
    pub from_state: String,
    pub to_state: String,
    pub reason: String,
    pub actor: AuditActor,
    pub metadata: Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl AuditLog {
    pub const COLLECTION: &'static str = "audit_logs";

    pub fn new(
        stream_id: Uuid,
        from_state: &str,
        to_state: &str,
        reason: impl Into<String>,
        actor: AuditActor,
        metadata: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            stream_id,
            from_state: from_state.to_string(),
            to_state: to_state.to_string(),
            reason: reason.into(),
            actor,
            metadata,
            created_at: chrono::Utc::now(),
        }
    }
}
