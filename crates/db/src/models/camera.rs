use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A camera descriptor. Owned by the persistence layer; the ingestion core
/// only reads it (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub rtsp_url: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Camera {
    pub const COLLECTION: &'static str = "cameras";

    /// `room_id` is the camera id rendered as a string — used uniformly as
    /// the router's room identity (§9 open question, resolved: `room_id :=
    /// str(camera_id)`).
    pub fn room_id(&self) -> String {
        self.id.to_string()
    }
}
