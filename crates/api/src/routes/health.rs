use axum::{Json, extract::State};
use serde::Serialize;

use crate::{error::ApiError, extractors::ApiKeyAuth, state::AppState};

#[derive(Serialize)]
pub struct StreamHealthSummary {
    pub total_live: usize,
    pub stream_ids: Vec<uuid::Uuid>,
}

pub async fn streams_health(
    _auth: ApiKeyAuth,
    State(state): State<AppState>,
) -> Result<Json<StreamHealthSummary>, ApiError> {
    let live = state.repo.list_live_streams().await?;
    Ok(Json(StreamHealthSummary {
        total_live: live.len(),
        stream_ids: live.into_iter().map(|s| s.id).collect(),
    }))
}
