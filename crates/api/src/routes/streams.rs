use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{error::ApiError, extractors::ApiKeyAuth, state::AppState};

#[derive(Serialize)]
pub struct Producers {
    pub video: Option<String>,
}

/// §6.5 success body: enough for a caller to immediately go consume the
/// stream (room/transport/producer ids) without a follow-up GET, plus the
/// full `Stream` row and whether this call reconnected an already-live
/// session instead of starting a fresh one.
#[derive(Serialize)]
pub struct StartStreamResponse {
    pub camera_id: Uuid,
    pub room_id: String,
    pub transport_id: Option<String>,
    pub producers: Producers,
    pub stream: camfeed_db::models::stream::Stream,
    pub v2_stream_id: Uuid,
    pub reconnect: bool,
}

pub async fn start_stream(
    _auth: ApiKeyAuth,
    State(state): State<AppState>,
    Path(camera_id): Path<Uuid>,
) -> Result<Json<StartStreamResponse>, ApiError> {
    let result = state.orchestrator.start_stream(camera_id).await?;
    let stream = result.stream;
    let body = StartStreamResponse {
        camera_id,
        room_id: camera_id.to_string(),
        transport_id: stream.session_metadata.transport_id.clone(),
        producers: Producers {
            video: stream.session_metadata.producer_id.clone(),
        },
        v2_stream_id: stream.id,
        reconnect: result.reconnect,
        stream,
    };
    Ok(Json(body))
}

pub async fn stop_stream(
    _auth: ApiKeyAuth,
    State(state): State<AppState>,
    Path(camera_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .orchestrator
        .stop_stream(camera_id, "requested via API")
        .await?;
    Ok(Json(serde_json::json!({ "status": "stopped" })))
}

pub async fn get_stream(
    _auth: ApiKeyAuth,
    State(state): State<AppState>,
    Path(stream_id): Path<Uuid>,
) -> Result<Json<camfeed_db::models::stream::Stream>, ApiError> {
    let stream = state.repo.get_stream(stream_id).await?;
    Ok(Json(stream))
}

pub async fn list_streams(
    _auth: ApiKeyAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<camfeed_db::models::stream::Stream>>, ApiError> {
    let streams = state.repo.list_streams().await?;
    Ok(Json(streams))
}
