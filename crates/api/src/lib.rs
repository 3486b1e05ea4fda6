pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::{Router, routing::get, routing::post};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let camera_routes = Router::new()
        .route("/{camera_id}/start-stream", post(routes::streams::start_stream))
        .route("/{camera_id}/stop-stream", post(routes::streams::stop_stream));

    let stream_routes = Router::new()
        .route("/", get(routes::streams::list_streams))
        .route("/{stream_id}", get(routes::streams::get_stream));

    let health_routes = Router::new().route("/streams", get(routes::health::streams_health));

    let api = Router::new()
        .nest("/cameras", camera_routes)
        .nest("/streams", stream_routes)
        .nest("/health", health_routes);

    Router::new()
        .merge(api)
        .route("/healthz", get(liveness))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn liveness() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
