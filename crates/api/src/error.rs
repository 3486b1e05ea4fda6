use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use camfeed_core::CoreError;
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Conflict(String),
    ServiceUnavailable(String),
    BadGateway(String),
    GatewayTimeout(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg),
            ApiError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "timeout", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(msg) => ApiError::NotFound(msg),
            CoreError::IllegalTransition { .. } => ApiError::Conflict(err.to_string()),
            CoreError::RouterUnavailable(_) | CoreError::PortRangeExhausted => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            CoreError::Timeout(_) => ApiError::GatewayTimeout(err.to_string()),
            CoreError::SsrcCaptureFailed { .. } | CoreError::RtspConnectionFailed(_) => {
                ApiError::BadGateway(err.to_string())
            }
            CoreError::RouterError(_) | CoreError::TranscoderError(_) => {
                ApiError::Internal(err.to_string())
            }
            CoreError::Dao(dao_err) => match dao_err {
                camfeed_core::dao::DaoError::NotFound => {
                    ApiError::NotFound("resource not found".to_string())
                }
                camfeed_core::dao::DaoError::DuplicateKey(msg) => ApiError::Conflict(msg),
                other => ApiError::Internal(other.to_string()),
            },
            CoreError::Internal(e) => ApiError::Internal(e.to_string()),
        }
    }
}
