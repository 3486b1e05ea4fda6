use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("router unavailable: {0}")]
    RouterUnavailable(String),

    #[error("router returned an error response: {0}")]
    RouterError(String),

    #[error("failed to capture an SSRC for stream {stream_id} within the deadline")]
    SsrcCaptureFailed { stream_id: Uuid },

    #[error("could not open RTSP source: {0}")]
    RtspConnectionFailed(String),

    #[error("transcoder process error: {0}")]
    TranscoderError(String),

    #[error("illegal transition for stream {stream_id}: {from} -> {to}")]
    IllegalTransition {
        stream_id: Uuid,
        from: &'static str,
        to: &'static str,
    },

    #[error("no usable port in the configured range")]
    PortRangeExhausted,

    #[error("{0} not found")]
    NotFound(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("persistence error: {0}")]
    Dao(#[from] crate::dao::DaoError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
