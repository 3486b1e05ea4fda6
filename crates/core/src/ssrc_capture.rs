use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Listens on the transcoder's RTP output port just long enough to read
/// the first packet and pull the synchronization source out of the RTP
/// header (bytes 8..12, big-endian). The transcoder is writing to this
/// port before the router's transport negotiation completes, so this is
/// the only place we learn the real SSRC rather than trusting whatever
/// the encoder was asked to use.
pub struct SsrcCapture;

impl SsrcCapture {
    pub async fn capture(
        stream_id: Uuid,
        port: u16,
        deadline: Duration,
    ) -> CoreResult<u32> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .map_err(|e| CoreError::TranscoderError(format!("bind {port}: {e}")))?;

        let mut buf = [0u8; 1500];
        let recv = timeout(deadline, socket.recv_from(&mut buf)).await;

        let (len, _addr) = match recv {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                debug!(%stream_id, error = %e, "ssrc capture recv error");
                return Err(CoreError::SsrcCaptureFailed { stream_id });
            }
            Err(_) => return Err(CoreError::SsrcCaptureFailed { stream_id }),
        };

        if len < 12 {
            return Err(CoreError::SsrcCaptureFailed { stream_id });
        }

        let ssrc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
        debug!(%stream_id, port, ssrc, "captured SSRC");
        Ok(ssrc)
    }
}
