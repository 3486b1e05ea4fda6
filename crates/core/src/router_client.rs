use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use camfeed_config::RouterSettings;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// A plain RTP transport the router opened for a room, with the UDP port it
/// actually bound (may differ from a requested `fixed_port` if that one was
/// taken).
#[derive(Debug, Clone)]
pub struct PlainTransport {
    pub transport_id: String,
    pub assigned_port: u16,
}

/// One producer's packet counter at the moment of the poll — the sole
/// signal the health monitor and the readiness wait use to decide whether
/// RTP is actually flowing (§4.7, glossary: "stale" := unchanged
/// `packets_received` across two checks).
#[derive(Debug, Clone, Deserialize)]
pub struct ProducerStats {
    pub producer_id: String,
    pub room_id: String,
    pub packets_received: u64,
    #[serde(default)]
    pub transport_stats: Option<Value>,
}

/// Narrow seam the orchestrator and health monitor talk to, so scenario
/// tests can script router responses without a live WebSocket peer. Covers
/// the full RPC surface the router exposes (§4.1), not just the subset the
/// happy-path Start sequence touches.
#[async_trait]
pub trait RouterClient: Send + Sync {
    async fn get_router_rtp_capabilities(&self) -> CoreResult<Value>;
    async fn create_plain_rtp_transport(
        &self,
        room_id: &str,
        fixed_port: Option<u16>,
    ) -> CoreResult<PlainTransport>;
    async fn connect_plain_transport(
        &self,
        transport_id: &str,
        peer_ip: &str,
        peer_port: u16,
    ) -> CoreResult<()>;
    async fn create_producer(
        &self,
        transport_id: &str,
        kind: &str,
        rtp_parameters: &Value,
    ) -> CoreResult<String>;
    async fn create_webrtc_transport(&self, room_id: &str) -> CoreResult<Value>;
    async fn connect_webrtc_transport(
        &self,
        transport_id: &str,
        dtls_parameters: &Value,
    ) -> CoreResult<()>;
    async fn consume(
        &self,
        transport_id: &str,
        producer_id: &str,
        rtp_capabilities: &Value,
    ) -> CoreResult<Value>;
    async fn get_producers(&self, room_id: &str) -> CoreResult<Vec<String>>;
    async fn get_all_producer_stats(&self) -> CoreResult<Vec<ProducerStats>>;
    async fn close_producer(&self, producer_id: &str) -> CoreResult<()>;
    async fn close_transport(&self, transport_id: &str) -> CoreResult<()>;
    async fn close_transports_for_room(&self, room_id: &str) -> CoreResult<u32>;
}

#[derive(Debug, Serialize)]
struct RpcRequest {
    id: String,
    method: String,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: String,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

type PendingMap = Arc<DashMap<String, oneshot::Sender<Result<Value, String>>>>;

/// WebSocket JSON-RPC client talking to the external media router.
///
/// The router itself is out of scope here — this client only speaks the
/// request/response protocol over a persistent WebSocket connection,
/// mirroring the request-correlation-by-id pattern used against the
/// router's signalling channel.
pub struct RouterRpcClient {
    sink: tokio::sync::Mutex<
        futures::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>,
    >,
    pending: PendingMap,
    request_timeout: Duration,
    _reader: tokio::task::JoinHandle<()>,
}

impl RouterRpcClient {
    pub async fn connect(settings: &RouterSettings) -> CoreResult<Self> {
        let (ws, _) = connect_async(&settings.url)
            .await
            .map_err(|e| CoreError::RouterUnavailable(e.to_string()))?;
        let (sink, mut stream) = ws.split();

        let pending: PendingMap = Arc::new(DashMap::new());
        let pending_for_reader = pending.clone();

        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let msg = match msg {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(error = %e, "router websocket read error");
                        break;
                    }
                };
                let Message::Text(text) = msg else { continue };
                let parsed: Result<RpcResponse, _> = serde_json::from_str(&text);
                match parsed {
                    Ok(resp) => {
                        if let Some((_, tx)) = pending_for_reader.remove(&resp.id) {
                            let outcome = match resp.error {
                                Some(err) => Err(err),
                                None => Ok(resp.result.unwrap_or(Value::Null)),
                            };
                            let _ = tx.send(outcome);
                        }
                    }
                    Err(e) => debug!(error = %e, "unparseable router frame"),
                }
            }
        });

        Ok(Self {
            sink: tokio::sync::Mutex::new(sink),
            pending,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            _reader: reader,
        })
    }

    pub async fn call(&self, method: &str, params: Value) -> CoreResult<Value> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);

        let request = RpcRequest {
            id: id.clone(),
            method: method.to_string(),
            params,
        };
        let payload = serde_json::to_string(&request)
            .map_err(|e| CoreError::Internal(anyhow::anyhow!(e)))?;

        {
            let mut sink = self.sink.lock().await;
            sink.send(Message::Text(payload.into()))
                .await
                .map_err(|e| CoreError::RouterUnavailable(e.to_string()))?;
        }

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) => Err(CoreError::RouterError(err)),
            Ok(Err(_)) => Err(CoreError::RouterUnavailable(
                "response channel closed".to_string(),
            )),
            Err(_) => {
                self.pending.remove(&id);
                Err(CoreError::Timeout(format!("router call {method} timed out")))
            }
        }
    }
}

fn field_str(value: &Value, key: &str) -> CoreResult<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| CoreError::RouterError(format!("missing `{key}` in router response")))
}

fn field_u64(value: &Value, key: &str) -> CoreResult<u64> {
    value
        .get(key)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| CoreError::RouterError(format!("missing `{key}` in router response")))
}

#[async_trait]
impl RouterClient for RouterRpcClient {
    async fn get_router_rtp_capabilities(&self) -> CoreResult<Value> {
        self.call("getRouterRtpCapabilities", serde_json::json!({})).await
    }

    async fn create_plain_rtp_transport(
        &self,
        room_id: &str,
        fixed_port: Option<u16>,
    ) -> CoreResult<PlainTransport> {
        let result = self
            .call(
                "createPlainTransport",
                serde_json::json!({ "roomId": room_id, "fixedPort": fixed_port }),
            )
            .await?;
        let transport_id = field_str(&result, "transportId")?;
        let assigned_port = field_u64(&result, "assignedPort")? as u16;
        Ok(PlainTransport { transport_id, assigned_port })
    }

    async fn connect_plain_transport(
        &self,
        transport_id: &str,
        peer_ip: &str,
        peer_port: u16,
    ) -> CoreResult<()> {
        self.call(
            "connectPlainTransport",
            serde_json::json!({ "transportId": transport_id, "ip": peer_ip, "port": peer_port }),
        )
        .await?;
        Ok(())
    }

    async fn create_producer(
        &self,
        transport_id: &str,
        kind: &str,
        rtp_parameters: &Value,
    ) -> CoreResult<String> {
        let result = self
            .call(
                "produce",
                serde_json::json!({
                    "transportId": transport_id,
                    "kind": kind,
                    "rtpParameters": rtp_parameters,
                }),
            )
            .await?;
        field_str(&result, "producerId")
    }

    async fn create_webrtc_transport(&self, room_id: &str) -> CoreResult<Value> {
        self.call("createWebRtcTransport", serde_json::json!({ "roomId": room_id }))
            .await
    }

    async fn connect_webrtc_transport(
        &self,
        transport_id: &str,
        dtls_parameters: &Value,
    ) -> CoreResult<()> {
        self.call(
            "connectWebRtcTransport",
            serde_json::json!({ "transportId": transport_id, "dtlsParameters": dtls_parameters }),
        )
        .await?;
        Ok(())
    }

    async fn consume(
        &self,
        transport_id: &str,
        producer_id: &str,
        rtp_capabilities: &Value,
    ) -> CoreResult<Value> {
        self.call(
            "consume",
            serde_json::json!({
                "transportId": transport_id,
                "producerId": producer_id,
                "rtpCapabilities": rtp_capabilities,
            }),
        )
        .await
    }

    async fn get_producers(&self, room_id: &str) -> CoreResult<Vec<String>> {
        let result = self
            .call("getProducers", serde_json::json!({ "roomId": room_id }))
            .await?;
        let ids = result
            .as_array()
            .ok_or_else(|| CoreError::RouterError("getProducers did not return an array".into()))?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        Ok(ids)
    }

    async fn get_all_producer_stats(&self) -> CoreResult<Vec<ProducerStats>> {
        let result = self.call("getAllProducerStats", serde_json::json!({})).await?;
        serde_json::from_value(result)
            .map_err(|e| CoreError::RouterError(format!("malformed producer stats: {e}")))
    }

    async fn close_producer(&self, producer_id: &str) -> CoreResult<()> {
        self.call("closeProducer", serde_json::json!({ "producerId": producer_id }))
            .await?;
        Ok(())
    }

    async fn close_transport(&self, transport_id: &str) -> CoreResult<()> {
        self.call("closeTransport", serde_json::json!({ "transportId": transport_id }))
            .await?;
        Ok(())
    }

    async fn close_transports_for_room(&self, room_id: &str) -> CoreResult<u32> {
        let result = self
            .call("closeTransportsForRoom", serde_json::json!({ "roomId": room_id }))
            .await?;
        Ok(result.get("count").and_then(|v| v.as_u64()).unwrap_or(0) as u32)
    }
}

/// Reconnect with exponential backoff, in the router client's own idiom
/// rather than wrapping every call site in retry logic.
pub async fn connect_with_backoff(settings: &RouterSettings) -> CoreResult<RouterRpcClient> {
    let mut backoff = Duration::from_millis(settings.reconnect_backoff_ms);
    let max_backoff = Duration::from_secs(30);
    let mut attempts = 0u32;

    loop {
        match RouterRpcClient::connect(settings).await {
            Ok(client) => return Ok(client),
            Err(e) if attempts < 5 => {
                attempts += 1;
                warn!(attempt = attempts, error = %e, "router connect failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, max_backoff);
            }
            Err(e) => {
                error!(error = %e, "router connect exhausted retries");
                return Err(e);
            }
        }
    }
}
