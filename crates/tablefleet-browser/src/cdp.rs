//! Low-level CDP (Chrome DevTools Protocol) WebSocket client.
//!
//! Connects to a page target's DevTools WebSocket endpoint and correlates
//! JSON-RPC commands with their responses. A worker only issues commands and
//! polls page state, so unsolicited protocol events are discarded by the
//! reader task instead of being queued.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::BrowserError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<CdpResponse>>>>;

/// Default per-command response timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, serde::Serialize)]
struct CdpCommand<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

/// A CDP response from the browser.
#[derive(Debug, Clone)]
pub struct CdpResponse {
    pub id: u64,
    pub result: Option<Value>,
    pub error: Option<CdpResponseError>,
}

/// Error object in a CDP response.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CdpResponseError {
    pub code: i64,
    pub message: String,
    pub data: Option<String>,
}

/// CDP client owning one WebSocket connection.
pub struct CdpClient {
    next_id: AtomicU64,
    pending: PendingMap,
    writer: Mutex<WsSink>,
    reader_handle: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a DevTools WebSocket endpoint of the form
    /// `ws://127.0.0.1:{port}/devtools/page/{target_id}`.
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        tracing::info!(url = ws_url, "connecting to Chrome DevTools WebSocket");

        let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| BrowserError::ConnectionFailed {
                url: ws_url.to_string(),
                reason: e.to_string(),
            })?;

        let (writer, reader) = ws_stream.split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader_handle = tokio::spawn(Self::read_loop(reader, Arc::clone(&pending)));

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            writer: Mutex::new(writer),
            reader_handle,
        })
    }

    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.send_command_with_timeout(method, params, DEFAULT_COMMAND_TIMEOUT)
            .await
    }

    pub async fn send_command_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, BrowserError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let json = serde_json::to_string(&CdpCommand { id, method, params }).map_err(|e| {
            BrowserError::Protocol {
                detail: format!("failed to serialize command: {e}"),
            }
        })?;

        tracing::trace!(id, method, "sending CDP command");

        // Register before sending so a fast response cannot be missed.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let sent = self
            .writer
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            return Err(BrowserError::Protocol {
                detail: format!("failed to send WebSocket message: {e}"),
            });
        }

        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(BrowserError::Protocol {
                    detail: "response channel closed unexpectedly".to_string(),
                })
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(BrowserError::Timeout {
                    method: method.to_string(),
                    duration: timeout,
                });
            }
        };

        if let Some(err) = response.error {
            return Err(BrowserError::CdpError {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Enable a CDP domain (e.g. "Page", "DOM", "Runtime").
    pub async fn enable_domain(&self, domain: &str) -> Result<(), BrowserError> {
        self.send_command(&format!("{domain}.enable"), serde_json::json!({}))
            .await?;
        tracing::debug!(domain, "CDP domain enabled");
        Ok(())
    }

    async fn read_loop(mut reader: SplitStream<WsStream>, pending: PendingMap) {
        while let Some(msg_result) = reader.next().await {
            let text = match msg_result {
                Ok(Message::Text(t)) => t.to_string(),
                Ok(Message::Binary(b)) => match String::from_utf8(b.to_vec()) {
                    Ok(s) => s,
                    Err(_) => continue,
                },
                Ok(Message::Close(_)) => {
                    tracing::info!("DevTools WebSocket closed by browser");
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "DevTools WebSocket read error, stopping reader");
                    break;
                }
            };

            let json: Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse CDP message as JSON");
                    continue;
                }
            };

            match parse_cdp_response(&json) {
                Some(response) => {
                    if let Some(tx) = pending.lock().await.remove(&response.id) {
                        let _ = tx.send(response);
                    } else {
                        tracing::debug!(id = response.id, "response for unknown or expired command");
                    }
                }
                None => {
                    if let Some(method) = json.get("method").and_then(|m| m.as_str()) {
                        tracing::trace!(method, "discarding CDP event");
                    }
                }
            }
        }

        // Fail every in-flight command once the socket is gone.
        for (id, tx) in pending.lock().await.drain() {
            let _ = tx.send(CdpResponse {
                id,
                result: None,
                error: Some(CdpResponseError {
                    code: -1,
                    message: "WebSocket connection closed".to_string(),
                    data: None,
                }),
            });
        }
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}

/// Parse a CDP response message. Events (no `id`) yield `None`.
pub fn parse_cdp_response(json: &Value) -> Option<CdpResponse> {
    let id = json.get("id")?.as_u64()?;
    Some(CdpResponse {
        id,
        result: json.get("result").cloned(),
        error: json
            .get("error")
            .and_then(|e| serde_json::from_value(e.clone()).ok()),
    })
}
