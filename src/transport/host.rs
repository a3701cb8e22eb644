//! WebSocket debugger host bridge
//!
//! Implements [`DebuggerHost`] against a remote-debugging endpoint: tab
//! discovery over HTTP, then one physical WebSocket connection to the browser
//! target carrying flat-session traffic for every attached tab.

use super::traits::{DebuggerHost, HostEvent, Tab, TabId, TabStatus};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

const COMMAND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Outgoing protocol frame
#[derive(Debug, Serialize)]
struct ProtocolRequest {
    id: u64,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

/// Incoming protocol frame, response or event
#[derive(Debug, Deserialize)]
struct ProtocolFrame {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<ProtocolError>,
    method: Option<String>,
    params: Option<Value>,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProtocolError {
    code: i64,
    message: String,
}

/// Pending command response
#[derive(Debug)]
struct PendingCommand {
    sender: oneshot::Sender<std::result::Result<Value, ProtocolError>>,
    method: String,
}

/// Shared state of the physical connection
struct Bridge {
    sink: Mutex<WsSink>,
    next_id: AtomicU64,
    pending: Arc<Mutex<HashMap<u64, PendingCommand>>>,
    /// Protocol session id per attached tab, and the reverse direction
    tab_sessions: Arc<RwLock<HashMap<TabId, String>>>,
    session_tabs: Arc<RwLock<HashMap<String, TabId>>>,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<HostEvent>>>>,
    is_active: Arc<AtomicBool>,
}

impl Bridge {
    async fn send_raw(
        &self,
        method: &str,
        params: Value,
        session_id: Option<String>,
    ) -> Result<Value> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::transport_unavailable(
                "Physical debugger connection is not active",
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = ProtocolRequest {
            id,
            method: method.to_string(),
            params: if params.is_null() { None } else { Some(params) },
            session_id,
        };

        let json = serde_json::to_string(&request)?;
        let (sender, receiver) = oneshot::channel();

        {
            let mut pending = self.pending.lock().await;
            pending.insert(
                id,
                PendingCommand {
                    sender,
                    method: method.to_string(),
                },
            );
        }

        debug!("Bridge -> {} (id {})", method, id);

        {
            let mut sink = self.sink.lock().await;
            sink.send(Message::Text(json))
                .await
                .map_err(|e| Error::websocket(format!("Failed to send frame: {}", e)))?;
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, receiver).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(protocol_error))) => Err(classify_protocol_error(
                method,
                protocol_error.code,
                &protocol_error.message,
            )),
            Ok(Err(_)) => Err(Error::websocket(format!(
                "Response channel for command {} closed",
                id
            ))),
            Err(_) => {
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                Err(Error::debugger(format!("Command {} timed out", method)))
            }
        }
    }

    /// Read loop over the physical connection
    async fn read_loop(self: Arc<Self>, mut source: WsSource) {
        while let Some(frame) = source.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if let Err(e) = self.handle_frame(&text).await {
                        warn!("Error handling frame: {}", e);
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("Physical debugger connection closed");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Physical debugger connection error: {}", e);
                    break;
                }
            }
        }

        self.is_active.store(false, Ordering::SeqCst);

        // Everything attached over this connection is gone with it
        let session_tabs = self.session_tabs.read().await;
        for tab_id in session_tabs.values() {
            self.emit(HostEvent::Detached {
                tab_id: tab_id.clone(),
                reason: "connection closed".to_string(),
            })
            .await;
        }
    }

    async fn handle_frame(&self, text: &str) -> Result<()> {
        let frame: ProtocolFrame = serde_json::from_str(text)?;

        if let Some(id) = frame.id {
            let mut pending = self.pending.lock().await;
            if let Some(command) = pending.remove(&id) {
                debug!("Bridge <- response for {} (id {})", command.method, id);
                let outcome = match frame.error {
                    Some(error) => Err(error),
                    None => Ok(frame.result.unwrap_or(Value::Null)),
                };
                let _ = command.sender.send(outcome);
            } else {
                warn!("Response for unknown command id {}", id);
            }
            return Ok(());
        }

        let method = match frame.method {
            Some(m) => m,
            None => {
                warn!("Frame with neither id nor method: {}", text);
                return Ok(());
            }
        };

        if method == "Target.detachedFromTarget" {
            let session_id = frame
                .params
                .as_ref()
                .and_then(|p| p.get("sessionId"))
                .and_then(|s| s.as_str())
                .map(|s| s.to_string());

            if let Some(session_id) = session_id {
                let tab_id = {
                    let mut session_tabs = self.session_tabs.write().await;
                    session_tabs.remove(&session_id)
                };
                if let Some(tab_id) = tab_id {
                    self.tab_sessions.write().await.remove(&tab_id);
                    self.emit(HostEvent::Detached {
                        tab_id,
                        reason: "target detached".to_string(),
                    })
                    .await;
                }
            }
            return Ok(());
        }

        // Route session-tagged events back to their tab; untagged events come
        // from the browser target itself and carry no tab scope.
        let tab_id = match frame.session_id {
            Some(session_id) => self.session_tabs.read().await.get(&session_id).cloned(),
            None => None,
        };

        if let Some(tab_id) = tab_id {
            self.emit(HostEvent::Protocol {
                tab_id,
                method,
                params: frame.params.unwrap_or(Value::Null),
            })
            .await;
        }

        Ok(())
    }

    async fn emit(&self, event: HostEvent) {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
    }
}

/// Map protocol errors onto the crate taxonomy.
///
/// The input domain reports a second press of an already-held button as a
/// plain protocol error; that specific condition is recoverable and gets its
/// own kind.
fn classify_protocol_error(method: &str, code: i64, message: &str) -> Error {
    let lowered = message.to_lowercase();
    if method.starts_with("Input.") && lowered.contains("pressed") {
        return Error::pointer_state_conflict(message.to_string());
    }
    Error::debugger(format!("{}: {} (code: {})", method, message, code))
}

/// Tab description returned by the discovery endpoint
#[derive(Debug, Deserialize)]
struct DiscoveredTarget {
    id: String,
    #[serde(rename = "type")]
    target_type: String,
    title: Option<String>,
    url: Option<String>,
}

/// WebSocket-backed debugger host
pub struct WebSocketDebuggerHost {
    /// HTTP discovery endpoint (e.g. "http://localhost:9222")
    http_endpoint: String,
    http: reqwest::Client,
    bridge: Mutex<Option<Arc<Bridge>>>,
}

impl WebSocketDebuggerHost {
    /// Create a host bridging to the given HTTP discovery endpoint
    pub fn new<S: Into<String>>(http_endpoint: S) -> Self {
        let http_endpoint = http_endpoint.into();
        info!("Creating debugger host bridge for {}", http_endpoint);

        Self {
            http_endpoint,
            http: reqwest::Client::new(),
            bridge: Mutex::new(None),
        }
    }

    /// Connect the physical WebSocket lazily and return the live bridge
    async fn bridge(&self) -> Result<Arc<Bridge>> {
        let mut guard = self.bridge.lock().await;

        if let Some(bridge) = guard.as_ref() {
            if bridge.is_active.load(Ordering::SeqCst) {
                return Ok(Arc::clone(bridge));
            }
        }

        let version_url = format!("{}/json/version", self.http_endpoint);
        let version: Value = self
            .http
            .get(&version_url)
            .send()
            .await
            .map_err(|e| {
                Error::transport_unavailable(format!(
                    "Debugger endpoint {} is unreachable: {}",
                    self.http_endpoint, e
                ))
            })?
            .json()
            .await
            .map_err(|e| Error::transport_unavailable(format!("Bad version response: {}", e)))?;

        let ws_url = version
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                Error::transport_unavailable("Version response has no webSocketDebuggerUrl")
            })?;

        info!("Connecting physical debugger connection to {}", ws_url);

        let (stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| Error::websocket(format!("Failed to connect: {}", e)))?;
        let (sink, source) = stream.split();

        let bridge = Arc::new(Bridge {
            sink: Mutex::new(sink),
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            tab_sessions: Arc::new(RwLock::new(HashMap::new())),
            session_tabs: Arc::new(RwLock::new(HashMap::new())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            is_active: Arc::new(AtomicBool::new(true)),
        });

        tokio::spawn(Arc::clone(&bridge).read_loop(source));

        *guard = Some(Arc::clone(&bridge));
        Ok(bridge)
    }
}

#[async_trait]
impl DebuggerHost for WebSocketDebuggerHost {
    async fn attach(&self, tab_id: &TabId) -> Result<()> {
        let bridge = self.bridge().await?;

        let result = bridge
            .send_raw(
                "Target.attachToTarget",
                serde_json::json!({ "targetId": tab_id, "flatten": true }),
                None,
            )
            .await?;

        let session_id = result
            .get("sessionId")
            .and_then(|s| s.as_str())
            .ok_or_else(|| Error::debugger("attachToTarget returned no sessionId"))?
            .to_string();

        bridge
            .tab_sessions
            .write()
            .await
            .insert(tab_id.clone(), session_id.clone());
        bridge
            .session_tabs
            .write()
            .await
            .insert(session_id, tab_id.clone());

        info!("Attached to tab {}", tab_id);
        Ok(())
    }

    async fn detach(&self, tab_id: &TabId) -> Result<()> {
        let bridge = self.bridge().await?;

        let session_id = {
            let mut tab_sessions = bridge.tab_sessions.write().await;
            tab_sessions.remove(tab_id)
        };

        if let Some(session_id) = session_id {
            bridge.session_tabs.write().await.remove(&session_id);
            bridge
                .send_raw(
                    "Target.detachFromTarget",
                    serde_json::json!({ "sessionId": session_id }),
                    None,
                )
                .await?;
            info!("Detached from tab {}", tab_id);
        } else {
            debug!("Tab {} was not attached", tab_id);
        }

        Ok(())
    }

    async fn send_command(&self, tab_id: &TabId, method: &str, params: Value) -> Result<Value> {
        let bridge = self.bridge().await?;

        let session_id = bridge
            .tab_sessions
            .read()
            .await
            .get(tab_id)
            .cloned()
            .ok_or_else(|| Error::internal(format!("Tab {} is not attached", tab_id)))?;

        bridge.send_raw(method, params, Some(session_id)).await
    }

    async fn listen(&self) -> Result<mpsc::UnboundedReceiver<HostEvent>> {
        let bridge = self.bridge().await?;
        let (tx, rx) = mpsc::unbounded_channel();
        bridge.subscribers.lock().await.push(tx);
        Ok(rx)
    }

    async fn query_tabs(&self) -> Result<Vec<Tab>> {
        let list_url = format!("{}/json/list", self.http_endpoint);

        let targets: Vec<DiscoveredTarget> = self
            .http
            .get(&list_url)
            .send()
            .await
            .map_err(|e| {
                Error::transport_unavailable(format!(
                    "Debugger endpoint {} is unreachable: {}",
                    self.http_endpoint, e
                ))
            })?
            .json()
            .await
            .map_err(|e| Error::transport_unavailable(format!("Bad target list: {}", e)))?;

        // The discovery endpoint does not expose window grouping, so every
        // tab reports window 0.
        let tabs = targets
            .into_iter()
            .filter(|target| target.target_type == "page")
            .map(|target| Tab {
                id: target.id,
                window_id: 0,
                url: target.url.unwrap_or_default(),
                title: target.title.unwrap_or_default(),
                status: TabStatus::Complete,
            })
            .collect();

        Ok(tabs)
    }
}

impl std::fmt::Debug for WebSocketDebuggerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketDebuggerHost")
            .field("http_endpoint", &self.http_endpoint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_already_pressed() {
        let err = classify_protocol_error(
            "Input.dispatchMouseEvent",
            -32000,
            "Button is already pressed",
        );
        assert!(matches!(err, Error::PointerStateConflict(_)));
    }

    #[test]
    fn test_classify_generic_protocol_error() {
        let err = classify_protocol_error("Page.navigate", -32000, "Cannot navigate");
        assert!(matches!(err, Error::Debugger(_)));
    }
}
