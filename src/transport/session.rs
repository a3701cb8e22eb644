//! Per-tab logical debugger session

use super::traits::{DebuggerHost, TabId};
use crate::error::{Error, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Protocol message delivered to a session's handler, tagged with the
/// session's own logical id
#[derive(Debug, Clone)]
pub struct SessionMessage {
    /// Logical session the message was delivered through
    pub session_id: String,
    /// Protocol method
    pub method: String,
    /// Event parameters
    pub params: Value,
}

/// Close callback, fired exactly once when the physical connection detaches
type CloseCallback = Box<dyn FnOnce() + Send>;

/// A logical debugger session bound to one tab.
///
/// Many transports can share one physical connection; each carries its own
/// logical session id so consumers can tell the streams apart.
pub struct Transport {
    tab_id: TabId,
    session_id: String,
    host: Arc<dyn DebuggerHost>,
    message_handler: Mutex<Option<mpsc::UnboundedSender<SessionMessage>>>,
    on_close: Mutex<Option<CloseCallback>>,
    connected: AtomicBool,
    closed: AtomicBool,
}

impl Transport {
    /// Create a session for a tab. The session is not connected until
    /// [`Transport::connect`] is called.
    pub fn new(host: Arc<dyn DebuggerHost>, tab_id: TabId) -> Self {
        Self {
            tab_id,
            session_id: Uuid::new_v4().to_string(),
            host,
            message_handler: Mutex::new(None),
            on_close: Mutex::new(None),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Tab this session is bound to
    pub fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    /// Logical session id
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Attach the physical debugger to this session's tab
    pub async fn connect(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::internal("Transport already closed"));
        }
        if self.connected.swap(true, Ordering::SeqCst) {
            debug!("Session {} already connected", self.session_id);
            return Ok(());
        }

        self.host.attach(&self.tab_id).await
    }

    /// Detach and mark this session closed
    pub async fn disconnect(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if self.connected.load(Ordering::SeqCst) {
            if let Err(e) = self.host.detach(&self.tab_id).await {
                warn!("Detach for session {} failed: {}", self.session_id, e);
            }
        }

        Ok(())
    }

    /// Send a protocol command through this session
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::internal(format!(
                "Session {} is closed",
                self.session_id
            )));
        }

        debug!("Session {} -> {}", self.session_id, method);
        self.host.send_command(&self.tab_id, method, params).await
    }

    /// Evaluate a JavaScript expression in the tab and return its value
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .send(
                "Runtime.evaluate",
                serde_json::json!({
                    "expression": expression,
                    "returnByValue": true,
                }),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let description = exception
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(|d| d.as_str())
                .unwrap_or("Unknown evaluation error");
            return Err(Error::debugger(description.to_string()));
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Install the message handler. Events are only delivered while a handler
    /// is set.
    pub fn set_message_handler(&self, handler: mpsc::UnboundedSender<SessionMessage>) {
        *self.message_handler.lock().unwrap() = Some(handler);
    }

    /// Remove the message handler
    pub fn clear_message_handler(&self) {
        *self.message_handler.lock().unwrap() = None;
    }

    /// Install the close callback. Fired at most once.
    pub fn set_on_close(&self, callback: impl FnOnce() + Send + 'static) {
        *self.on_close.lock().unwrap() = Some(Box::new(callback));
    }

    /// Deliver a protocol event to this session's handler, tagged with the
    /// session's own id. No-op while no handler is set.
    pub fn deliver(&self, method: &str, params: &Value) {
        let guard = self.message_handler.lock().unwrap();
        if let Some(handler) = guard.as_ref() {
            let message = SessionMessage {
                session_id: self.session_id.clone(),
                method: method.to_string(),
                params: params.clone(),
            };
            if handler.send(message).is_err() {
                debug!("Handler for session {} dropped", self.session_id);
            }
        }
    }

    /// Mark the session closed after a physical detach and fire the close
    /// callback. Repeat notifications are ignored.
    pub fn notify_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let callback = self.on_close.lock().unwrap().take();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Whether this session has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("tab_id", &self.tab_id)
            .field("session_id", &self.session_id)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}
