//! Runtime message envelope
//!
//! Messages are routed only to the handler registered for their `receiver`;
//! the response is a discriminated union of success and failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Execution context a message is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Receiver {
    /// Background service process
    ServiceWorker,
    /// Injected content script
    ContentScript,
    /// The web page itself
    Page,
    /// Remote web client
    Portal,
}

/// Closed action vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Ping,
    Attach,
    Detach,
    FetchFullTree,
    FetchViewTree,
    FetchPaginatedTree,
    FetchPaginatedTreeByCursor,
    PerformInteraction,
    MoveCursor,
    ClickCursor,
    DragCursor,
    ResetCursor,
    ReportCursor,
}

/// Typed message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeMessage {
    /// Handler scope this message is addressed to
    pub receiver: Receiver,
    /// Requested operation
    pub action: Action,
    /// Action-specific payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl RuntimeMessage {
    /// Create a message without payload
    pub fn new(receiver: Receiver, action: Action) -> Self {
        Self {
            receiver,
            action,
            payload: None,
        }
    }

    /// Create a message with a payload
    pub fn with_payload(receiver: Receiver, action: Action, payload: Value) -> Self {
        Self {
            receiver,
            action,
            payload: Some(payload),
        }
    }
}

/// Discriminated response union: `{success:true, data}` or
/// `{success:false, error}`.
///
/// `Failure` is listed first so untagged deserialization matches the
/// `error` field before falling back to the optional `data` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuntimeResponse {
    Failure {
        success: bool,
        error: String,
    },
    Success {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
}

impl RuntimeResponse {
    /// Create a success response
    pub fn ok(data: Option<Value>) -> Self {
        RuntimeResponse::Success {
            success: true,
            data,
        }
    }

    /// Create a failure response
    pub fn err<S: Into<String>>(error: S) -> Self {
        RuntimeResponse::Failure {
            success: false,
            error: error.into(),
        }
    }

    /// Whether this response carries a success
    pub fn is_success(&self) -> bool {
        matches!(self, RuntimeResponse::Success { .. })
    }

    /// Response data, if any
    pub fn data(&self) -> Option<&Value> {
        match self {
            RuntimeResponse::Success { data, .. } => data.as_ref(),
            RuntimeResponse::Failure { .. } => None,
        }
    }

    /// Error message, if this is a failure
    pub fn error(&self) -> Option<&str> {
        match self {
            RuntimeResponse::Failure { error, .. } => Some(error),
            RuntimeResponse::Success { .. } => None,
        }
    }
}

impl From<crate::Result<Option<Value>>> for RuntimeResponse {
    fn from(result: crate::Result<Option<Value>>) -> Self {
        match result {
            Ok(data) => RuntimeResponse::ok(data),
            Err(e) => RuntimeResponse::err(e.to_string()),
        }
    }
}
