//! Unified error types for Tabscope

use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Tabscope
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Required host debugger API is missing or unreachable. Fatal, never retried.
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Internal/blank page that cannot be instrumented. The operation is
    /// skipped, not failed.
    #[error("Tab not debuggable: {0}")]
    TabNotDebuggable(String),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Realtime channel errors
    #[error("Channel error: {0}")]
    Channel(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Node id absent from the current tree (stale reference)
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Interaction config rejected by its schema before any side effects
    #[error("Invalid interaction config: {0}")]
    InteractionConfigInvalid(String),

    /// Interaction requires a node role the target does not have
    #[error("Role mismatch: {0}")]
    RoleMismatch(String),

    /// No acknowledgment within the ack window: the peer never received the
    /// request
    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),

    /// Acknowledged but no response within the response window
    #[error("Operation timed out: {0}")]
    OperationTimeout(String),

    /// The peer received the request and reported a failure
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// Pointer button state disagrees with the requested transition.
    /// Recoverable via cursor reset.
    #[error("Pointer state conflict: {0}")]
    PointerStateConflict(String),

    /// Debugger protocol errors
    #[error("Debugger error: {0}")]
    Debugger(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error classification, used by the retry helper's allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    TransportUnavailable,
    TabNotDebuggable,
    WebSocket,
    Channel,
    Serialization,
    NodeNotFound,
    InteractionConfigInvalid,
    RoleMismatch,
    PeerUnreachable,
    OperationTimeout,
    OperationFailed,
    PointerStateConflict,
    Debugger,
    Configuration,
    Internal,
}

impl Error {
    /// Create a new transport unavailable error
    pub fn transport_unavailable<S: Into<String>>(msg: S) -> Self {
        Error::TransportUnavailable(msg.into())
    }

    /// Create a new tab not debuggable error
    pub fn tab_not_debuggable<S: Into<String>>(msg: S) -> Self {
        Error::TabNotDebuggable(msg.into())
    }

    /// Create a new WebSocket error
    pub fn websocket<S: Into<String>>(msg: S) -> Self {
        Error::WebSocket(msg.into())
    }

    /// Create a new channel error
    pub fn channel<S: Into<String>>(msg: S) -> Self {
        Error::Channel(msg.into())
    }

    /// Create a new node not found error
    pub fn node_not_found<S: Into<String>>(id: S) -> Self {
        Error::NodeNotFound(id.into())
    }

    /// Create a new invalid interaction config error
    pub fn interaction_config_invalid<S: Into<String>>(msg: S) -> Self {
        Error::InteractionConfigInvalid(msg.into())
    }

    /// Create a new role mismatch error
    pub fn role_mismatch<S: Into<String>>(msg: S) -> Self {
        Error::RoleMismatch(msg.into())
    }

    /// Create a new peer unreachable error
    pub fn peer_unreachable<S: Into<String>>(msg: S) -> Self {
        Error::PeerUnreachable(msg.into())
    }

    /// Create a new operation timeout error
    pub fn operation_timeout<S: Into<String>>(msg: S) -> Self {
        Error::OperationTimeout(msg.into())
    }

    /// Create a new operation failed error
    pub fn operation_failed<S: Into<String>>(msg: S) -> Self {
        Error::OperationFailed(msg.into())
    }

    /// Create a new pointer state conflict error
    pub fn pointer_state_conflict<S: Into<String>>(msg: S) -> Self {
        Error::PointerStateConflict(msg.into())
    }

    /// Create a new debugger protocol error
    pub fn debugger<S: Into<String>>(msg: S) -> Self {
        Error::Debugger(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Classify this error for retry decisions
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::TransportUnavailable(_) => ErrorKind::TransportUnavailable,
            Error::TabNotDebuggable(_) => ErrorKind::TabNotDebuggable,
            Error::WebSocket(_) => ErrorKind::WebSocket,
            Error::Channel(_) => ErrorKind::Channel,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::NodeNotFound(_) => ErrorKind::NodeNotFound,
            Error::InteractionConfigInvalid(_) => ErrorKind::InteractionConfigInvalid,
            Error::RoleMismatch(_) => ErrorKind::RoleMismatch,
            Error::PeerUnreachable(_) => ErrorKind::PeerUnreachable,
            Error::OperationTimeout(_) => ErrorKind::OperationTimeout,
            Error::OperationFailed(_) => ErrorKind::OperationFailed,
            Error::PointerStateConflict(_) => ErrorKind::PointerStateConflict,
            Error::Debugger(_) => ErrorKind::Debugger,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}
