//! Staged RPC caller
//!
//! Each call publishes a request carrying a fresh event id, then waits on two
//! independent stages: an ack that only proves the peer received the request,
//! and the response that completes it. The classification is strict — no ack
//! means the peer is unreachable, an ack followed by silence means the
//! operation timed out, and a peer-reported error is an operation failure.
//! These outcomes are mutually exclusive.

use super::channel::RealtimeChannel;
use crate::bus::message::{RuntimeMessage, RuntimeResponse};
use crate::config::Config;
use crate::error::{Error, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Event name carrying requests
pub const BROADCAST_EVENT: &str = "broadcast";

/// Stage event for acknowledgments of one call
pub fn ack_event(event_id: &str) -> String {
    format!("ack:{}", event_id)
}

/// Stage event for the response of one call
pub fn response_event(event_id: &str) -> String {
    format!("response:{}", event_id)
}

/// Independent stage timeouts
#[derive(Debug, Clone, Copy)]
pub struct RpcTimeouts {
    /// Window for the peer to acknowledge receipt
    pub ack: Duration,
    /// Window for the full operation
    pub response: Duration,
}

impl Default for RpcTimeouts {
    fn default() -> Self {
        Self {
            ack: Duration::from_secs(10),
            response: Duration::from_secs(30),
        }
    }
}

impl RpcTimeouts {
    /// Timeouts from configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            ack: Duration::from_millis(config.ack_timeout_ms),
            response: Duration::from_millis(config.response_timeout_ms),
        }
    }
}

/// Staged RPC caller over a realtime channel
pub struct RpcGateway {
    channel: Arc<dyn RealtimeChannel>,
    timeouts: RpcTimeouts,
}

impl RpcGateway {
    /// Create a gateway with default timeouts
    pub fn new(channel: Arc<dyn RealtimeChannel>) -> Self {
        Self {
            channel,
            timeouts: RpcTimeouts::default(),
        }
    }

    /// Create a gateway with explicit timeouts
    pub fn with_timeouts(channel: Arc<dyn RealtimeChannel>, timeouts: RpcTimeouts) -> Self {
        Self { channel, timeouts }
    }

    /// Send one runtime message to a channel target and wait for the staged
    /// reply.
    ///
    /// Returns the peer's structured response; `Err` is reserved for the
    /// transport-level outcomes (`peer-unreachable`, `operation-timeout`,
    /// channel failures). Both stage subscriptions are handles that release
    /// on drop, so every exit path cleans up.
    pub async fn send_runtime_message(
        &self,
        channel_target: &str,
        message: &RuntimeMessage,
    ) -> Result<RuntimeResponse> {
        let event_id = Uuid::new_v4().to_string();

        // Subscribe to both stages before publishing, or a fast peer could
        // reply into the void.
        let mut ack_sub = self
            .channel
            .subscribe(channel_target, &ack_event(&event_id))
            .await?;
        let mut response_sub = self
            .channel
            .subscribe(channel_target, &response_event(&event_id))
            .await?;

        debug!("Publishing call {} to {}", event_id, channel_target);
        self.channel
            .publish(
                channel_target,
                BROADCAST_EVENT,
                json!({ "eventId": event_id, "payload": message }),
            )
            .await?;

        // Stage one: the ack only proves the peer received the request
        match tokio::time::timeout(self.timeouts.ack, ack_sub.recv()).await {
            Ok(Some(_)) => debug!("Call {} acknowledged", event_id),
            Ok(None) => {
                return Err(Error::channel("Realtime channel closed while waiting for ack"))
            }
            Err(_) => {
                info!("Call {} got no ack within {:?}", event_id, self.timeouts.ack);
                return Err(Error::peer_unreachable(format!(
                    "no acknowledgment from {} within {:?}",
                    channel_target, self.timeouts.ack
                )));
            }
        }

        // Stage two: the full operation
        let payload = match tokio::time::timeout(self.timeouts.response, response_sub.recv()).await
        {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                return Err(Error::channel(
                    "Realtime channel closed while waiting for response",
                ))
            }
            Err(_) => {
                info!(
                    "Call {} acknowledged but unanswered within {:?}",
                    event_id, self.timeouts.response
                );
                return Err(Error::operation_timeout(format!(
                    "{} acknowledged the request but did not answer within {:?}",
                    channel_target, self.timeouts.response
                )));
            }
        };

        let response: RuntimeResponse = serde_json::from_value(payload)?;
        Ok(response)
    }

    /// Send a message and flatten the peer's outcome into the error taxonomy:
    /// a peer-reported failure becomes `operation-failed`.
    pub async fn call(
        &self,
        channel_target: &str,
        message: &RuntimeMessage,
    ) -> Result<Option<Value>> {
        match self.send_runtime_message(channel_target, message).await? {
            RuntimeResponse::Success { data, .. } => Ok(data),
            RuntimeResponse::Failure { error, .. } => Err(Error::operation_failed(error)),
        }
    }
}

impl std::fmt::Debug for RpcGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcGateway")
            .field("timeouts", &self.timeouts)
            .finish()
    }
}
