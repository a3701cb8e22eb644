//! Staged RPC responder
//!
//! The receiving half of the gateway: acknowledges every request the moment
//! it arrives, dispatches it through the receiver-scoped dispatcher, then
//! publishes the structured response on the call's response stage.

use super::channel::RealtimeChannel;
use super::rpc::{ack_event, response_event, BROADCAST_EVENT};
use crate::bus::dispatcher::Dispatcher;
use crate::bus::message::{RuntimeMessage, RuntimeResponse};
use crate::error::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Inbound request envelope
#[derive(Debug, Deserialize)]
struct InboundCall {
    #[serde(rename = "eventId")]
    event_id: String,
    payload: Value,
}

/// Staged RPC responder
pub struct RpcResponder {
    channel: Arc<dyn RealtimeChannel>,
    target: String,
    dispatcher: Arc<Dispatcher>,
}

impl RpcResponder {
    /// Create a responder answering on one channel target
    pub fn new(
        channel: Arc<dyn RealtimeChannel>,
        target: impl Into<String>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            channel,
            target: target.into(),
            dispatcher,
        }
    }

    /// Serve requests until the channel closes
    pub async fn serve(&self) -> Result<()> {
        let mut requests = self.channel.subscribe(&self.target, BROADCAST_EVENT).await?;
        info!("Responder serving on {}", self.target);

        while let Some(raw) = requests.recv().await {
            if let Err(e) = self.handle(raw).await {
                warn!("Responder error: {}", e);
            }
        }

        info!("Responder channel closed");
        Ok(())
    }

    /// Spawn the serve loop on the runtime
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.serve().await {
                warn!("Responder stopped: {}", e);
            }
        })
    }

    async fn handle(&self, raw: Value) -> Result<()> {
        let call: InboundCall = match serde_json::from_value(raw) {
            Ok(call) => call,
            Err(e) => {
                // No event id to answer on; all we can do is log
                warn!("Malformed inbound call: {}", e);
                return Ok(());
            }
        };

        // Ack first: the caller's first stage only asks whether we exist
        self.channel
            .publish(
                &self.target,
                &ack_event(&call.event_id),
                json!({ "eventId": call.event_id }),
            )
            .await?;

        let response = match serde_json::from_value::<RuntimeMessage>(call.payload) {
            Ok(message) => {
                debug!("Dispatching call {} ({:?})", call.event_id, message.action);
                match self.dispatcher.dispatch(message).await {
                    Some(response) => response,
                    None => {
                        // Addressed to a different receiver: not ours, not an
                        // error, no response stage either
                        debug!("Call {} addressed elsewhere", call.event_id);
                        return Ok(());
                    }
                }
            }
            Err(e) => RuntimeResponse::err(format!("Malformed runtime message: {}", e)),
        };

        self.channel
            .publish(
                &self.target,
                &response_event(&call.event_id),
                serde_json::to_value(&response)?,
            )
            .await?;

        Ok(())
    }
}

impl std::fmt::Debug for RpcResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcResponder")
            .field("target", &self.target)
            .finish()
    }
}
