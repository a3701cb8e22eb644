//! Receiver-scoped message dispatcher
//!
//! Routes a `RuntimeMessage` to the handler registered for its action.
//! Messages addressed to a different receiver are ignored, not errors. Every
//! payload is validated against the action's schema before the handler runs,
//! and a handler error becomes a structured failure response so one bad
//! message can never take down the dispatch loop.

use super::message::{Action, Receiver, RuntimeMessage, RuntimeResponse};
use crate::error::{Error, Result};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Async action handler: payload in, result data out
pub type Handler = Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, Result<Option<Value>>> + Send + Sync>;

/// Payload schema check, applied identically on the sender and receiver side
pub type PayloadCheck = fn(Option<&Value>) -> Result<()>;

/// One registered action: its schema check and its handler
pub struct ActionRegistration {
    pub check: PayloadCheck,
    pub handler: Handler,
}

/// Schema check for actions that take no payload
pub fn expect_no_payload(payload: Option<&Value>) -> Result<()> {
    match payload {
        None | Some(Value::Null) => Ok(()),
        Some(_) => Err(Error::interaction_config_invalid(
            "action takes no payload",
        )),
    }
}

/// Schema check for actions whose payload must deserialize as `T`
pub fn expect_payload<T: DeserializeOwned>(payload: Option<&Value>) -> Result<()> {
    let value = payload
        .ok_or_else(|| Error::interaction_config_invalid("payload is required"))?;
    serde_json::from_value::<T>(value.clone())
        .map_err(|e| Error::interaction_config_invalid(format!("payload schema mismatch: {}", e)))?;
    Ok(())
}

/// Receiver-scoped dispatcher
pub struct Dispatcher {
    receiver: Receiver,
    actions: HashMap<Action, ActionRegistration>,
}

impl Dispatcher {
    /// Create a dispatcher bound to one receiver scope
    pub fn new(receiver: Receiver) -> Self {
        Self {
            receiver,
            actions: HashMap::new(),
        }
    }

    /// The receiver scope this dispatcher answers for
    pub fn receiver(&self) -> Receiver {
        self.receiver
    }

    /// Register an action with its schema check and handler
    pub fn register(&mut self, action: Action, check: PayloadCheck, handler: Handler) {
        if self.actions.insert(action, ActionRegistration { check, handler }).is_some() {
            warn!("Replacing handler for action {:?}", action);
        }
    }

    /// Validate a message against the registered schema without dispatching.
    ///
    /// Senders run this before publishing so malformed requests fail locally
    /// instead of round-tripping.
    pub fn validate(&self, message: &RuntimeMessage) -> Result<()> {
        let registration = self
            .actions
            .get(&message.action)
            .ok_or_else(|| Error::internal(format!("Unknown action {:?}", message.action)))?;
        (registration.check)(message.payload.as_ref())
    }

    /// Dispatch a message.
    ///
    /// Returns `None` when the message is addressed to a different receiver.
    pub async fn dispatch(&self, message: RuntimeMessage) -> Option<RuntimeResponse> {
        if message.receiver != self.receiver {
            debug!(
                "Ignoring message for receiver {:?} (we are {:?})",
                message.receiver, self.receiver
            );
            return None;
        }

        let registration = match self.actions.get(&message.action) {
            Some(r) => r,
            None => {
                warn!("No handler registered for action {:?}", message.action);
                return Some(RuntimeResponse::err(format!(
                    "Unknown action {:?}",
                    message.action
                )));
            }
        };

        if let Err(e) = (registration.check)(message.payload.as_ref()) {
            return Some(RuntimeResponse::err(e.to_string()));
        }

        match (registration.handler)(message.payload).await {
            Ok(data) => Some(RuntimeResponse::ok(data)),
            Err(e) => {
                warn!("Handler for {:?} failed: {}", message.action, e);
                Some(RuntimeResponse::err(e.to_string()))
            }
        }
    }
}

/// Wrap a handler body into the boxed handler type
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Option<Value>>> + Send + 'static,
{
    Arc::new(move |payload| Box::pin(f(payload)))
}
