//! Broadcast store
//!
//! Ephemeral, process-wide key/value store with change notification. Keys are
//! `type:identifier` strings; writes are last-write-wins with no cross-writer
//! ordering guarantee. The backing store has no change-notifying remove, so
//! deletion is published as a change to an absent value.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

/// Build a broadcast key from its type and identifier parts
pub fn event_key(event_type: &str, identifier: &str) -> String {
    format!("{}:{}", event_type, identifier)
}

/// A single observed change to the store
#[derive(Debug, Clone)]
pub struct BroadcastChange {
    /// Full `type:identifier` key
    pub key: String,
    /// Value after the change; `None` models deletion
    pub new: Option<Value>,
    /// Value before the change, if any
    pub old: Option<Value>,
}

impl BroadcastChange {
    /// Type portion of the key
    pub fn event_type(&self) -> &str {
        self.key.split_once(':').map(|(t, _)| t).unwrap_or(&self.key)
    }

    /// Identifier portion of the key
    pub fn identifier(&self) -> &str {
        self.key.split_once(':').map(|(_, id)| id).unwrap_or("")
    }
}

/// Subscription scope
#[derive(Debug, Clone)]
enum Scope {
    /// Exact `type:identifier` key
    Key(String),
    /// Every identifier under one type
    Type(String),
    /// Everything
    All,
}

/// Filtered change receiver
///
/// Wraps a broadcast receiver and yields only changes matching the
/// subscription's scope.
pub struct BusSubscription {
    inner: broadcast::Receiver<BroadcastChange>,
    scope: Scope,
}

impl BusSubscription {
    /// Receive the next matching change
    pub async fn recv(&mut self) -> Result<BroadcastChange> {
        loop {
            match self.inner.recv().await {
                Ok(change) => {
                    if self.matches(&change) {
                        return Ok(change);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("Subscription lagged behind by {} changes, catching up", n);
                }
                Err(e) => {
                    return Err(Error::internal(format!("Failed to receive change: {}", e)));
                }
            }
        }
    }

    /// Try to receive the next matching change without blocking
    pub fn try_recv(&mut self) -> Result<Option<BroadcastChange>> {
        loop {
            match self.inner.try_recv() {
                Ok(change) => {
                    if self.matches(&change) {
                        return Ok(Some(change));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    debug!("Subscription lagged behind by {} changes, catching up", n);
                }
                Err(e) => {
                    return Err(Error::internal(format!("Channel error: {}", e)));
                }
            }
        }
    }

    fn matches(&self, change: &BroadcastChange) -> bool {
        match &self.scope {
            Scope::Key(key) => change.key == *key,
            Scope::Type(event_type) => change.event_type() == event_type,
            Scope::All => true,
        }
    }
}

/// Broadcast store
///
/// Holds the current value per key and notifies subscribers of every change.
pub struct BroadcastStore {
    values: Arc<RwLock<HashMap<String, Value>>>,
    tx: broadcast::Sender<BroadcastChange>,
}

impl BroadcastStore {
    /// Create a new store with the given notification capacity
    pub fn new(channel_capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(channel_capacity);

        Self {
            values: Arc::new(RwLock::new(HashMap::new())),
            tx,
        }
    }

    /// Publish a value under a key, replacing any previous value
    pub async fn send(&self, key: &str, value: Value) {
        let old = {
            let mut values = self.values.write().await;
            values.insert(key.to_string(), value.clone())
        };

        self.notify(BroadcastChange {
            key: key.to_string(),
            new: Some(value),
            old,
        });
    }

    /// Read the current value under a key
    pub async fn fetch(&self, key: &str) -> Option<Value> {
        self.values.read().await.get(key).cloned()
    }

    /// Remove a key, publishing the removal as a change to an absent value
    pub async fn delete(&self, key: &str) {
        let old = {
            let mut values = self.values.write().await;
            values.remove(key)
        };

        if old.is_none() {
            warn!("Deleting absent key: {}", key);
        }

        self.notify(BroadcastChange {
            key: key.to_string(),
            new: None,
            old,
        });
    }

    /// Subscribe to changes of one exact key
    pub fn subscribe(&self, key: &str) -> BusSubscription {
        BusSubscription {
            inner: self.tx.subscribe(),
            scope: Scope::Key(key.to_string()),
        }
    }

    /// Subscribe to changes of every key under one type
    pub fn subscribe_type(&self, event_type: &str) -> BusSubscription {
        BusSubscription {
            inner: self.tx.subscribe(),
            scope: Scope::Type(event_type.to_string()),
        }
    }

    /// Subscribe to every change
    pub fn subscribe_all(&self) -> BusSubscription {
        BusSubscription {
            inner: self.tx.subscribe(),
            scope: Scope::All,
        }
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    /// Whether the store holds no keys
    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }

    fn notify(&self, change: BroadcastChange) {
        // Send only fails when there are no receivers, which is fine: writes
        // must succeed whether or not anyone is listening.
        if let Err(e) = self.tx.send(change) {
            debug!("No receivers for broadcast change: {}", e);
        }
    }
}

impl Default for BroadcastStore {
    fn default() -> Self {
        Self::new(256)
    }
}
