//! Realtime pub/sub channel
//!
//! Abstract interface over the persistent realtime service the gateway runs
//! on. Subscriptions are handles: dropping one releases it, which keeps every
//! exit path of a staged call leak-free.

use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Duplex realtime pub/sub channel
#[async_trait]
pub trait RealtimeChannel: Send + Sync + std::fmt::Debug {
    /// Publish an event on a topic
    async fn publish(&self, topic: &str, event: &str, payload: Value) -> Result<()>;

    /// Subscribe to one event on a topic
    async fn subscribe(&self, topic: &str, event: &str) -> Result<ChannelSubscription>;
}

/// Registered subscriber entry
struct SubscriberEntry {
    topic: String,
    event: String,
    tx: mpsc::UnboundedSender<Value>,
}

/// Subscription registry shared by channel implementations
#[derive(Default)]
struct SubscriptionTable {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, SubscriberEntry>>,
}

impl SubscriptionTable {
    fn insert(table: &Arc<Self>, topic: &str, event: &str) -> ChannelSubscription {
        let id = table.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();

        table.entries.lock().unwrap().insert(
            id,
            SubscriberEntry {
                topic: topic.to_string(),
                event: event.to_string(),
                tx,
            },
        );

        ChannelSubscription {
            id,
            rx,
            table: Arc::clone(table),
        }
    }

    fn remove(&self, id: u64) {
        self.entries.lock().unwrap().remove(&id);
    }

    fn dispatch(&self, topic: &str, event: &str, payload: &Value) {
        let entries = self.entries.lock().unwrap();
        for entry in entries.values() {
            if entry.topic == topic && entry.event == event {
                let _ = entry.tx.send(payload.clone());
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

/// Live subscription handle. Dropping it releases the subscription.
pub struct ChannelSubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<Value>,
    table: Arc<SubscriptionTable>,
}

impl ChannelSubscription {
    /// Receive the next payload
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        self.table.remove(self.id);
    }
}

impl std::fmt::Debug for ChannelSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSubscription")
            .field("id", &self.id)
            .finish()
    }
}

/// Loopback channel: publishes dispatch straight to local subscribers.
///
/// Used in tests and single-process deployments where caller and responder
/// share the process.
#[derive(Default)]
pub struct InMemoryChannel {
    table: Arc<SubscriptionTable>,
}

impl InMemoryChannel {
    /// Create an empty loopback channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.table.len()
    }
}

#[async_trait]
impl RealtimeChannel for InMemoryChannel {
    async fn publish(&self, topic: &str, event: &str, payload: Value) -> Result<()> {
        debug!("Loopback publish {}/{}", topic, event);
        self.table.dispatch(topic, event, &payload);
        Ok(())
    }

    async fn subscribe(&self, topic: &str, event: &str) -> Result<ChannelSubscription> {
        Ok(SubscriptionTable::insert(&self.table, topic, event))
    }
}

impl std::fmt::Debug for InMemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryChannel")
            .field("subscriptions", &self.table.len())
            .finish()
    }
}

/// Wire frame of the WebSocket-backed realtime service
#[derive(Debug, Serialize, Deserialize)]
struct ChannelFrame {
    topic: String,
    event: String,
    payload: Value,
}

/// WebSocket-backed realtime channel
pub struct WebSocketChannel {
    url: String,
    table: Arc<SubscriptionTable>,
    sender: mpsc::UnboundedSender<ChannelFrame>,
    is_active: Arc<AtomicBool>,
}

impl WebSocketChannel {
    /// Connect to a realtime service endpoint
    pub async fn connect<S: Into<String>>(url: S) -> Result<Arc<Self>> {
        let url = url.into();
        info!("Connecting realtime channel to {}", url);

        let (stream, _) = connect_async(&url)
            .await
            .map_err(|e| Error::channel(format!("Failed to connect to {}: {}", url, e)))?;
        let (mut sink, mut source) = stream.split();

        let table = Arc::new(SubscriptionTable::default());
        let is_active = Arc::new(AtomicBool::new(true));
        let (sender, mut outbound) = mpsc::unbounded_channel::<ChannelFrame>();

        // Writer: serialize outbound frames
        let writer_active = Arc::clone(&is_active);
        tokio::spawn(async move {
            while let Some(frame) = outbound.recv().await {
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to serialize channel frame: {}", e);
                        continue;
                    }
                };
                if sink.send(Message::Text(json)).await.is_err() {
                    warn!("Realtime channel writer closed");
                    writer_active.store(false, Ordering::SeqCst);
                    break;
                }
            }
        });

        // Reader: dispatch inbound frames to local subscribers
        let reader_table = Arc::clone(&table);
        let reader_active = Arc::clone(&is_active);
        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ChannelFrame>(&text) {
                        Ok(frame) => {
                            reader_table.dispatch(&frame.topic, &frame.event, &frame.payload)
                        }
                        Err(e) => warn!("Unknown channel frame: {}", e),
                    },
                    Ok(Message::Close(_)) => {
                        info!("Realtime channel closed by peer");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Realtime channel error: {}", e);
                        break;
                    }
                }
            }
            reader_active.store(false, Ordering::SeqCst);
        });

        Ok(Arc::new(Self {
            url,
            table,
            sender,
            is_active,
        }))
    }

    /// Whether the channel connection is still live
    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RealtimeChannel for WebSocketChannel {
    async fn publish(&self, topic: &str, event: &str, payload: Value) -> Result<()> {
        if !self.is_active() {
            return Err(Error::channel("Realtime channel is not connected"));
        }

        self.sender
            .send(ChannelFrame {
                topic: topic.to_string(),
                event: event.to_string(),
                payload,
            })
            .map_err(|_| Error::channel("Realtime channel writer is gone"))
    }

    async fn subscribe(&self, topic: &str, event: &str) -> Result<ChannelSubscription> {
        if !self.is_active() {
            return Err(Error::channel("Realtime channel is not connected"));
        }

        Ok(SubscriptionTable::insert(&self.table, topic, event))
    }
}

impl std::fmt::Debug for WebSocketChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketChannel")
            .field("url", &self.url)
            .field("active", &self.is_active())
            .finish()
    }
}
