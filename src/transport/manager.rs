//! Transport manager
//!
//! Caches at most one live transport per tab, tracks the active tab, and owns
//! the single global event/detach listener that fans protocol events out to
//! every cached session.

use super::session::Transport;
use super::traits::{DebuggerHost, HostEvent, Tab, TabId};
use crate::bus::store::{event_key, BroadcastStore};
use crate::error::{Error, Result};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Broadcast type for debugger status changes
pub const STATUS_EVENT_TYPE: &str = "status";

/// Transport manager
pub struct TransportManager {
    host: Arc<dyn DebuggerHost>,
    bus: Arc<BroadcastStore>,
    transports: Arc<Mutex<HashMap<TabId, Arc<Transport>>>>,
    active_tab: RwLock<Option<Tab>>,
    attached: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl TransportManager {
    /// Create a manager over a host debugger API
    pub fn new(host: Arc<dyn DebuggerHost>, bus: Arc<BroadcastStore>) -> Self {
        Self {
            host,
            bus,
            transports: Arc::new(Mutex::new(HashMap::new())),
            active_tab: RwLock::new(None),
            attached: AtomicBool::new(false),
            listener: Mutex::new(None),
        }
    }

    /// Fetch a fresh transport for a tab.
    ///
    /// Any previously cached transport for the tab is disconnected and
    /// evicted first, so at most one live transport exists per tab.
    pub async fn fetch_transport_for_tab(&self, tab_id: &TabId) -> Result<Arc<Transport>> {
        let mut transports = self.transports.lock().await;

        if let Some(existing) = transports.remove(tab_id) {
            debug!("Evicting existing transport for tab {}", tab_id);
            existing.disconnect().await?;
        }

        let transport = Arc::new(Transport::new(Arc::clone(&self.host), tab_id.clone()));
        transports.insert(tab_id.clone(), Arc::clone(&transport));

        Ok(transport)
    }

    /// Get the cached transport for a tab, creating one lazily
    pub async fn transport(&self, tab_id: &TabId) -> Result<Arc<Transport>> {
        {
            let transports = self.transports.lock().await;
            if let Some(existing) = transports.get(tab_id) {
                if !existing.is_closed() {
                    return Ok(Arc::clone(existing));
                }
            }
        }

        self.fetch_transport_for_tab(tab_id).await
    }

    /// Transport for the current active tab
    pub async fn active_transport(&self) -> Result<Arc<Transport>> {
        let tab = self
            .active_tab()
            .await
            .ok_or_else(|| Error::internal("No active tab"))?;
        self.transport(&tab.id).await
    }

    /// Attach to the current active tab. Idempotent.
    pub async fn attach(&self) -> Result<()> {
        if self.attached.load(Ordering::SeqCst) {
            debug!("Already attached");
            return Ok(());
        }

        let tabs = self.host.query_tabs().await?;
        let tab = tabs
            .into_iter()
            .next()
            .ok_or_else(|| Error::transport_unavailable("Host reported no tabs"))?;

        info!("Attaching to tab {} ({})", tab.id, tab.url);

        let transport = self.fetch_transport_for_tab(&tab.id).await?;
        if tab.is_debuggable() {
            transport.connect().await?;
        } else {
            info!("Tab {} is an internal page, skipping connect", tab.url);
        }

        *self.active_tab.write().await = Some(tab);

        self.spawn_listener().await?;
        self.attached.store(true, Ordering::SeqCst);
        self.broadcast_status(true).await;

        Ok(())
    }

    /// Detach from everything. Idempotent.
    pub async fn detach(&self) -> Result<()> {
        if !self.attached.load(Ordering::SeqCst) {
            debug!("Not attached");
            return Ok(());
        }

        let drained: Vec<Arc<Transport>> = {
            let mut transports = self.transports.lock().await;
            transports.drain().map(|(_, t)| t).collect()
        };

        for transport in drained {
            if let Err(e) = transport.disconnect().await {
                warn!("Disconnect failed during detach: {}", e);
            }
        }

        if let Some(listener) = self.listener.lock().await.take() {
            listener.abort();
        }

        self.attached.store(false, Ordering::SeqCst);
        self.broadcast_status(false).await;

        Ok(())
    }

    /// Whether the manager is attached
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Guard for operations that require a live attachment
    pub fn ensure_attached(&self) -> Result<()> {
        if self.is_attached() {
            Ok(())
        } else {
            Err(Error::internal("Debugger is not attached"))
        }
    }

    /// Current active tab, if any
    pub async fn active_tab(&self) -> Option<Tab> {
        self.active_tab.read().await.clone()
    }

    /// Replace the active tab record (navigation/activation)
    pub async fn set_active_tab(&self, tab: Tab) {
        *self.active_tab.write().await = Some(tab);
    }

    /// Number of cached transports
    pub async fn transport_count(&self) -> usize {
        self.transports.lock().await.len()
    }

    /// Register the single global event/detach listener.
    ///
    /// Protocol events fan out to every cached transport whose message
    /// handler is set, each tagged with that transport's own logical session
    /// id: one physical connection carries many logical sessions (main frame,
    /// iframes, workers), never a 1:1 mapping.
    async fn spawn_listener(&self) -> Result<()> {
        let mut guard = self.listener.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let mut events = self.host.listen().await?;
        let transports = Arc::clone(&self.transports);

        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    HostEvent::Protocol { method, params, .. } => {
                        let transports = transports.lock().await;
                        for transport in transports.values() {
                            transport.deliver(&method, &params);
                        }
                    }
                    HostEvent::Detached { tab_id, reason } => {
                        info!("Physical detach for tab {}: {}", tab_id, reason);
                        let transports = transports.lock().await;
                        for transport in transports.values() {
                            transport.notify_closed();
                        }
                    }
                }
            }
            debug!("Global debugger listener finished");
        });

        *guard = Some(handle);
        Ok(())
    }

    async fn broadcast_status(&self, attached: bool) {
        self.bus
            .send(
                &event_key(STATUS_EVENT_TYPE, "debugger"),
                json!({ "attached": attached }),
            )
            .await;
    }
}

impl std::fmt::Debug for TransportManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportManager")
            .field("attached", &self.attached.load(Ordering::SeqCst))
            .finish()
    }
}
