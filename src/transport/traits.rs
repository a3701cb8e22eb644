//! Debug transport layer traits
//!
//! Abstract interface over the host browser's debugger and tab APIs. The real
//! implementation bridges to a remote-debugging endpoint; tests use a mock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Identifier of a controllable browser tab (debug target id)
pub type TabId = String;

/// Tab load status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    Complete,
}

/// A controllable browser tab.
///
/// Owned by the transport manager's active-tab tracker; read-only to every
/// other component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tab {
    /// Tab identifier
    pub id: TabId,
    /// Window the tab belongs to
    pub window_id: u32,
    /// Current URL
    pub url: String,
    /// Current title
    pub title: String,
    /// Load status
    pub status: TabStatus,
}

impl Tab {
    /// Whether this tab can be instrumented by the debugger.
    ///
    /// Internal pages (settings, devtools, blank pages) refuse attachment.
    pub fn is_debuggable(&self) -> bool {
        const INTERNAL_PREFIXES: &[&str] = &[
            "chrome://",
            "chrome-extension://",
            "devtools://",
            "edge://",
            "about:",
            "view-source:",
        ];

        !self.url.is_empty()
            && !INTERNAL_PREFIXES
                .iter()
                .any(|prefix| self.url.starts_with(prefix))
    }
}

/// Event delivered by the host's single global listener
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// Protocol event from the physical debugger connection
    Protocol {
        /// Source tab
        tab_id: TabId,
        /// Protocol method (e.g. "Page.frameNavigated")
        method: String,
        /// Event parameters
        params: Value,
    },
    /// Physical debugger detach
    Detached {
        /// Detached tab
        tab_id: TabId,
        /// Host-supplied reason
        reason: String,
    },
}

/// Host debugger/tab API.
///
/// One physical debugger connection carries commands and events for many
/// logical targets; this trait is the boundary to that connection.
#[async_trait]
pub trait DebuggerHost: Send + Sync + std::fmt::Debug {
    /// Attach the physical debugger to a tab
    async fn attach(&self, tab_id: &TabId) -> crate::Result<()>;

    /// Detach the physical debugger from a tab
    async fn detach(&self, tab_id: &TabId) -> crate::Result<()>;

    /// Send a protocol command to a tab and wait for its result
    async fn send_command(
        &self,
        tab_id: &TabId,
        method: &str,
        params: Value,
    ) -> crate::Result<Value>;

    /// Subscribe to the global event/detach stream
    async fn listen(&self) -> crate::Result<mpsc::UnboundedReceiver<HostEvent>>;

    /// Query the host's current tabs, active tab first
    async fn query_tabs(&self) -> crate::Result<Vec<Tab>>;
}
