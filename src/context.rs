//! Execution context
//!
//! All context-lifetime state lives in explicitly constructed services
//! handed around through this struct, never in process-wide statics.

use crate::bus::store::BroadcastStore;
use crate::config::Config;
use crate::cursor::CursorCoordinator;
use crate::transport::{DebuggerHost, TransportManager};
use crate::tree::InteractableEngine;
use std::sync::Arc;

/// Wired service graph for one execution context
pub struct ExecContext {
    pub config: Config,
    pub bus: Arc<BroadcastStore>,
    pub transports: Arc<TransportManager>,
    pub engine: Arc<InteractableEngine>,
    pub cursor: Arc<CursorCoordinator>,
}

impl ExecContext {
    /// Wire the full service graph over a host debugger API
    pub fn new(config: Config, host: Arc<dyn DebuggerHost>) -> Arc<Self> {
        let bus = Arc::new(BroadcastStore::default());
        let transports = Arc::new(TransportManager::new(host, Arc::clone(&bus)));
        let engine = Arc::new(InteractableEngine::new(Arc::clone(&transports)));
        let cursor = Arc::new(CursorCoordinator::new(
            Arc::clone(&transports),
            Arc::clone(&bus),
        ));

        Arc::new(Self {
            config,
            bus,
            transports,
            engine,
            cursor,
        })
    }
}

impl std::fmt::Debug for ExecContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecContext")
            .field("attached", &self.transports.is_attached())
            .finish()
    }
}
