//! Interactable engine
//!
//! Owns the current node tree for the active tab: builds it from live DOM
//! snapshots, persists newly allocated stable ids back into the page, serves
//! full/view/paginated reads, and dispatches interactions.

use super::interaction::{self, InteractionKind};
use super::node::{Node, NodeTree};
use super::pagination::{self, TreePage};
use super::scripts;
use super::snapshot::{self, DomSnapshot};
use crate::error::{Error, Result};
use crate::transport::TransportManager;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Interactable engine
pub struct InteractableEngine {
    transports: Arc<TransportManager>,
    tree: RwLock<Option<NodeTree>>,
    generation: AtomicU64,
}

impl InteractableEngine {
    /// Create an engine over a transport manager
    pub fn new(transports: Arc<TransportManager>) -> Self {
        Self {
            transports,
            tree: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Rebuild the tree from a live DOM snapshot.
    ///
    /// Newly allocated stable ids are written back into the page so the next
    /// snapshot round-trips them.
    pub async fn refresh(&self) -> Result<()> {
        let transport = self.transports.active_transport().await?;

        let raw = transport.evaluate(scripts::SNAPSHOT_SCRIPT).await?;
        let serialized = raw
            .as_str()
            .ok_or_else(|| Error::debugger("Snapshot script returned a non-string value"))?;
        let snapshot: DomSnapshot = serde_json::from_str(serialized)?;

        let new_markers = self.load_snapshot(snapshot).await?;
        if !new_markers.is_empty() {
            debug!("Persisting {} new node markers", new_markers.len());
            transport
                .evaluate(&scripts::persist_markers_script(&new_markers))
                .await?;
        }

        Ok(())
    }

    /// Build the tree from a pre-serialized snapshot.
    ///
    /// Returns the newly allocated markers, keyed by element index, that
    /// still need persisting into the DOM.
    pub async fn load_snapshot(&self, snapshot: DomSnapshot) -> Result<HashMap<usize, String>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let built = snapshot::build_tree(&snapshot, generation)?;

        info!(
            "Built tree generation {} with {} nodes ({} new markers)",
            generation,
            built.tree.len(),
            built.new_markers.len()
        );

        *self.tree.write().await = Some(built.tree);
        Ok(built.new_markers)
    }

    /// Current full tree, refreshed first when none has been built yet
    pub async fn fetch_full_tree(&self) -> Result<NodeTree> {
        if self.tree.read().await.is_none() {
            self.refresh().await?;
        }

        self.tree
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::internal("Tree is empty after refresh"))
    }

    /// Current tree filtered to viewport-intersecting nodes
    pub async fn fetch_view_tree(&self) -> Result<NodeTree> {
        Ok(self.fetch_full_tree().await?.view_tree())
    }

    /// Serialize the current tree under a token budget
    pub async fn fetch_paginated_tree(&self, max_token_size: usize) -> Result<TreePage> {
        let tree = self.fetch_full_tree().await?;
        Ok(pagination::paginate(&tree, max_token_size, 0))
    }

    /// Resume a paginated serialization
    pub async fn fetch_paginated_tree_by_cursor(
        &self,
        max_token_size: usize,
        cursor: &str,
    ) -> Result<TreePage> {
        let tree = self.fetch_full_tree().await?;
        pagination::paginate_by_cursor(&tree, max_token_size, cursor)
    }

    /// Resolve a node id against the current tree
    pub async fn resolve(&self, node_id: &str) -> Result<Node> {
        let guard = self.tree.read().await;
        let tree = guard
            .as_ref()
            .ok_or_else(|| Error::node_not_found(node_id.to_string()))?;

        tree.get(node_id).cloned().ok_or_else(|| {
            Error::node_not_found(format!(
                "{} is not in tree generation {} (the DOM may have changed)",
                node_id, tree.generation
            ))
        })
    }

    /// Perform a typed interaction against a node
    pub async fn perform_interaction(
        &self,
        node_id: &str,
        kind: InteractionKind,
        config: Option<Value>,
    ) -> Result<Option<Value>> {
        let node = self.resolve(node_id).await?;
        let transport = self.transports.active_transport().await?;
        interaction::perform(&transport, &node, kind, config).await
    }
}

impl std::fmt::Debug for InteractableEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractableEngine")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}
