//! Interactable engine
//!
//! Builds a stable, addressable tree over DOM snapshots and dispatches typed
//! interactions against it. External callers reference nodes by short stable
//! ids that survive re-snapshotting.

pub mod engine;
pub mod interaction;
pub mod keys;
pub mod node;
pub mod pagination;
pub mod scripts;
pub mod snapshot;

pub use engine::InteractableEngine;
pub use interaction::InteractionKind;
pub use node::{BoundingBox, Node, NodeId, NodeRole, NodeTree};
pub use pagination::TreePage;
pub use snapshot::{DomSnapshot, SnapshotElement};
