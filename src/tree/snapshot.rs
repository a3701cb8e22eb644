//! DOM snapshot ingestion and stable id assignment
//!
//! A snapshot is a flat, document-ordered list of elements with parent
//! indices. Elements that already carry a persisted marker keep that id
//! verbatim; only untagged elements are allocated a new one. Callers hold
//! node ids across multiple asynchronous steps while the DOM gets
//! re-snapshotted underneath them, so id stability is the core contract here.

use super::node::{BoundingBox, Node, NodeRole, NodeTree};
use crate::error::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Length of generated stable ids
const ID_LENGTH: usize = 6;

/// One element in a serialized DOM snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotElement {
    /// Position in document order
    pub index: usize,
    /// Parent's position, absent for the root
    #[serde(default)]
    pub parent: Option<usize>,
    /// Element tag, lowercased
    pub tag: String,
    /// Explicit role attribute, if any
    #[serde(default)]
    pub role: Option<String>,
    /// `type` attribute, for inputs
    #[serde(default)]
    pub input_type: Option<String>,
    /// Previously persisted stable id
    #[serde(default)]
    pub marker: Option<String>,
    /// Accessible name or trimmed text
    #[serde(default)]
    pub name: Option<String>,
    /// Current value, for form controls
    #[serde(default)]
    pub value: Option<String>,
    /// Bounding box in page coordinates
    #[serde(default)]
    pub bounds: BoundingBox,
}

/// A serialized DOM snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomSnapshot {
    pub elements: Vec<SnapshotElement>,
    pub viewport: BoundingBox,
}

/// Result of building a tree from a snapshot
#[derive(Debug)]
pub struct BuiltTree {
    pub tree: NodeTree,
    /// Newly allocated ids, keyed by element index, that still need to be
    /// persisted back into the DOM
    pub new_markers: HashMap<usize, String>,
}

/// Build a node tree from a snapshot, reusing persisted markers and
/// allocating fresh ids for untagged elements.
pub fn build_tree(snapshot: &DomSnapshot, generation: u64) -> Result<BuiltTree> {
    let mut tree = NodeTree::new(generation, snapshot.viewport);
    let mut new_markers = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut ids: HashMap<usize, String> = HashMap::new();
    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();

    // First pass: settle ids and child lists
    for element in &snapshot.elements {
        let id = match &element.marker {
            Some(marker) if !marker.is_empty() && !used.contains(marker) => marker.clone(),
            Some(marker) if used.contains(marker.as_str()) => {
                // Duplicated marker (cloned DOM subtree): only the first
                // occurrence keeps it
                warn!("Duplicate marker {}, allocating a fresh id", marker);
                allocate_id(&used)
            }
            _ => allocate_id(&used),
        };

        if element.marker.as_deref() != Some(id.as_str()) {
            new_markers.insert(element.index, id.clone());
        }
        used.insert(id.clone());
        ids.insert(element.index, id);

        if let Some(parent) = element.parent {
            children.entry(parent).or_default().push(element.index);
        }
    }

    // Second pass: materialize nodes in document order
    for element in &snapshot.elements {
        let id = ids[&element.index].clone();
        let parent = element.parent.and_then(|p| ids.get(&p).cloned());
        if element.parent.is_some() && parent.is_none() {
            return Err(Error::internal(format!(
                "Snapshot element {} references unknown parent",
                element.index
            )));
        }

        let child_ids = children
            .get(&element.index)
            .map(|indices| indices.iter().filter_map(|i| ids.get(i).cloned()).collect())
            .unwrap_or_default();

        tree.insert(Node {
            id,
            role: NodeRole::classify(
                element.role.as_deref(),
                &element.tag,
                element.input_type.as_deref(),
            ),
            tag: element.tag.clone(),
            name: element.name.clone(),
            value: element.value.clone(),
            bounds: element.bounds,
            in_view: element.bounds.intersects(&snapshot.viewport),
            parent,
            children: child_ids,
        });
    }

    Ok(BuiltTree { tree, new_markers })
}

/// Allocate a short id not yet used in this snapshot generation
fn allocate_id(used: &HashSet<String>) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let id: String = (0..ID_LENGTH)
            .map(|_| {
                const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
                ALPHABET[rng.gen_range(0..ALPHABET.len())] as char
            })
            .collect();
        if !used.contains(&id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(index: usize, parent: Option<usize>, tag: &str, marker: Option<&str>) -> SnapshotElement {
        SnapshotElement {
            index,
            parent,
            tag: tag.to_string(),
            role: None,
            input_type: None,
            marker: marker.map(|m| m.to_string()),
            name: None,
            value: None,
            bounds: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 20.0,
            },
        }
    }

    fn snapshot(elements: Vec<SnapshotElement>) -> DomSnapshot {
        DomSnapshot {
            elements,
            viewport: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 1280.0,
                height: 720.0,
            },
        }
    }

    #[test]
    fn test_markers_are_reused_verbatim() {
        let snap = snapshot(vec![
            element(0, None, "body", Some("root01")),
            element(1, Some(0), "button", Some("btn001")),
        ]);

        let built = build_tree(&snap, 1).unwrap();
        assert!(built.tree.contains("root01"));
        assert!(built.tree.contains("btn001"));
        assert!(built.new_markers.is_empty());
    }

    #[test]
    fn test_untagged_elements_get_new_ids() {
        let snap = snapshot(vec![
            element(0, None, "body", Some("root01")),
            element(1, Some(0), "a", None),
        ]);

        let built = build_tree(&snap, 1).unwrap();
        assert_eq!(built.new_markers.len(), 1);
        let new_id = built.new_markers.get(&1).unwrap();
        assert_eq!(new_id.len(), ID_LENGTH);
        assert!(built.tree.contains(new_id));
    }

    #[test]
    fn test_resnapshot_is_idempotent() {
        // First snapshot: allocate
        let snap = snapshot(vec![
            element(0, None, "body", None),
            element(1, Some(0), "button", None),
        ]);
        let first = build_tree(&snap, 1).unwrap();
        let root_id = first.new_markers.get(&0).unwrap().clone();
        let button_id = first.new_markers.get(&1).unwrap().clone();

        // Second snapshot: markers came back from the DOM
        let snap = snapshot(vec![
            element(0, None, "body", Some(&root_id)),
            element(1, Some(0), "button", Some(&button_id)),
        ]);
        let second = build_tree(&snap, 2).unwrap();

        assert!(second.new_markers.is_empty());
        assert!(second.tree.contains(&root_id));
        assert!(second.tree.contains(&button_id));
    }

    #[test]
    fn test_duplicate_markers_are_disambiguated() {
        let snap = snapshot(vec![
            element(0, None, "body", Some("root01")),
            element(1, Some(0), "li", Some("item01")),
            element(2, Some(0), "li", Some("item01")),
        ]);

        let built = build_tree(&snap, 1).unwrap();
        assert_eq!(built.tree.len(), 3);
        assert_eq!(built.new_markers.len(), 1);
        assert!(built.new_markers.contains_key(&2));
    }

    #[test]
    fn test_parent_child_links() {
        let snap = snapshot(vec![
            element(0, None, "body", Some("root01")),
            element(1, Some(0), "ul", Some("list01")),
            element(2, Some(1), "li", Some("item01")),
        ]);

        let built = build_tree(&snap, 1).unwrap();
        let list = built.tree.get("list01").unwrap();
        assert_eq!(list.parent.as_deref(), Some("root01"));
        assert_eq!(list.children, vec!["item01".to_string()]);
    }

    #[test]
    fn test_in_view_flag_follows_viewport() {
        let mut below_fold = element(1, Some(0), "div", Some("below1"));
        below_fold.bounds.y = 5000.0;

        let snap = snapshot(vec![element(0, None, "body", Some("root01")), below_fold]);
        let built = build_tree(&snap, 1).unwrap();

        assert!(built.tree.get("root01").unwrap().in_view);
        assert!(!built.tree.get("below1").unwrap().in_view);
    }
}
