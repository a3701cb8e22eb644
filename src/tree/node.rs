//! Interactable node arena
//!
//! The raw accessibility/DOM data is graph-shaped; nodes here live in an
//! arena addressed by string handles with explicit parent/children handle
//! fields, so the structure is always an acyclic tree and trivially
//! serializable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable node identifier
pub type NodeId = String;

/// Axis-aligned box in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Center point of the box
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether two boxes overlap
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Role classification of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Button,
    Link,
    TextInput,
    Checkbox,
    Radio,
    Select,
    Image,
    Canvas,
    Heading,
    Text,
    List,
    ListItem,
    Table,
    Container,
}

impl NodeRole {
    /// Classify from an explicit role attribute or the element tag
    pub fn classify(explicit_role: Option<&str>, tag: &str, input_type: Option<&str>) -> Self {
        if let Some(role) = explicit_role {
            match role {
                "button" => return NodeRole::Button,
                "link" => return NodeRole::Link,
                "textbox" | "searchbox" => return NodeRole::TextInput,
                "checkbox" => return NodeRole::Checkbox,
                "radio" => return NodeRole::Radio,
                "listbox" | "combobox" => return NodeRole::Select,
                "img" => return NodeRole::Image,
                "heading" => return NodeRole::Heading,
                "list" => return NodeRole::List,
                "listitem" => return NodeRole::ListItem,
                "table" | "grid" => return NodeRole::Table,
                _ => {}
            }
        }

        match tag {
            "button" => NodeRole::Button,
            "a" => NodeRole::Link,
            "textarea" => NodeRole::TextInput,
            "input" => match input_type.unwrap_or("text") {
                "checkbox" => NodeRole::Checkbox,
                "radio" => NodeRole::Radio,
                "button" | "submit" | "reset" => NodeRole::Button,
                _ => NodeRole::TextInput,
            },
            "select" => NodeRole::Select,
            "img" => NodeRole::Image,
            "canvas" => NodeRole::Canvas,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => NodeRole::Heading,
            "p" | "span" | "label" | "strong" | "em" => NodeRole::Text,
            "ul" | "ol" => NodeRole::List,
            "li" => NodeRole::ListItem,
            "table" => NodeRole::Table,
            _ => NodeRole::Container,
        }
    }

    /// Short name used in tree serialization
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Button => "button",
            NodeRole::Link => "link",
            NodeRole::TextInput => "textinput",
            NodeRole::Checkbox => "checkbox",
            NodeRole::Radio => "radio",
            NodeRole::Select => "select",
            NodeRole::Image => "image",
            NodeRole::Canvas => "canvas",
            NodeRole::Heading => "heading",
            NodeRole::Text => "text",
            NodeRole::List => "list",
            NodeRole::ListItem => "listitem",
            NodeRole::Table => "table",
            NodeRole::Container => "container",
        }
    }
}

/// One interactable node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Stable identifier, persisted into the DOM as a marker attribute
    pub id: NodeId,
    /// Role classification
    pub role: NodeRole,
    /// Element tag
    pub tag: String,
    /// Accessible name or trimmed text content
    pub name: Option<String>,
    /// Current value, for form controls
    pub value: Option<String>,
    /// Bounding box in page coordinates
    pub bounds: BoundingBox,
    /// Whether the box intersects the viewport
    pub in_view: bool,
    /// Parent handle
    pub parent: Option<NodeId>,
    /// Child handles in document order
    pub children: Vec<NodeId>,
}

/// Rooted arena of interactable nodes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeTree {
    nodes: HashMap<NodeId, Node>,
    root: Option<NodeId>,
    /// Depth-first order, for deterministic serialization and pagination
    order: Vec<NodeId>,
    /// Snapshot generation this tree was built from
    pub generation: u64,
    /// Viewport at build time
    pub viewport: BoundingBox,
}

impl NodeTree {
    /// Create an empty tree for a generation
    pub fn new(generation: u64, viewport: BoundingBox) -> Self {
        Self {
            nodes: HashMap::new(),
            root: None,
            order: Vec::new(),
            generation,
            viewport,
        }
    }

    /// Insert a node. The first inserted node becomes the root.
    pub fn insert(&mut self, node: Node) {
        if self.root.is_none() {
            self.root = Some(node.id.clone());
        }
        self.order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
    }

    /// Look up a node by handle
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Whether the tree holds a handle
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Root handle
    pub fn root(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in depth-first order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Handles in depth-first order
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Depth of a node (root = 0), following parent handles
    pub fn depth(&self, id: &str) -> usize {
        let mut depth = 0;
        let mut current = self.nodes.get(id).and_then(|n| n.parent.as_deref());
        while let Some(parent_id) = current {
            depth += 1;
            current = self.nodes.get(parent_id).and_then(|n| n.parent.as_deref());
        }
        depth
    }

    /// Filtered copy containing the root plus every node whose bounding box
    /// intersects the viewport. Children of dropped nodes are hoisted to
    /// their nearest retained ancestor, so the result stays a single tree.
    pub fn view_tree(&self) -> NodeTree {
        let mut filtered = NodeTree::new(self.generation, self.viewport);

        let retained: std::collections::HashSet<&NodeId> = self
            .order
            .iter()
            .filter(|id| {
                Some(*id) == self.root.as_ref()
                    || self.nodes.get(*id).map(|n| n.in_view).unwrap_or(false)
            })
            .collect();

        for id in &self.order {
            if !retained.contains(id) {
                continue;
            }
            let node = &self.nodes[id];

            // Nearest retained ancestor becomes the parent
            let mut parent = node.parent.as_ref();
            while let Some(p) = parent {
                if retained.contains(p) {
                    break;
                }
                parent = self.nodes.get(p).and_then(|n| n.parent.as_ref());
            }

            filtered.insert(Node {
                parent: parent.cloned(),
                children: Vec::new(),
                ..node.clone()
            });
        }

        // Rebuild child lists from the rewritten parent handles
        let links: Vec<(NodeId, NodeId)> = filtered
            .iter()
            .filter_map(|n| n.parent.clone().map(|p| (p, n.id.clone())))
            .collect();
        for (parent, child) in links {
            if let Some(parent_node) = filtered.nodes.get_mut(&parent) {
                parent_node.children.push(child);
            }
        }

        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, parent: Option<&str>, in_view: bool) -> Node {
        Node {
            id: id.to_string(),
            role: NodeRole::Container,
            tag: "div".to_string(),
            name: None,
            value: None,
            bounds: BoundingBox {
                x: 0.0,
                y: if in_view { 0.0 } else { 5000.0 },
                width: 100.0,
                height: 50.0,
            },
            in_view,
            parent: parent.map(|p| p.to_string()),
            children: Vec::new(),
        }
    }

    fn sample_tree() -> NodeTree {
        let viewport = BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 1280.0,
            height: 720.0,
        };
        let mut tree = NodeTree::new(1, viewport);
        tree.insert(node("root", None, true));
        tree.insert(node("offscreen", Some("root"), false));
        tree.insert(node("nested", Some("offscreen"), true));
        tree.insert(node("visible", Some("root"), true));
        tree
    }

    #[test]
    fn test_role_classification() {
        assert_eq!(NodeRole::classify(None, "button", None), NodeRole::Button);
        assert_eq!(
            NodeRole::classify(None, "input", Some("checkbox")),
            NodeRole::Checkbox
        );
        assert_eq!(NodeRole::classify(None, "canvas", None), NodeRole::Canvas);
        assert_eq!(
            NodeRole::classify(Some("button"), "div", None),
            NodeRole::Button
        );
        assert_eq!(NodeRole::classify(None, "section", None), NodeRole::Container);
    }

    #[test]
    fn test_view_tree_is_subset() {
        let tree = sample_tree();
        let view = tree.view_tree();

        assert!(view.len() < tree.len());
        for node in view.iter() {
            assert!(tree.contains(&node.id));
        }
        assert!(!view.contains("offscreen"));
    }

    #[test]
    fn test_view_tree_hoists_orphans() {
        let tree = sample_tree();
        let view = tree.view_tree();

        // "nested" lost its off-screen parent and hangs off the root now
        let nested = view.get("nested").unwrap();
        assert_eq!(nested.parent.as_deref(), Some("root"));

        let root = view.get("root").unwrap();
        assert!(root.children.contains(&"nested".to_string()));
    }

    #[test]
    fn test_intersects() {
        let viewport = BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        };
        let inside = BoundingBox {
            x: 50.0,
            y: 50.0,
            width: 100.0,
            height: 100.0,
        };
        let outside = BoundingBox {
            x: 200.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        };

        assert!(viewport.intersects(&inside));
        assert!(!viewport.intersects(&outside));
    }

    #[test]
    fn test_depth() {
        let tree = sample_tree();
        assert_eq!(tree.depth("root"), 0);
        assert_eq!(tree.depth("offscreen"), 1);
        assert_eq!(tree.depth("nested"), 2);
    }
}
