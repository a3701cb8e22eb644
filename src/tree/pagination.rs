//! Tree serialization under a token budget
//!
//! A tree renders to one indented line per node in depth-first order. When
//! the rendering would exceed the caller's token budget, the page stops at a
//! node boundary and carries an opaque continuation cursor.

use super::node::NodeTree;
use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

/// Rough token estimate: four characters per token
fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Continuation cursor payload
#[derive(Debug, Serialize, Deserialize)]
struct PageCursor {
    /// Tree generation the cursor belongs to
    generation: u64,
    /// Next node position in depth-first order
    next: usize,
}

/// One serialized page of a tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreePage {
    /// Rendered node lines
    pub content: String,
    /// Total nodes in the tree
    pub total_nodes: usize,
    /// Nodes rendered into this page
    pub rendered_nodes: usize,
    /// Opaque continuation cursor, present when the tree did not fit
    pub cursor: Option<String>,
}

/// Render one node line
fn render_line(tree: &NodeTree, id: &str) -> String {
    let node = match tree.get(id) {
        Some(n) => n,
        None => return String::new(),
    };

    let indent = "  ".repeat(tree.depth(id));
    let mut line = format!("{}[{}] {}", indent, node.id, node.role.as_str());
    if let Some(name) = node.name.as_deref().filter(|n| !n.is_empty()) {
        line.push_str(&format!(" \"{}\"", name));
    }
    if let Some(value) = node.value.as_deref().filter(|v| !v.is_empty()) {
        line.push_str(&format!(" value=\"{}\"", value));
    }
    if !node.in_view {
        line.push_str(" (offscreen)");
    }
    line.push('\n');
    line
}

/// Serialize a tree from `start`, stopping at the token budget
pub fn paginate(tree: &NodeTree, max_token_size: usize, start: usize) -> TreePage {
    let order = tree.order();
    let mut content = String::new();
    let mut rendered = 0;
    let mut next = None;

    for (position, id) in order.iter().enumerate().skip(start) {
        let line = render_line(tree, id);
        if estimate_tokens(&content) + estimate_tokens(&line) > max_token_size && rendered > 0 {
            next = Some(position);
            break;
        }
        content.push_str(&line);
        rendered += 1;
    }

    TreePage {
        content,
        total_nodes: order.len(),
        rendered_nodes: rendered,
        cursor: next.map(|position| {
            encode_cursor(&PageCursor {
                generation: tree.generation,
                next: position,
            })
        }),
    }
}

/// Resume a paginated serialization from a cursor
pub fn paginate_by_cursor(tree: &NodeTree, max_token_size: usize, cursor: &str) -> Result<TreePage> {
    let cursor = decode_cursor(cursor)?;

    if cursor.generation != tree.generation {
        return Err(Error::node_not_found(format!(
            "cursor references stale tree generation {} (current {})",
            cursor.generation, tree.generation
        )));
    }

    Ok(paginate(tree, max_token_size, cursor.next))
}

fn encode_cursor(cursor: &PageCursor) -> String {
    // Infallible: the cursor is a plain struct of integers
    let json = serde_json::to_vec(cursor).unwrap_or_default();
    BASE64.encode(json)
}

fn decode_cursor(encoded: &str) -> Result<PageCursor> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| Error::interaction_config_invalid(format!("malformed cursor: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::interaction_config_invalid(format!("malformed cursor: {}", e)))
}
