//! In-page JavaScript constants
//!
//! Scripts evaluated in the tab to capture DOM snapshots and to persist
//! newly allocated stable ids back into the document.

/// Attribute carrying a node's stable id across snapshots
pub const MARKER_ATTR: &str = "data-tabscope-id";

/// DOM snapshot capture script.
///
/// Walks the document in order and returns a JSON string matching
/// [`crate::tree::DomSnapshot`]: flat element list with parent indices,
/// previously persisted markers, bounds, and the current viewport.
pub const SNAPSHOT_SCRIPT: &str = r#"
(() => {
    const MARKER = 'data-tabscope-id';
    const elements = [];
    const indices = new Map();

    const walk = (el, parentIndex) => {
        const rect = el.getBoundingClientRect();
        const index = elements.length;
        indices.set(el, index);
        elements.push({
            index,
            parent: parentIndex,
            tag: el.tagName.toLowerCase(),
            role: el.getAttribute('role') || undefined,
            input_type: el.getAttribute('type') || undefined,
            marker: el.getAttribute(MARKER) || undefined,
            name: (el.getAttribute('aria-label') || el.innerText || '').trim().slice(0, 120) || undefined,
            value: 'value' in el && typeof el.value === 'string' ? el.value.slice(0, 120) : undefined,
            bounds: {
                x: rect.x + window.scrollX,
                y: rect.y + window.scrollY,
                width: rect.width,
                height: rect.height,
            },
        });
        for (const child of el.children) {
            walk(child, index);
        }
    };

    walk(document.body, undefined);

    return JSON.stringify({
        elements,
        viewport: {
            x: window.scrollX,
            y: window.scrollY,
            width: window.innerWidth,
            height: window.innerHeight,
        },
    });
})()
"#;

/// Build the script that writes newly allocated markers into the DOM.
///
/// The capture script and this one walk the document in the same order, so
/// element indices line up between the two.
pub fn persist_markers_script(assignments: &std::collections::HashMap<usize, String>) -> String {
    let encoded = serde_json::to_string(assignments).unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"
(() => {{
    const MARKER = '{marker}';
    const assignments = {encoded};
    const elements = [];
    const walk = (el) => {{
        elements.push(el);
        for (const child of el.children) walk(child);
    }};
    walk(document.body);
    for (const [index, id] of Object.entries(assignments)) {{
        const el = elements[Number(index)];
        if (el) el.setAttribute(MARKER, id);
    }}
    return elements.length;
}})()
"#,
        marker = MARKER_ATTR,
        encoded = encoded,
    )
}

/// Script reporting the CSS cursor style at a point
pub fn cursor_style_script(x: f64, y: f64) -> String {
    format!(
        r#"
(() => {{
    const el = document.elementFromPoint({x}, {y});
    if (!el) return 'default';
    return window.getComputedStyle(el).cursor || 'default';
}})()
"#,
        x = x,
        y = y,
    )
}
