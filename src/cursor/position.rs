//! Authoritative cursor record

use crate::bus::store::event_key;
use crate::transport::TabId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broadcast type for cursor records
pub const CURSOR_EVENT_TYPE: &str = "cursor";

/// Broadcast key of a tab's cursor record
pub fn cursor_key(tab_id: &TabId) -> String {
    event_key(CURSOR_EVENT_TYPE, tab_id)
}

/// Pointer transition the record was published for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorEventKind {
    MouseDown,
    MouseUp,
    MouseMove,
}

/// One authoritative pointer record.
///
/// Exactly one record per tab lives in the broadcast store; every mutator
/// reads the current record, re-queries the live page for the cursor style,
/// and publishes a replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
    /// CSS cursor style at the point, as reported by the page
    pub cursor_style: String,
    /// Transition this record was published for
    pub event: CursorEventKind,
    pub tab_id: TabId,
    pub timestamp: DateTime<Utc>,
}

impl CursorPosition {
    /// Whether the button is held according to this record
    pub fn is_button_down(&self) -> bool {
        matches!(self.event, CursorEventKind::MouseDown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_wire_names() {
        assert_eq!(
            serde_json::to_value(CursorEventKind::MouseDown).unwrap(),
            serde_json::json!("mousedown")
        );
        assert_eq!(
            serde_json::to_value(CursorEventKind::MouseMove).unwrap(),
            serde_json::json!("mousemove")
        );
    }

    #[test]
    fn test_button_state_follows_event() {
        let record = CursorPosition {
            x: 1.0,
            y: 2.0,
            cursor_style: "default".to_string(),
            event: CursorEventKind::MouseDown,
            tab_id: "tab-1".to_string(),
            timestamp: Utc::now(),
        };
        assert!(record.is_button_down());
    }

    #[test]
    fn test_cursor_key_format() {
        assert_eq!(cursor_key(&"tab-9".to_string()), "cursor:tab-9");
    }
}
