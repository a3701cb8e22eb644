//! Cursor coordinator
//!
//! Maintains one authoritative pointer-position/button-state record per tab,
//! turning logical mouse operations into debugger input commands plus
//! broadcasts that any observer can render.

pub mod coordinator;
pub mod position;

pub use coordinator::CursorCoordinator;
pub use position::{cursor_key, CursorEventKind, CursorPosition, CURSOR_EVENT_TYPE};

#[cfg(test)]
mod tests;
