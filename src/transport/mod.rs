//! Debug transport layer
//!
//! Owns the debugger handle per tab and multiplexes one physical debugger
//! connection into logical per-tab sessions, fanning protocol events out to
//! every live session.

pub mod host;
pub mod manager;
pub mod mock;
pub mod session;
pub mod traits;

pub use manager::TransportManager;
pub use mock::MockDebuggerHost;
pub use session::{SessionMessage, Transport};
pub use traits::{DebuggerHost, HostEvent, Tab, TabId, TabStatus};
