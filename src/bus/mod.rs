//! Message bus module
//!
//! Typed key/value pub-sub store plus a receiver-scoped dispatcher used by
//! every other component for cross-context notification.

pub mod dispatcher;
pub mod message;
pub mod store;

pub use dispatcher::{ActionRegistration, Dispatcher, Handler};
pub use message::{Action, Receiver, RuntimeMessage, RuntimeResponse};
pub use store::{BroadcastChange, BroadcastStore, BusSubscription};

#[cfg(test)]
mod tests;
