//! Remote RPC gateway
//!
//! Bridges an external caller to the in-browser components over a duplex
//! realtime channel using a two-stage acknowledgment protocol: a short ack
//! window proves the peer is alive, a longer response window bounds the full
//! operation, and the two are never conflated.

pub mod channel;
pub mod responder;
pub mod retry;
pub mod rpc;

pub use channel::{ChannelSubscription, InMemoryChannel, RealtimeChannel, WebSocketChannel};
pub use responder::RpcResponder;
pub use retry::{retry, RetryPolicy};
pub use rpc::{RpcGateway, RpcTimeouts};
