//! # Server
//!
//! Subscriber-facing WebSocket listener.
//!
//! Every accepted connection becomes a subscriber: it is registered with the
//! hub, receives one `init` snapshot, then receives live batches until either
//! side closes the connection.

mod error;
mod listener;
mod session;

pub use error::ServerError;
pub use listener::RelayServer;
