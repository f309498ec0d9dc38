//! Sink implementations
//!
//! Contains WebSocketSink and LogSink.

mod log;
mod websocket;

pub use self::log::LogSink;
pub use self::websocket::WebSocketSink;
