//! Server error types

use std::net::SocketAddr;

use thiserror::Error;

/// Listener and session errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listening socket could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// WebSocket handshake failed
    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),

    /// WebSocket handshake did not complete in time
    #[error("websocket handshake timed out")]
    HandshakeTimeout,

    /// Subscriber could not be registered
    #[error("registration failed: {0}")]
    Registration(#[from] hub::HubError),

    /// The initial snapshot did not reach the subscriber
    #[error("init snapshot not delivered: {0}")]
    InitUndelivered(&'static str),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
