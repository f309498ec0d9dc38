//! WebSocketSink - writes frames as text messages to a WebSocket peer

use futures::{Sink, SinkExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, instrument};

use contracts::{ContractError, MessageSink, WireFrame};

/// Sink over the write half of a WebSocket connection
pub struct WebSocketSink<S> {
    name: String,
    inner: S,
}

impl<S> WebSocketSink<S>
where
    S: Sink<Message, Error = WsError> + Unpin + Send,
{
    pub fn new(name: impl Into<String>, inner: S) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

impl<S> MessageSink for WebSocketSink<S>
where
    S: Sink<Message, Error = WsError> + Unpin + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&mut self, frame: &WireFrame) -> Result<(), ContractError> {
        self.inner
            .send(Message::text(frame.as_str().to_owned()))
            .await
            .map_err(|e| ContractError::sink_send(&self.name, e.to_string()))
    }

    #[instrument(name = "websocket_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), ContractError> {
        match self.inner.close().await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => {
                debug!("WebSocket closed");
                Ok(())
            }
            Err(e) => Err(ContractError::sink_close(&self.name, e.to_string())),
        }
    }
}
