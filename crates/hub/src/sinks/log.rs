//! LogSink - logs a summary of each outbound message via tracing

use contracts::{ContractError, MessageSink, WireFrame};
use tracing::{info, instrument};

/// Sink that logs message summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl MessageSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_send",
        skip(self, frame),
        fields(sink = %self.name, kind = frame.kind())
    )]
    async fn send(&mut self, frame: &WireFrame) -> Result<(), ContractError> {
        info!(sink = %self.name, kind = frame.kind(), bytes = frame.len(), "Message published");
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{OutboundMessage, RaceState};

    #[tokio::test]
    async fn test_log_sink_send() {
        let mut sink = LogSink::new("tap");
        let frame = WireFrame::encode(&OutboundMessage::Init(RaceState::new())).unwrap();

        assert!(sink.send(&frame).await.is_ok());
        assert!(sink.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
