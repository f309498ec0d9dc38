//! Layered error definitions
//!
//! Categorized by source: config / encode / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Wire Errors =====
    /// Message encoding error
    #[error("failed to encode '{kind}' message: {message}")]
    Encode { kind: String, message: String },

    // ===== Sink Errors =====
    /// Sink send error
    #[error("sink '{sink_name}' send error: {message}")]
    SinkSend { sink_name: String, message: String },

    /// Sink close error
    #[error("sink '{sink_name}' close error: {message}")]
    SinkClose { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create encode error
    pub fn encode(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encode {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create sink send error
    pub fn sink_send(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkSend {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink close error
    pub fn sink_close(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkClose {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
