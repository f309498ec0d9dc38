//! MessageSink trait - one subscriber's delivery endpoint
//!
//! Defines the abstract interface the hub writes encoded frames to.

use crate::{ContractError, WireFrame};

/// Delivery endpoint trait
///
/// All subscriber connection types implement this trait.
#[trait_variant::make(MessageSink: Send)]
pub trait LocalMessageSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Send one encoded message
    ///
    /// # Errors
    /// Returns a send error when the connection is broken
    async fn send(&mut self, frame: &WireFrame) -> Result<(), ContractError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), ContractError>;
}
