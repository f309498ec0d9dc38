//! Hub error types

use contracts::SubscriberId;
use thiserror::Error;

/// Hub-specific errors
#[derive(Debug, Error)]
pub enum HubError {
    /// The same subscriber was registered twice
    #[error("subscriber {0} is already registered")]
    AlreadyRegistered(SubscriberId),

    /// Subscriber closed before a required delivery completed
    #[error("subscriber {id} rejected delivery: {outcome}")]
    Undelivered { id: SubscriberId, outcome: String },

    /// Encode or sink error (from contract)
    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),
}
