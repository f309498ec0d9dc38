//! FeedSource trait - the upstream collaborator boundary
//!
//! A feed source connects to (or simulates) the upstream service and pushes
//! every batch it receives through a `FeedSender`.

use crate::error::Result;
use crate::queue::FeedSender;

/// Upstream feed source
///
/// `run` returns `Ok(())` when the feed ends cleanly and an error when the
/// connection fails. A supervisor decides whether to run it again.
#[trait_variant::make(FeedSource: Send)]
pub trait LocalFeedSource {
    /// Source name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver batches until the feed ends or fails
    async fn run(&mut self, feed: &FeedSender) -> Result<()>;
}
