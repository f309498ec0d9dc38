//! # Race State
//!
//! Snapshot cache of the latest known sample per entity per category.
//!
//! The ingestion pipeline writes one whole batch at a time; connection
//! sessions read a consistent copy when a subscriber joins.

mod cache;

pub use cache::RaceStateCache;
