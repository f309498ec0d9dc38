//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data Flow
//! - Upstream feed -> `RawBatch` (untyped records per `Topic`)
//! - Normalizer -> `PositionUpdate` / `TelemetryUpdate`
//! - Snapshot Cache -> `RaceState`
//! - Broadcast Hub -> `OutboundMessage` encoded once as a `WireFrame`

mod channel_map;
mod config;
mod delivery;
mod entity_id;
mod error;
mod feed;
mod message;
mod race;
mod sink;

pub use channel_map::{ChannelMap, TelemetryField};
pub use config::*;
pub use delivery::*;
pub use entity_id::EntityId;
pub use error::*;
pub use feed::*;
pub use message::{OutboundMessage, WireFrame};
pub use race::*;
pub use sink::*;
