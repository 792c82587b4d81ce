//! autosync/crates/as-core/src/lib.rs
//!
//! The shared state and real-time synchronization engine for AutoSync:
//! the message ledger, the blob store port, the broadcast hub and the
//! streaming transfer path.

pub mod models;
pub mod traits;
pub mod error;
pub mod ledger;
pub mod hub;
pub mod engine;
pub mod transfer;

// Re-exporting for easier access in other crates
pub use models::*;
pub use traits::*;
pub use error::*;
pub use ledger::MessageLedger;
pub use hub::{BroadcastHub, SubscriberId, Subscription};
pub use engine::SyncEngine;
pub use transfer::{StreamHandle, TransferStreamer};
