//! Staking protocol event indexer.
//!
//! This crate folds an ordered log of staking contract events into derived
//! aggregates (users, positions, transactions, protocol totals and daily
//! rollups) held in a keyed entity store.
//!
//! # Modules
//!
//! - [`store`] - Entity storage backends and atomic write sets
//! - [`reducer`] - One applier per event kind
//! - [`indexer`] - Ordering, deduplication and atomic commit of single events
//! - [`replay`] - Drives a whole log through the indexer with retries
//! - [`source`] - Event source adapters (JSONL)
//! - [`invariants`] - Cross-aggregate consistency checks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Event Source   │  (JSONL files, in log order)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  ReplayDriver   │  Retries transient failures, halts on fatal ones
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Indexer     │  Seen index + cursor ordering, single writer
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Reducers     │  Stage aggregate updates in a Changeset
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   EntityStore   │  One WriteSet per event (RocksDB or memory)
//! └─────────────────┘
//! ```
//!
//! Replaying the same log into an empty store always yields byte-identical
//! state.

pub mod config;
pub mod error;
pub mod indexer;
pub mod invariants;
pub mod reducer;
pub mod replay;
pub mod source;
pub mod store;

// Re-export commonly used types at crate root
pub use config::IndexerConfig;
pub use error::{Error, Result};
pub use indexer::{ApplyOutcome, Indexer};
pub use invariants::{InvariantViolation, check_invariants};
pub use reducer::DropReason;
pub use replay::{ReplayDriver, ReplayStats};
pub use source::{EventSource, JsonlConfig, JsonlSource, SourceStats};
pub use store::{
    Changeset, EntityStore, EntityStoreExt, MemoryStore, RocksStore, StateSnapshot, WriteSet,
};
