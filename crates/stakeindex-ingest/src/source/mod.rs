//! Event source adapters.
//!
//! Sources turn an external event log into decoded [`Event`]s and hand them,
//! in causal order, to the replay driver.
//!
//! # Available Sources
//!
//! - [`JsonlSource`] - Reads JSONL files (one JSON event per line)
//!
//! # Architecture
//!
//! All sources implement the [`EventSource`] trait, which gives the driver a
//! uniform interface regardless of where events come from.

mod jsonl;

pub use jsonl::{JsonlConfig, JsonlSource};

use crate::Result;
use stakeindex_core::Event;

/// A source of decoded protocol events.
///
/// Event sources are responsible for:
/// 1. Reading raw records from their underlying storage
/// 2. Decoding and validating them into [`Event`]s
/// 3. Delivering them in the order they appear in the log
///
/// The driver then handles ordering checks, deduplication and reduction.
pub trait EventSource {
    /// Human-readable name for this source (used in logs and metrics).
    fn name(&self) -> &'static str;

    /// Process events from this source, calling the handler for each valid event.
    ///
    /// The handler returns `Ok(true)` to continue processing, `Ok(false)` to
    /// stop gracefully, or `Err` to abort. Handler errors are never skipped:
    /// an event the indexer refused halts the source.
    fn process<F>(&mut self, handler: F) -> Result<SourceStats>
    where
        F: FnMut(Event) -> Result<bool>;
}

/// Statistics from processing an event source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Non-empty records encountered.
    pub total_events: usize,

    /// Records decoded into events.
    pub valid_events: usize,

    /// Records that failed to decode.
    pub invalid_events: usize,

    /// Files read to completion or until the handler stopped.
    pub files_processed: usize,

    /// Total bytes of input.
    pub bytes_read: usize,
}
