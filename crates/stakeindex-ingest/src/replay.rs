//! Replay driver: feeds an ordered event log through the [`Indexer`].
//!
//! The driver owns the failure policy:
//!
//! - Retryable errors (storage, I/O) are retried with doubling backoff up to
//!   [`IndexerConfig::max_retries`](crate::IndexerConfig) times
//! - Any other error halts the replay at the failing event
//! - Drops are counted and the replay continues
//!
//! Because every event is committed atomically together with the cursor, a
//! halted replay can be restarted from the beginning of the log: events that
//! were already committed are recognized and skipped.

use crate::error::Result;
use crate::indexer::{ApplyOutcome, Indexer};
use crate::source::{EventSource, SourceStats};
use crate::store::EntityStore;
use stakeindex_core::metrics::{increment, set_gauge};
use stakeindex_core::{Event, EventPosition};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{info, warn};

/// Counters for one replay run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Events handed to the indexer.
    pub events_seen: u64,
    pub events_applied: u64,
    pub events_dropped: u64,
    /// Drop counts keyed by reason label.
    pub drop_reasons: BTreeMap<&'static str, u64>,
    /// Retry attempts across all events.
    pub retries: u64,
    /// Position of the last event resolved in this run.
    pub last_position: Option<EventPosition>,
    /// Whether the run ended early on a shutdown request.
    pub interrupted: bool,
}

impl ReplayStats {
    fn record(&mut self, outcome: &ApplyOutcome) {
        self.events_seen += 1;
        self.last_position = Some(outcome.position());
        if outcome.is_applied() {
            self.events_applied += 1;
        } else if let Some(reason) = outcome.drop_reason() {
            self.events_dropped += 1;
            *self.drop_reasons.entry(reason.as_str()).or_default() += 1;
        }
    }
}

/// Drives events through an [`Indexer`] in log order.
pub struct ReplayDriver<'a, S: EntityStore> {
    indexer: &'a Indexer<S>,
    running: Option<Arc<AtomicBool>>,
}

impl<'a, S: EntityStore> ReplayDriver<'a, S> {
    pub fn new(indexer: &'a Indexer<S>) -> Self {
        Self {
            indexer,
            running: None,
        }
    }

    /// Stop between events once `running` is cleared.
    pub fn with_shutdown_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    fn should_stop(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.load(Ordering::SeqCst))
    }

    /// Apply one event, retrying transient failures.
    pub fn apply_with_retry(&self, event: &Event, stats: &mut ReplayStats) -> Result<ApplyOutcome> {
        let config = self.indexer.config();
        let mut attempt = 0u32;

        loop {
            match self.indexer.apply(event) {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && attempt < config.max_retries => {
                    let delay = config.retry_backoff.saturating_mul(1u32 << attempt.min(16));
                    attempt += 1;
                    stats.retries += 1;
                    increment("indexer_apply_retries_total", 1);
                    warn!(
                        position = %event.position(),
                        attempt,
                        max = config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying event"
                    );
                    thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Replay every event of `events`, in the order given.
    pub fn run<I>(&self, events: I) -> Result<ReplayStats>
    where
        I: IntoIterator<Item = Event>,
    {
        let mut stats = ReplayStats::default();
        set_gauge("indexer_running", 1.0);
        let result = self.drive(events, &mut stats);
        set_gauge("indexer_running", 0.0);

        result?;
        self.log_summary(&stats);
        Ok(stats)
    }

    fn drive<I>(&self, events: I, stats: &mut ReplayStats) -> Result<()>
    where
        I: IntoIterator<Item = Event>,
    {
        for event in events {
            if self.should_stop() {
                stats.interrupted = true;
                break;
            }
            let outcome = self.apply_with_retry(&event, stats)?;
            stats.record(&outcome);
        }
        Ok(())
    }

    /// Replay everything `source` delivers.
    pub fn run_source<Src: EventSource>(&self, source: &mut Src) -> Result<(ReplayStats, SourceStats)> {
        let mut stats = ReplayStats::default();
        set_gauge("indexer_running", 1.0);
        info!(source = source.name(), "starting replay");

        let result = source.process(|event| {
            if self.should_stop() {
                stats.interrupted = true;
                return Ok(false);
            }
            let outcome = self.apply_with_retry(&event, &mut stats)?;
            stats.record(&outcome);
            Ok(true)
        });

        set_gauge("indexer_running", 0.0);
        let source_stats = result?;
        self.log_summary(&stats);
        Ok((stats, source_stats))
    }

    fn log_summary(&self, stats: &ReplayStats) {
        info!(
            seen = stats.events_seen,
            applied = stats.events_applied,
            dropped = stats.events_dropped,
            retries = stats.retries,
            interrupted = stats.interrupted,
            last = ?stats.last_position.map(|p| p.to_string()),
            "replay finished"
        );
    }
}
