//! The single-writer event indexer.
//!
//! [`Indexer::apply`] takes one event through these steps:
//!
//! 1. **Seen check** - an event whose position is already in the seen index
//!    is a redelivery and is skipped with no writes at all
//! 2. **Ordering check** - an unseen event at or behind the cursor is fatal
//! 3. **Reduction** - the reducer stages its writes in a [`Changeset`]
//! 4. **Commit** - staged writes, the seen marker and the advanced cursor are
//!    committed as one [`WriteSet`]
//!
//! Any error before step 4 completes leaves the store exactly as it was.

use crate::config::IndexerConfig;
use crate::error::{Error, Result};
use crate::reducer::{self, DropReason, Resolution};
use crate::store::{Changeset, EntityStore, EntityStoreExt, StateSnapshot, WriteSet};
use metrics::histogram;
use parking_lot::Mutex;
use stakeindex_core::metrics::{increment, increment_labeled, set_gauge};
use stakeindex_core::{
    CURSOR_ID, Entity, Event, EventKind, EventPosition, IndexerCursor, SeenEvent, SeenStatus,
};
use std::time::Instant;
use tracing::{debug, error, warn};

/// What happened to one delivered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The event's effects were committed.
    Applied {
        kind: EventKind,
        position: EventPosition,
    },
    /// The event was skipped; aggregates are unchanged.
    Dropped {
        kind: EventKind,
        position: EventPosition,
        reason: DropReason,
    },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn position(&self) -> EventPosition {
        match self {
            Self::Applied { position, .. } | Self::Dropped { position, .. } => *position,
        }
    }

    pub fn drop_reason(&self) -> Option<&DropReason> {
        match self {
            Self::Applied { .. } => None,
            Self::Dropped { reason, .. } => Some(reason),
        }
    }
}

/// Applies events to an [`EntityStore`], one at a time.
///
/// Thread-safe: `apply` may be called from several threads, but calls are
/// serialized so there is only ever one writer.
pub struct Indexer<S: EntityStore> {
    store: S,
    config: IndexerConfig,
    writer: Mutex<()>,
}

impl<S: EntityStore> Indexer<S> {
    pub fn new(store: S, config: IndexerConfig) -> Self {
        Self {
            store,
            config,
            writer: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Current progress through the log.
    pub fn cursor(&self) -> Result<IndexerCursor> {
        Ok(self.store.load(CURSOR_ID)?.unwrap_or_default())
    }

    /// Canonical dump of all indexed state.
    pub fn snapshot(&self) -> Result<StateSnapshot> {
        StateSnapshot::capture(&self.store)
    }

    /// Apply one event atomically.
    ///
    /// Returns `Ok` for both applied and dropped events. An `Err` means
    /// nothing was committed and the same event may be delivered again.
    pub fn apply(&self, event: &Event) -> Result<ApplyOutcome> {
        let _writer = self.writer.lock();
        let started = Instant::now();
        let kind = event.kind();

        increment_labeled("indexer_events_total", "kind", kind.as_str(), 1);

        let result = self.apply_locked(event, kind);

        histogram!("indexer_apply_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(ApplyOutcome::Applied { position, .. }) => {
                debug!(position = %position, kind = %kind, "event applied");
                increment_labeled("indexer_events_applied_total", "kind", kind.as_str(), 1);
                set_gauge("indexer_last_block", position.block_number as f64);
            }
            Ok(ApplyOutcome::Dropped { reason, .. }) => {
                increment_labeled("indexer_events_dropped_total", "reason", reason.as_str(), 1);
            }
            Err(e) => {
                increment("indexer_apply_errors_total", 1);
                error!(
                    position = %event.position(),
                    tx = %event.transaction_hash,
                    kind = %kind,
                    error = %e,
                    "failed to apply event"
                );
            }
        }

        result
    }

    fn apply_locked(&self, event: &Event, kind: EventKind) -> Result<ApplyOutcome> {
        let position = event.position();

        let seen_key = position.sortable_key();
        if self.store.get(SeenEvent::KEYSPACE, &seen_key)?.is_some() {
            debug!(position = %position, kind = %kind, "skipping redelivered event");
            return Ok(ApplyOutcome::Dropped {
                kind,
                position,
                reason: DropReason::DuplicateEvent,
            });
        }

        let mut cursor = self.cursor()?;
        if let Some(last) = cursor.last_position {
            if position <= last {
                return Err(Error::OutOfOrder {
                    last,
                    received: position,
                });
            }
        }

        let mut changes = Changeset::new(&self.store);
        let resolution = reducer::dispatch(&mut changes, event, &self.config)?;

        let (mut writes, status, outcome) = match resolution {
            Resolution::Applied => {
                cursor.events_applied += 1;
                (
                    changes.into_writes(),
                    SeenStatus::Applied,
                    ApplyOutcome::Applied { kind, position },
                )
            }
            Resolution::Dropped(reason) => {
                warn!(
                    position = %position,
                    tx = %event.transaction_hash,
                    kind = %kind,
                    reason = %reason,
                    "dropping event"
                );
                cursor.events_dropped += 1;
                (
                    WriteSet::default(),
                    SeenStatus::Dropped,
                    ApplyOutcome::Dropped {
                        kind,
                        position,
                        reason,
                    },
                )
            }
        };

        cursor.last_position = Some(position);
        writes.put(&SeenEvent {
            position,
            transaction_hash: event.transaction_hash.clone(),
            status,
        })?;
        writes.put(&cursor)?;

        self.store.commit(writes)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use stakeindex_core::{
        Address, Amount, EventPayload, Initialized, Keyspace, PROTOCOL_ID, RewardRateUpdated,
        StakingProtocol, TxHash,
    };

    fn addr(n: u8) -> Address {
        format!("0x{}", format!("{n:02x}").repeat(20)).parse().unwrap()
    }

    fn tx(n: u8) -> TxHash {
        format!("0x{}", format!("{n:02x}").repeat(32)).parse().unwrap()
    }

    fn at(block: u64, log: u64, payload: EventPayload) -> Event {
        Event {
            block_number: block,
            log_index: log,
            timestamp: 1_700_000_000,
            transaction_hash: tx(block as u8),
            address: None,
            payload,
        }
    }

    fn init() -> EventPayload {
        EventPayload::Initialized(Initialized {
            staking_token: addr(1),
            initial_reward_rate: Amount::from(5u64),
        })
    }

    fn rate(new: u64) -> EventPayload {
        EventPayload::RewardRateUpdated(RewardRateUpdated {
            old_rate: Amount::from(5u64),
            new_rate: Amount::from(new),
            total_staked: Amount::zero(),
        })
    }

    fn indexer() -> Indexer<MemoryStore> {
        Indexer::new(MemoryStore::new(), IndexerConfig::default())
    }

    #[test]
    fn test_cursor_advances_with_each_commit() {
        let indexer = indexer();
        assert_eq!(indexer.cursor().unwrap(), IndexerCursor::default());

        indexer.apply(&at(1, 0, init())).unwrap();
        indexer.apply(&at(1, 1, rate(6))).unwrap();

        let cursor = indexer.cursor().unwrap();
        assert_eq!(cursor.last_position, Some(EventPosition::new(1, 1)));
        assert_eq!(cursor.events_applied, 2);
        assert_eq!(cursor.events_dropped, 0);
    }

    #[test]
    fn test_redelivery_is_a_no_op() {
        let indexer = indexer();
        let first = at(1, 0, init());
        indexer.apply(&first).unwrap();
        indexer.apply(&at(2, 0, rate(6))).unwrap();
        let before = indexer.snapshot().unwrap();

        // Redelivered events are recognized even behind the cursor.
        let outcome = indexer.apply(&first).unwrap();
        assert_eq!(outcome.drop_reason(), Some(&DropReason::DuplicateEvent));
        assert_eq!(indexer.snapshot().unwrap(), before);
    }

    #[test]
    fn test_redelivered_rate_update_keeps_later_rate() {
        let indexer = indexer();
        let first = at(1, 1, rate(6));
        indexer.apply(&at(1, 0, init())).unwrap();
        indexer.apply(&first).unwrap();
        indexer.apply(&at(2, 0, rate(9))).unwrap();
        let before = indexer.snapshot().unwrap();

        let outcome = indexer.apply(&first).unwrap();
        assert_eq!(outcome.drop_reason(), Some(&DropReason::DuplicateEvent));
        assert_eq!(indexer.snapshot().unwrap(), before);

        let protocol: StakingProtocol = indexer.store().load(PROTOCOL_ID).unwrap().unwrap();
        assert_eq!(protocol.current_reward_rate, Amount::from(9u64));
        assert_eq!(before.count(Keyspace::RewardRateUpdates), 2);
    }

    #[test]
    fn test_unseen_event_behind_cursor_is_fatal() {
        let indexer = indexer();
        indexer.apply(&at(5, 0, init())).unwrap();
        let before = indexer.snapshot().unwrap();

        let err = indexer.apply(&at(4, 9, rate(6))).unwrap_err();
        match err {
            Error::OutOfOrder { last, received } => {
                assert_eq!(last, EventPosition::new(5, 0));
                assert_eq!(received, EventPosition::new(4, 9));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(indexer.snapshot().unwrap(), before);
    }

    #[test]
    fn test_dropped_event_records_marker_only() {
        let indexer = indexer();
        indexer.apply(&at(1, 0, init())).unwrap();

        let transfer = EventPayload::Transfer(stakeindex_core::Transfer {
            from: addr(2),
            to: addr(3),
            value: Amount::from(1u64),
        });
        let outcome = indexer.apply(&at(2, 0, transfer)).unwrap();
        assert_eq!(outcome.drop_reason(), Some(&DropReason::NonMintTransfer));

        let snapshot = indexer.snapshot().unwrap();
        assert_eq!(snapshot.count(Keyspace::Users), 0);
        assert_eq!(snapshot.count(Keyspace::SeenEvents), 2);

        let cursor = indexer.cursor().unwrap();
        assert_eq!(cursor.events_applied, 1);
        assert_eq!(cursor.events_dropped, 1);
        assert_eq!(cursor.last_position, Some(EventPosition::new(2, 0)));
    }

    #[test]
    fn test_failed_event_commits_nothing() {
        let indexer = indexer();
        let err = indexer.apply(&at(1, 0, rate(6))).unwrap_err();
        assert!(matches!(err, Error::ProtocolNotInitialized(_)));
        assert!(indexer.store().is_empty());

        // The same position can be delivered again once the cause is fixed.
        indexer.apply(&at(1, 0, init())).unwrap();
        assert_eq!(indexer.cursor().unwrap().events_applied, 1);
    }
}
