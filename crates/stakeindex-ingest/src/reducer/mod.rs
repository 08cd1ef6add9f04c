//! Event reducers.
//!
//! One applier per event kind reads the aggregates it needs from a
//! [`Changeset`], computes their new values and stages them back. Appliers
//! never touch the store directly; the caller commits the changeset as one
//! atomic unit, or discards it.
//!
//! # Dispatch
//!
//! ```text
//! Event ──► dispatch ──┬─► protocol::apply_initialized
//!                      ├─► staking::apply_staked
//!                      ├─► staking::apply_withdrawn
//!                      ├─► staking::apply_emergency_withdrawn
//!                      ├─► rewards::apply_rewards_claimed
//!                      ├─► protocol::apply_reward_rate_updated
//!                      └─► token::apply_transfer
//! ```
//!
//! Appliers that depend on a user record drop the event when the user is
//! unknown; user transactions whose hash was already recorded are dropped
//! before any applier runs.

mod daily;
mod protocol;
mod rewards;
mod staking;
mod token;

use crate::config::IndexerConfig;
use crate::error::{Error, Result};
use crate::store::{Changeset, EntityStore};
use stakeindex_core::{
    Address, Amount, Event, EventKind, EventPayload, EventPosition, PROTOCOL_ID, StakingProtocol,
    Transaction, TransactionType, TxHash, User,
};
use std::fmt;
use tracing::warn;

/// Why an event was skipped without changing any aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Withdraw, claim or emergency withdraw for an address that never staked.
    UnknownUser(Address),
    /// A transaction record with this hash already exists.
    DuplicateTransaction(TxHash),
    /// The event at this position was already processed.
    DuplicateEvent,
    /// Token transfer that is not a mint.
    NonMintTransfer,
}

impl DropReason {
    /// Bounded label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownUser(_) => "unknown_user",
            Self::DuplicateTransaction(_) => "duplicate_transaction",
            Self::DuplicateEvent => "duplicate_event",
            Self::NonMintTransfer => "non_mint_transfer",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownUser(user) => write!(f, "unknown user {user}"),
            Self::DuplicateTransaction(hash) => write!(f, "duplicate transaction {hash}"),
            Self::DuplicateEvent => f.write_str("event already processed"),
            Self::NonMintTransfer => f.write_str("transfer is not a mint"),
        }
    }
}

/// Result of running an applier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Dropped(DropReason),
}

/// Event-level facts shared by all appliers.
pub(crate) struct EventContext<'e> {
    pub position: EventPosition,
    pub timestamp: u64,
    pub tx_hash: &'e TxHash,
    pub contract: Option<&'e Address>,
    pub require_initialized: bool,
}

impl<'e> EventContext<'e> {
    fn new(event: &'e Event, config: &IndexerConfig) -> Self {
        Self {
            position: event.position(),
            timestamp: event.timestamp,
            tx_hash: &event.transaction_hash,
            contract: event.address.as_ref(),
            require_initialized: config.require_initialized,
        }
    }

    /// Build the immutable audit record for a user transaction.
    fn transaction(&self, user: &Address, tx_type: TransactionType) -> Transaction {
        Transaction {
            id: self.tx_hash.clone(),
            user: user.clone(),
            tx_type,
            amount: Amount::zero(),
            reward_rate: Amount::zero(),
            total_staked: Amount::zero(),
            timestamp: self.timestamp,
            block_number: self.position.block_number,
            log_index: self.position.log_index,
            penalty: Amount::zero(),
            rewards_accrued: Amount::zero(),
        }
    }
}

/// Route an event to its applier.
pub fn dispatch<S: EntityStore + ?Sized>(
    changes: &mut Changeset<'_, S>,
    event: &Event,
    config: &IndexerConfig,
) -> Result<Resolution> {
    let ctx = EventContext::new(event, config);

    if event.kind().is_user_transaction()
        && changes.exists::<Transaction>(event.transaction_hash.as_str())?
    {
        return Ok(Resolution::Dropped(DropReason::DuplicateTransaction(
            event.transaction_hash.clone(),
        )));
    }

    match &event.payload {
        EventPayload::Initialized(e) => protocol::apply_initialized(changes, &ctx, e),
        EventPayload::Staked(e) => staking::apply_staked(changes, &ctx, e),
        EventPayload::Withdrawn(e) => staking::apply_withdrawn(changes, &ctx, e),
        EventPayload::EmergencyWithdrawn(e) => staking::apply_emergency_withdrawn(changes, &ctx, e),
        EventPayload::RewardsClaimed(e) => rewards::apply_rewards_claimed(changes, &ctx, e),
        EventPayload::RewardRateUpdated(e) => protocol::apply_reward_rate_updated(changes, &ctx, e),
        EventPayload::Transfer(e) => token::apply_transfer(changes, &ctx, e),
    }
}

/// Load the protocol singleton, enforcing the initialization policy.
///
/// Returns `Ok(None)` only when the protocol is missing and the policy
/// tolerates it.
fn load_protocol<S: EntityStore + ?Sized>(
    changes: &Changeset<'_, S>,
    ctx: &EventContext<'_>,
    kind: EventKind,
) -> Result<Option<StakingProtocol>> {
    match changes.load::<StakingProtocol>(PROTOCOL_ID)? {
        Some(protocol) => Ok(Some(protocol)),
        None if ctx.require_initialized => Err(Error::ProtocolNotInitialized(ctx.position)),
        None => {
            warn!(
                position = %ctx.position,
                kind = %kind,
                "staking protocol not initialized; skipping protocol counters"
            );
            Ok(None)
        }
    }
}

/// Load a user that must already exist, or produce the drop reason.
fn load_known_user<S: EntityStore + ?Sized>(
    changes: &Changeset<'_, S>,
    ctx: &EventContext<'_>,
    user: &Address,
    kind: EventKind,
) -> Result<std::result::Result<User, DropReason>> {
    match changes.load::<User>(user.as_str())? {
        Some(record) => Ok(Ok(record)),
        None => {
            warn!(
                user = %user,
                position = %ctx.position,
                tx = %ctx.tx_hash,
                kind = %kind,
                "dropping event for unknown user"
            );
            Ok(Err(DropReason::UnknownUser(user.clone())))
        }
    }
}
