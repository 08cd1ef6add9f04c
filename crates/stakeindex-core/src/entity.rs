//! Derived aggregate records maintained by the indexer.
//!
//! Every record implements [`Entity`], which ties it to one [`Keyspace`] and
//! derives its storage key. Records are serialized as JSON with amounts as
//! base-10 strings, so the persisted form is stable across releases and
//! byte-identical between replays.

use crate::address::{Address, TxHash};
use crate::amount::Amount;
use crate::event::EventPosition;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Key of the singleton [`StakingProtocol`] record.
pub const PROTOCOL_ID: &str = "1";

/// Key of the singleton [`IndexerCursor`] record.
pub const CURSOR_ID: &str = "cursor";

/// One logical table per record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Keyspace {
    Users,
    Positions,
    Transactions,
    Protocol,
    RewardRateUpdates,
    DailyStats,
    DailyActivity,
    SeenEvents,
    Cursor,
}

impl Keyspace {
    pub const ALL: [Keyspace; 9] = [
        Keyspace::Users,
        Keyspace::Positions,
        Keyspace::Transactions,
        Keyspace::Protocol,
        Keyspace::RewardRateUpdates,
        Keyspace::DailyStats,
        Keyspace::DailyActivity,
        Keyspace::SeenEvents,
        Keyspace::Cursor,
    ];

    /// Stable name, used as the RocksDB column family name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Positions => "staking_positions",
            Self::Transactions => "transactions",
            Self::Protocol => "staking_protocol",
            Self::RewardRateUpdates => "reward_rate_updates",
            Self::DailyStats => "daily_stats",
            Self::DailyActivity => "daily_activity",
            Self::SeenEvents => "seen_events",
            Self::Cursor => "indexer_cursor",
        }
    }
}

/// A record stored under a key in one keyspace.
pub trait Entity: Serialize + DeserializeOwned {
    const KEYSPACE: Keyspace;

    fn key(&self) -> String;
}

/// A staker, keyed by lowercase address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Address,
    pub total_staked: Amount,
    pub total_rewards_claimed: Amount,
    pub is_active: bool,
    pub created_at: u64,
    pub updated_at: u64,
}

impl User {
    pub fn new(id: Address, timestamp: u64, is_active: bool) -> Self {
        Self {
            id,
            total_staked: Amount::zero(),
            total_rewards_claimed: Amount::zero(),
            is_active,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }
}

impl Entity for User {
    const KEYSPACE: Keyspace = Keyspace::Users;

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// Lifecycle state of a [`StakingPosition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Active,
    Withdrawn,
    EmergencyWithdrawn,
}

/// A stake lot, or the record that closes one.
///
/// Positions are immutable: a withdrawal creates a new record in a terminal
/// status instead of mutating the ACTIVE one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingPosition {
    pub id: String,
    pub user: Address,
    pub amount: Amount,
    pub stake_timestamp: u64,
    pub last_reward_timestamp: u64,
    pub status: PositionStatus,
    pub rewards_earned: Amount,
    pub withdrawn_at: Option<u64>,
    pub emergency_withdraw: bool,
    pub penalty: Amount,
    pub transaction_hash: TxHash,
    pub block_number: u64,
}

impl StakingPosition {
    /// Position ids are unique per emitting log, so two stakes by the same
    /// address in the same second never collide.
    pub fn derive_id(user: &Address, tx_hash: &TxHash, log_index: u64) -> String {
        format!("{user}-{tx_hash}-{log_index}")
    }
}

impl Entity for StakingPosition {
    const KEYSPACE: Keyspace = Keyspace::Positions;

    fn key(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Stake,
    Withdraw,
    ClaimRewards,
    EmergencyWithdraw,
}

/// Immutable audit record, one per qualifying transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TxHash,
    pub user: Address,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub amount: Amount,
    pub reward_rate: Amount,
    /// Protocol total staked reported by the event.
    pub total_staked: Amount,
    pub timestamp: u64,
    pub block_number: u64,
    pub log_index: u64,
    pub penalty: Amount,
    pub rewards_accrued: Amount,
}

impl Entity for Transaction {
    const KEYSPACE: Keyspace = Keyspace::Transactions;

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// Protocol-wide counters. Exactly one instance, keyed [`PROTOCOL_ID`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingProtocol {
    pub id: String,
    pub staking_contract: Option<Address>,
    pub staking_token: Address,
    pub total_staked: Amount,
    pub current_reward_rate: Amount,
    pub total_users: u64,
    pub total_transactions: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Entity for StakingProtocol {
    const KEYSPACE: Keyspace = Keyspace::Protocol;

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Append-only log entry for a reward rate change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRateUpdate {
    pub id: String,
    pub old_rate: Amount,
    pub new_rate: Amount,
    pub total_staked: Amount,
    pub timestamp: u64,
    pub block_number: u64,
    pub log_index: u64,
}

impl RewardRateUpdate {
    pub fn derive_id(position: EventPosition) -> String {
        format!("{}-{}", position.block_number, position.log_index)
    }
}

impl Entity for RewardRateUpdate {
    const KEYSPACE: Keyspace = Keyspace::RewardRateUpdates;

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Per-day rollup, keyed by ISO date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub id: String,
    pub date: String,
    pub day_start: u64,
    /// Protocol total staked after the day's latest event.
    pub total_staked: Amount,
    pub average_reward_rate: Amount,
    pub active_users: u64,
    pub new_stakes: u64,
    pub withdrawals: u64,
    pub rewards_claimed: Amount,
    pub volume: Amount,
    /// Running sum backing `average_reward_rate`.
    pub rate_sum: Amount,
    pub rate_samples: u64,
}

impl DailyStats {
    pub fn new(date: String, day_start: u64) -> Self {
        Self {
            id: date.clone(),
            date,
            day_start,
            total_staked: Amount::zero(),
            average_reward_rate: Amount::zero(),
            active_users: 0,
            new_stakes: 0,
            withdrawals: 0,
            rewards_claimed: Amount::zero(),
            volume: Amount::zero(),
            rate_sum: Amount::zero(),
            rate_samples: 0,
        }
    }
}

impl Entity for DailyStats {
    const KEYSPACE: Keyspace = Keyspace::DailyStats;

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Marker that `user` had a qualifying event on `date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub id: String,
    pub date: String,
    pub user: Address,
}

impl DailyActivity {
    pub fn derive_id(date: &str, user: &Address) -> String {
        format!("{date}-{user}")
    }
}

impl Entity for DailyActivity {
    const KEYSPACE: Keyspace = Keyspace::DailyActivity;

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// How a delivered event was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeenStatus {
    Applied,
    Dropped,
}

/// Record that the event at `position` has been processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeenEvent {
    pub position: EventPosition,
    pub transaction_hash: TxHash,
    pub status: SeenStatus,
}

impl Entity for SeenEvent {
    const KEYSPACE: Keyspace = Keyspace::SeenEvents;

    fn key(&self) -> String {
        self.position.sortable_key()
    }
}

/// Progress of the indexer through the event log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerCursor {
    pub last_position: Option<EventPosition>,
    pub events_applied: u64,
    pub events_dropped: u64,
}

impl Entity for IndexerCursor {
    const KEYSPACE: Keyspace = Keyspace::Cursor;

    fn key(&self) -> String {
        CURSOR_ID.to_string()
    }
}
