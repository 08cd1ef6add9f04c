//! Core types and pure functions for the staking indexer.
//!
//! This crate provides:
//! - The inbound event model ([`Event`], [`EventPayload`])
//! - The derived aggregate records ([`User`], [`StakingPosition`], ...)
//! - Arbitrary-precision token [`Amount`]s and normalized [`Address`]es
//! - Day bucketing for daily rollups
//! - Prometheus metrics helpers
//! - Shared error types

mod address;
mod amount;
pub mod day;
mod entity;
mod error;
mod event;
pub mod metrics;

pub use address::{Address, TxHash};
pub use amount::Amount;
pub use day::{SECONDS_PER_DAY, day_key, day_start};
pub use entity::{
    CURSOR_ID, DailyActivity, DailyStats, Entity, IndexerCursor, Keyspace, PROTOCOL_ID,
    PositionStatus, RewardRateUpdate, SeenEvent, SeenStatus, StakingPosition, StakingProtocol,
    Transaction, TransactionType, User,
};
pub use error::{Error, Result};
pub use event::{
    EmergencyWithdrawn, Event, EventKind, EventPayload, EventPosition, Initialized,
    RewardRateUpdated, RewardsClaimed, Staked, Transfer, Withdrawn,
};
