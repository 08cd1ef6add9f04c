//! Inbound protocol events.
//!
//! The event source delivers one [`Event`] per decoded contract log. Each event
//! carries its causal position `(block_number, log_index)`, the block timestamp,
//! the transaction hash, and a kind-specific [`EventPayload`].
//!
//! # Wire Format
//!
//! Events are flat JSON objects with a `kind` tag naming the contract event:
//!
//! ```json
//! {"kind":"Staked","blockNumber":120,"logIndex":3,"timestamp":1700000000,
//!  "transactionHash":"0x…","user":"0x…","amount":"1000",
//!  "currentRewardRate":"500","newTotalStaked":"1000"}
//! ```
//!
//! Amounts may be base-10 strings, `0x` hex strings or plain JSON integers.

use crate::address::{Address, TxHash};
use crate::amount::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Causal position of an event in the chain: ordered by block, then log index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPosition {
    pub block_number: u64,
    pub log_index: u64,
}

impl EventPosition {
    pub fn new(block_number: u64, log_index: u64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }

    /// Fixed-width key that sorts bytewise in causal order.
    pub fn sortable_key(&self) -> String {
        format!("{:020}-{:010}", self.block_number, self.log_index)
    }
}

impl fmt::Display for EventPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}

/// A single decoded protocol event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Block containing the log.
    pub block_number: u64,

    /// Index of the log within its block.
    pub log_index: u64,

    /// Block timestamp in Unix seconds.
    pub timestamp: u64,

    /// Hash of the transaction that emitted the log.
    pub transaction_hash: TxHash,

    /// Contract that emitted the log, when the source provides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,

    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn position(&self) -> EventPosition {
        EventPosition::new(self.block_number, self.log_index)
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// The closed set of events the indexer understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EventPayload {
    #[serde(rename = "StakingInitialized")]
    Initialized(Initialized),
    Staked(Staked),
    Withdrawn(Withdrawn),
    RewardsClaimed(RewardsClaimed),
    EmergencyWithdrawn(EmergencyWithdrawn),
    RewardRateUpdated(RewardRateUpdated),
    /// ERC-20 transfer on the staking token.
    Transfer(Transfer),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Initialized(_) => EventKind::Initialized,
            Self::Staked(_) => EventKind::Staked,
            Self::Withdrawn(_) => EventKind::Withdrawn,
            Self::RewardsClaimed(_) => EventKind::RewardsClaimed,
            Self::EmergencyWithdrawn(_) => EventKind::EmergencyWithdrawn,
            Self::RewardRateUpdated(_) => EventKind::RewardRateUpdated,
            Self::Transfer(_) => EventKind::Transfer,
        }
    }
}

/// Fieldless mirror of [`EventPayload`] for logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Initialized,
    Staked,
    Withdrawn,
    RewardsClaimed,
    EmergencyWithdrawn,
    RewardRateUpdated,
    Transfer,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Staked => "staked",
            Self::Withdrawn => "withdrawn",
            Self::RewardsClaimed => "rewards_claimed",
            Self::EmergencyWithdrawn => "emergency_withdrawn",
            Self::RewardRateUpdated => "reward_rate_updated",
            Self::Transfer => "transfer",
        }
    }

    /// Whether the event counts toward `StakingProtocol::total_transactions`.
    pub fn is_user_transaction(&self) -> bool {
        matches!(
            self,
            Self::Staked | Self::Withdrawn | Self::RewardsClaimed | Self::EmergencyWithdrawn
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Initialized {
    pub staking_token: Address,
    pub initial_reward_rate: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staked {
    pub user: Address,
    pub amount: Amount,
    pub current_reward_rate: Amount,
    pub new_total_staked: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawn {
    pub user: Address,
    pub amount: Amount,
    pub rewards_accrued: Amount,
    pub current_reward_rate: Amount,
    pub new_total_staked: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardsClaimed {
    pub user: Address,
    pub amount: Amount,
    pub total_staked: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyWithdrawn {
    pub user: Address,
    pub amount: Amount,
    pub penalty: Amount,
    pub new_total_staked: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRateUpdated {
    pub old_rate: Amount,
    pub new_rate: Amount,
    pub total_staked: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub value: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(n: u8) -> String {
        format!("0x{}", format!("{n:02x}").repeat(32))
    }

    #[test]
    fn test_parse_staked() {
        let json = format!(
            r#"{{"kind":"Staked","blockNumber":120,"logIndex":3,"timestamp":1700000000,
               "transactionHash":"{}","user":"0x{}","amount":"1000",
               "currentRewardRate":500,"newTotalStaked":"0x3e8"}}"#,
            hash(1),
            "AA".repeat(20)
        );
        let event: Event = serde_json::from_str(&json).unwrap();

        assert_eq!(event.position(), EventPosition::new(120, 3));
        assert_eq!(event.kind(), EventKind::Staked);
        assert!(event.address.is_none());
        match event.payload {
            EventPayload::Staked(staked) => {
                assert_eq!(staked.user.as_str(), format!("0x{}", "aa".repeat(20)));
                assert_eq!(staked.amount, Amount::from(1000u64));
                assert_eq!(staked.current_reward_rate, Amount::from(500u64));
                assert_eq!(staked.new_total_staked, Amount::from(1000u64));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_parse_initialized_uses_contract_event_name() {
        let json = format!(
            r#"{{"kind":"StakingInitialized","blockNumber":1,"logIndex":0,"timestamp":1,
               "transactionHash":"{}","address":"0x{}",
               "stakingToken":"0x{}","initialRewardRate":"500"}}"#,
            hash(2),
            "11".repeat(20),
            "22".repeat(20)
        );
        let event: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.kind(), EventKind::Initialized);
        assert!(event.address.is_some());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let json = format!(
            r#"{{"kind":"Paused","blockNumber":1,"logIndex":0,"timestamp":1,
               "transactionHash":"{}"}}"#,
            hash(3)
        );
        assert!(serde_json::from_str::<Event>(&json).is_err());
    }

    #[test]
    fn test_missing_field_rejected() {
        let json = format!(
            r#"{{"kind":"Withdrawn","blockNumber":1,"logIndex":0,"timestamp":1,
               "transactionHash":"{}","user":"0x{}","amount":"1"}}"#,
            hash(4),
            "33".repeat(20)
        );
        assert!(serde_json::from_str::<Event>(&json).is_err());
    }

    #[test]
    fn test_position_ordering() {
        let a = EventPosition::new(10, 5);
        let b = EventPosition::new(10, 6);
        let c = EventPosition::new(11, 0);
        assert!(a < b && b < c);
        assert!(a.sortable_key() < b.sortable_key());
        assert!(b.sortable_key() < c.sortable_key());
    }

    #[test]
    fn test_user_transaction_kinds() {
        assert!(EventKind::Staked.is_user_transaction());
        assert!(EventKind::EmergencyWithdrawn.is_user_transaction());
        assert!(!EventKind::Initialized.is_user_transaction());
        assert!(!EventKind::RewardRateUpdated.is_user_transaction());
        assert!(!EventKind::Transfer.is_user_transaction());
    }
}
