//! Shared fixtures for integration tests.

#![allow(dead_code)]

use stakeindex_core::{
    Address, Amount, EmergencyWithdrawn, Event, EventPayload, Initialized, RewardRateUpdated,
    RewardsClaimed, Staked, Transfer, TxHash, Withdrawn,
};

/// 2023-11-14T22:13:20Z
pub const T0: u64 = 1_700_000_000;

pub fn addr(n: u8) -> Address {
    format!("0x{}", format!("{n:02x}").repeat(20)).parse().unwrap()
}

pub fn tx(n: u64) -> TxHash {
    format!("0x{n:064x}").parse().unwrap()
}

pub fn amt(n: u64) -> Amount {
    Amount::from(n)
}

/// Builds a well-formed event log with strictly increasing positions and a
/// fresh transaction hash per event.
pub struct LogBuilder {
    events: Vec<Event>,
    block: u64,
    log_index: u64,
    timestamp: u64,
    next_tx: u64,
}

impl Default for LogBuilder {
    fn default() -> Self {
        Self::new(T0)
    }
}

impl LogBuilder {
    pub fn new(timestamp: u64) -> Self {
        Self {
            events: Vec::new(),
            block: 100,
            log_index: 0,
            timestamp,
            next_tx: 1,
        }
    }

    /// Move to the next block, `seconds` later.
    pub fn next_block(&mut self, seconds: u64) -> &mut Self {
        self.block += 1;
        self.log_index = 0;
        self.timestamp += seconds;
        self
    }

    pub fn push(&mut self, payload: EventPayload) -> &mut Self {
        let hash = tx(self.next_tx);
        self.next_tx += 1;
        self.push_with_hash(hash, payload)
    }

    pub fn push_with_hash(&mut self, hash: TxHash, payload: EventPayload) -> &mut Self {
        self.events.push(Event {
            block_number: self.block,
            log_index: self.log_index,
            timestamp: self.timestamp,
            transaction_hash: hash,
            address: Some(addr(0xcc)),
            payload,
        });
        self.log_index += 1;
        self
    }

    pub fn build(&self) -> Vec<Event> {
        self.events.clone()
    }
}

pub fn initialize(rate: u64) -> EventPayload {
    EventPayload::Initialized(Initialized {
        staking_token: addr(0xaa),
        initial_reward_rate: amt(rate),
    })
}

pub fn stake(user: u8, amount: u64, new_total: u64) -> EventPayload {
    EventPayload::Staked(Staked {
        user: addr(user),
        amount: amt(amount),
        current_reward_rate: amt(500),
        new_total_staked: amt(new_total),
    })
}

pub fn withdraw(user: u8, amount: u64, rewards: u64, new_total: u64) -> EventPayload {
    EventPayload::Withdrawn(Withdrawn {
        user: addr(user),
        amount: amt(amount),
        rewards_accrued: amt(rewards),
        current_reward_rate: amt(500),
        new_total_staked: amt(new_total),
    })
}

pub fn claim(user: u8, amount: u64, total: u64) -> EventPayload {
    EventPayload::RewardsClaimed(RewardsClaimed {
        user: addr(user),
        amount: amt(amount),
        total_staked: amt(total),
    })
}

pub fn emergency(user: u8, amount: u64, penalty: u64, new_total: u64) -> EventPayload {
    EventPayload::EmergencyWithdrawn(EmergencyWithdrawn {
        user: addr(user),
        amount: amt(amount),
        penalty: amt(penalty),
        new_total_staked: amt(new_total),
    })
}

pub fn rate_update(old: u64, new: u64, total: u64) -> EventPayload {
    EventPayload::RewardRateUpdated(RewardRateUpdated {
        old_rate: amt(old),
        new_rate: amt(new),
        total_staked: amt(total),
    })
}

pub fn mint(to: u8, value: u64) -> EventPayload {
    EventPayload::Transfer(Transfer {
        from: Address::zero(),
        to: addr(to),
        value: amt(value),
    })
}
