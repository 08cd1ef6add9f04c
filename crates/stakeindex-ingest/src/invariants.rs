//! Cross-aggregate consistency checks.
//!
//! These hold after every committed event of a well-formed log. They are run
//! by the test suite after each prefix of a replay and by the CLI on demand.

use crate::error::Result;
use crate::store::{EntityStore, EntityStoreExt};
use stakeindex_core::{
    Amount, DailyStats, PROTOCOL_ID, StakingProtocol, Transaction, TransactionType, User, day_key,
};
use std::collections::BTreeMap;
use std::fmt;

/// A broken relationship between stored aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Protocol total differs from the sum of user stakes.
    TotalStakedMismatch { protocol: Amount, users: Amount },
    /// Protocol transaction counter differs from the number of transaction records.
    TransactionCountMismatch { protocol: u64, records: u64 },
    /// A day's volume differs from the amounts of that day's transactions.
    DailyVolumeMismatch {
        date: String,
        stats: Amount,
        transactions: Amount,
    },
    /// A day's stake or withdrawal counter differs from that day's transactions.
    DailyCountMismatch {
        date: String,
        field: &'static str,
        stats: u64,
        transactions: u64,
    },
    /// A user has activity but no protocol exists.
    MissingProtocol,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TotalStakedMismatch { protocol, users } => {
                write!(f, "protocol totalStaked {protocol} != sum of user stakes {users}")
            }
            Self::TransactionCountMismatch { protocol, records } => write!(
                f,
                "protocol totalTransactions {protocol} != {records} transaction records"
            ),
            Self::DailyVolumeMismatch {
                date,
                stats,
                transactions,
            } => write!(f, "{date}: volume {stats} != transaction amounts {transactions}"),
            Self::DailyCountMismatch {
                date,
                field,
                stats,
                transactions,
            } => write!(f, "{date}: {field} {stats} != {transactions} transactions"),
            Self::MissingProtocol => f.write_str("transactions exist but protocol is missing"),
        }
    }
}

#[derive(Default)]
struct DayTally {
    volume: Amount,
    stakes: u64,
    withdrawals: u64,
}

/// Check every invariant and return all violations found.
pub fn check_invariants<S: EntityStore + ?Sized>(store: &S) -> Result<Vec<InvariantViolation>> {
    let mut violations = Vec::new();

    let users: Vec<User> = store.list()?;
    let transactions: Vec<Transaction> = store.list()?;
    let protocol: Option<StakingProtocol> = store.load(PROTOCOL_ID)?;

    match &protocol {
        Some(protocol) => {
            let users_total: Amount = users.iter().map(|u| &u.total_staked).sum();
            if users_total != protocol.total_staked {
                violations.push(InvariantViolation::TotalStakedMismatch {
                    protocol: protocol.total_staked.clone(),
                    users: users_total,
                });
            }

            let records = transactions.len() as u64;
            if records != protocol.total_transactions {
                violations.push(InvariantViolation::TransactionCountMismatch {
                    protocol: protocol.total_transactions,
                    records,
                });
            }
        }
        None if !transactions.is_empty() => violations.push(InvariantViolation::MissingProtocol),
        None => {}
    }

    let mut tallies: BTreeMap<String, DayTally> = BTreeMap::new();
    for tx in &transactions {
        let tally = tallies.entry(day_key(tx.timestamp)?).or_default();
        tally.volume += &tx.amount;
        match tx.tx_type {
            TransactionType::Stake => tally.stakes += 1,
            TransactionType::Withdraw | TransactionType::EmergencyWithdraw => {
                tally.withdrawals += 1
            }
            TransactionType::ClaimRewards => {}
        }
    }

    let stats: Vec<DailyStats> = store.list()?;
    let empty = DayTally::default();
    for day in &stats {
        let tally = tallies.get(&day.date).unwrap_or(&empty);
        if day.volume != tally.volume {
            violations.push(InvariantViolation::DailyVolumeMismatch {
                date: day.date.clone(),
                stats: day.volume.clone(),
                transactions: tally.volume.clone(),
            });
        }
        for (field, stats_count, tx_count) in [
            ("newStakes", day.new_stakes, tally.stakes),
            ("withdrawals", day.withdrawals, tally.withdrawals),
        ] {
            if stats_count != tx_count {
                violations.push(InvariantViolation::DailyCountMismatch {
                    date: day.date.clone(),
                    field,
                    stats: stats_count,
                    transactions: tx_count,
                });
            }
        }
    }

    // Days with transactions but no stats record.
    for (date, tally) in &tallies {
        if !stats.iter().any(|d| &d.date == date) {
            violations.push(InvariantViolation::DailyVolumeMismatch {
                date: date.clone(),
                stats: Amount::zero(),
                transactions: tally.volume.clone(),
            });
        }
    }

    Ok(violations)
}
