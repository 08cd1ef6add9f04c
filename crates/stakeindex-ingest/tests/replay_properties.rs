//! Property tests: determinism, idempotent redelivery and invariants over
//! randomly generated but well-formed logs.

mod common;

use common::*;
use proptest::prelude::*;
use stakeindex_core::{Event, EventPayload};
use stakeindex_ingest::{
    Indexer, IndexerConfig, MemoryStore, ReplayDriver, RocksStore, StateSnapshot,
    check_invariants,
};
use std::collections::BTreeMap;
use tempfile::TempDir;

const USERS: u8 = 4;

/// One step of a generated log, resolved against a model of user balances.
#[derive(Debug, Clone)]
enum Op {
    Stake { user: u8, amount: u64 },
    Withdraw { user: u8, fraction: u8 },
    Claim { user: u8, amount: u64 },
    Emergency { user: u8 },
    Rate { new: u64 },
    Mint { user: u8 },
    NextBlock { seconds: u64 },
}

fn arb_op() -> impl Strategy<Value = Op> {
    let user = 1..=USERS;
    prop_oneof![
        4 => (user.clone(), 1u64..1_000_000).prop_map(|(user, amount)| Op::Stake { user, amount }),
        2 => (user.clone(), 0u8..=100).prop_map(|(user, fraction)| Op::Withdraw { user, fraction }),
        2 => (user.clone(), 1u64..10_000).prop_map(|(user, amount)| Op::Claim { user, amount }),
        1 => user.clone().prop_map(|user| Op::Emergency { user }),
        1 => (1u64..2_000).prop_map(|new| Op::Rate { new }),
        1 => user.prop_map(|user| Op::Mint { user }),
        2 => (1u64..40_000).prop_map(|seconds| Op::NextBlock { seconds }),
    ]
}

/// Turn ops into a log whose reported protocol totals match the sum of
/// per-user stakes, as the contract would emit them.
fn build_log(ops: &[Op]) -> Vec<Event> {
    let mut builder = LogBuilder::default();
    let mut balances: BTreeMap<u8, u64> = BTreeMap::new();
    let mut rate = 500u64;
    builder.push(initialize(rate)).next_block(12);

    for op in ops {
        let total = |b: &BTreeMap<u8, u64>| b.values().sum::<u64>();
        match *op {
            Op::Stake { user, amount } => {
                *balances.entry(user).or_default() += amount;
                let new_total = total(&balances);
                builder.push(EventPayload::Staked(stakeindex_core::Staked {
                    user: addr(user),
                    amount: amt(amount),
                    current_reward_rate: amt(rate),
                    new_total_staked: amt(new_total),
                }));
            }
            Op::Withdraw { user, fraction } => {
                // Unknown users are emitted too; the indexer drops them.
                let staked = balances.get(&user).copied().unwrap_or(0);
                let amount = staked * u64::from(fraction) / 100;
                if let Some(balance) = balances.get_mut(&user) {
                    *balance -= amount;
                }
                let new_total = total(&balances);
                builder.push(EventPayload::Withdrawn(stakeindex_core::Withdrawn {
                    user: addr(user),
                    amount: amt(amount),
                    rewards_accrued: amt(amount / 10),
                    current_reward_rate: amt(rate),
                    new_total_staked: amt(new_total),
                }));
            }
            Op::Claim { user, amount } => {
                let new_total = total(&balances);
                builder.push(claim(user, amount, new_total));
            }
            Op::Emergency { user } => {
                let staked = balances.get(&user).copied().unwrap_or(0);
                if let Some(balance) = balances.get_mut(&user) {
                    *balance = 0;
                }
                let penalty = staked / 10;
                let new_total = total(&balances);
                builder.push(emergency(user, staked - penalty, penalty, new_total));
            }
            Op::Rate { new } => {
                let new_total = total(&balances);
                builder.push(rate_update(rate, new, new_total));
                rate = new;
            }
            Op::Mint { user } => {
                builder.push(mint(user, 1_000));
            }
            Op::NextBlock { seconds } => {
                builder.next_block(seconds);
            }
        }
    }

    builder.build()
}

fn arb_log(max_ops: usize) -> impl Strategy<Value = Vec<Event>> {
    prop::collection::vec(arb_op(), 0..max_ops).prop_map(|ops| build_log(&ops))
}

fn replay_in_memory(log: &[Event]) -> StateSnapshot {
    let indexer = Indexer::new(MemoryStore::new(), IndexerConfig::default());
    ReplayDriver::new(&indexer).run(log.to_vec()).unwrap();
    indexer.snapshot().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_replay_is_deterministic(log in arb_log(60)) {
        let first = replay_in_memory(&log);
        let second = replay_in_memory(&log);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_invariants_hold_after_every_event(log in arb_log(40)) {
        let indexer = Indexer::new(MemoryStore::new(), IndexerConfig::default());
        for event in &log {
            indexer.apply(event).unwrap();
            let violations = check_invariants(indexer.store()).unwrap();
            prop_assert!(violations.is_empty(), "after {}: {:?}", event.position(), violations);
        }
    }

    #[test]
    fn prop_redelivery_changes_nothing(log in arb_log(40), split in any::<prop::sample::Index>()) {
        let indexer = Indexer::new(MemoryStore::new(), IndexerConfig::default());
        let driver = ReplayDriver::new(&indexer);
        let cut = split.index(log.len() + 1);

        // Crash after a prefix, then restart from the top of the log.
        driver.run(log[..cut].to_vec()).unwrap();
        driver.run(log.clone()).unwrap();

        prop_assert_eq!(indexer.snapshot().unwrap(), replay_in_memory(&log));
    }

    #[test]
    fn prop_transaction_counter_equals_records(log in arb_log(60)) {
        let indexer = Indexer::new(MemoryStore::new(), IndexerConfig::default());
        ReplayDriver::new(&indexer).run(log).unwrap();
        let snapshot = indexer.snapshot().unwrap();

        let protocol: stakeindex_core::StakingProtocol = {
            use stakeindex_ingest::EntityStoreExt;
            indexer.store().load(stakeindex_core::PROTOCOL_ID).unwrap().unwrap()
        };
        prop_assert_eq!(
            protocol.total_transactions as usize,
            snapshot.count(stakeindex_core::Keyspace::Transactions)
        );
    }
}

#[test]
fn test_rocksdb_and_memory_replays_match() {
    let ops = vec![
        Op::Stake { user: 1, amount: 5_000 },
        Op::Mint { user: 2 },
        Op::Stake { user: 2, amount: 700 },
        Op::NextBlock { seconds: 90_000 },
        Op::Withdraw { user: 1, fraction: 40 },
        Op::Claim { user: 2, amount: 12 },
        Op::Rate { new: 900 },
        Op::Emergency { user: 2 },
        Op::Withdraw { user: 3, fraction: 10 },
    ];
    let log = build_log(&ops);

    let tmp = TempDir::new().unwrap();
    let rocks = Indexer::new(RocksStore::open(tmp.path()).unwrap(), IndexerConfig::default());
    ReplayDriver::new(&rocks).run(log.clone()).unwrap();

    assert_eq!(rocks.snapshot().unwrap(), replay_in_memory(&log));
    assert!(check_invariants(rocks.store()).unwrap().is_empty());
}

#[test]
fn test_rocksdb_resume_after_reopen() {
    let log = build_log(&[
        Op::Stake { user: 1, amount: 100 },
        Op::NextBlock { seconds: 12 },
        Op::Stake { user: 2, amount: 200 },
        Op::Withdraw { user: 1, fraction: 50 },
    ]);
    let tmp = TempDir::new().unwrap();

    {
        let indexer = Indexer::new(RocksStore::open(tmp.path()).unwrap(), IndexerConfig::default());
        ReplayDriver::new(&indexer).run(log[..2].to_vec()).unwrap();
    }

    let indexer = Indexer::new(RocksStore::open(tmp.path()).unwrap(), IndexerConfig::default());
    let stats = ReplayDriver::new(&indexer).run(log.clone()).unwrap();
    assert_eq!(stats.events_dropped, 2);
    assert_eq!(indexer.snapshot().unwrap(), replay_in_memory(&log));
}
