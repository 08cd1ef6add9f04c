//! Stake, withdraw and emergency withdraw.
//!
//! Every call creates a new immutable [`StakingPosition`]. Withdrawals do not
//! close the ACTIVE record they spend from; they add a record in a terminal
//! status.

use super::daily::{self, Activity, DailyDelta};
use super::{EventContext, Resolution, load_known_user, load_protocol};
use crate::Result;
use crate::store::{Changeset, EntityStore};
use stakeindex_core::{
    Amount, EmergencyWithdrawn, EventKind, PositionStatus, Staked, StakingPosition,
    TransactionType, User, Withdrawn,
};
use tracing::warn;

pub(super) fn apply_staked<S: EntityStore + ?Sized>(
    changes: &mut Changeset<'_, S>,
    ctx: &EventContext<'_>,
    event: &Staked,
) -> Result<Resolution> {
    let protocol = load_protocol(changes, ctx, EventKind::Staked)?;

    let (mut user, is_new) = match changes.load::<User>(event.user.as_str())? {
        Some(user) => (user, false),
        None => (User::new(event.user.clone(), ctx.timestamp, true), true),
    };
    user.total_staked += &event.amount;
    user.is_active = true;
    user.updated_at = ctx.timestamp;
    changes.upsert(&user)?;

    changes.upsert(&StakingPosition {
        id: StakingPosition::derive_id(&event.user, ctx.tx_hash, ctx.position.log_index),
        user: event.user.clone(),
        amount: event.amount.clone(),
        stake_timestamp: ctx.timestamp,
        last_reward_timestamp: ctx.timestamp,
        status: PositionStatus::Active,
        rewards_earned: Amount::zero(),
        withdrawn_at: None,
        emergency_withdraw: false,
        penalty: Amount::zero(),
        transaction_hash: ctx.tx_hash.clone(),
        block_number: ctx.position.block_number,
    })?;

    let mut tx = ctx.transaction(&event.user, TransactionType::Stake);
    tx.amount = event.amount.clone();
    tx.reward_rate = event.current_reward_rate.clone();
    tx.total_staked = event.new_total_staked.clone();
    changes.upsert(&tx)?;

    if let Some(mut protocol) = protocol {
        if is_new {
            protocol.total_users += 1;
        }
        protocol.total_staked = event.new_total_staked.clone();
        protocol.current_reward_rate = event.current_reward_rate.clone();
        protocol.total_transactions += 1;
        protocol.updated_at = ctx.timestamp;
        changes.upsert(&protocol)?;
    }

    daily::accumulate(
        changes,
        ctx,
        DailyDelta {
            user: &event.user,
            amount: &event.amount,
            activity: Activity::Stake,
            reward_rate: Some(&event.current_reward_rate),
            total_staked: &event.new_total_staked,
        },
    )?;

    Ok(Resolution::Applied)
}

pub(super) fn apply_withdrawn<S: EntityStore + ?Sized>(
    changes: &mut Changeset<'_, S>,
    ctx: &EventContext<'_>,
    event: &Withdrawn,
) -> Result<Resolution> {
    let mut user = match load_known_user(changes, ctx, &event.user, EventKind::Withdrawn)? {
        Ok(user) => user,
        Err(reason) => return Ok(Resolution::Dropped(reason)),
    };
    let protocol = load_protocol(changes, ctx, EventKind::Withdrawn)?;

    user.total_staked = match user.total_staked.checked_sub(&event.amount) {
        Some(remaining) => remaining,
        None => {
            warn!(
                user = %event.user,
                staked = %user.total_staked,
                amount = %event.amount,
                position = %ctx.position,
                "withdrawal exceeds indexed stake; clamping to zero"
            );
            Amount::zero()
        }
    };
    user.updated_at = ctx.timestamp;
    changes.upsert(&user)?;

    changes.upsert(&StakingPosition {
        id: StakingPosition::derive_id(&event.user, ctx.tx_hash, ctx.position.log_index),
        user: event.user.clone(),
        amount: event.amount.clone(),
        stake_timestamp: ctx.timestamp,
        last_reward_timestamp: ctx.timestamp,
        status: PositionStatus::Withdrawn,
        rewards_earned: event.rewards_accrued.clone(),
        withdrawn_at: Some(ctx.timestamp),
        emergency_withdraw: false,
        penalty: Amount::zero(),
        transaction_hash: ctx.tx_hash.clone(),
        block_number: ctx.position.block_number,
    })?;

    let mut tx = ctx.transaction(&event.user, TransactionType::Withdraw);
    tx.amount = event.amount.clone();
    tx.reward_rate = event.current_reward_rate.clone();
    tx.total_staked = event.new_total_staked.clone();
    tx.rewards_accrued = event.rewards_accrued.clone();
    changes.upsert(&tx)?;

    if let Some(mut protocol) = protocol {
        protocol.total_staked = event.new_total_staked.clone();
        protocol.current_reward_rate = event.current_reward_rate.clone();
        protocol.total_transactions += 1;
        protocol.updated_at = ctx.timestamp;
        changes.upsert(&protocol)?;
    }

    daily::accumulate(
        changes,
        ctx,
        DailyDelta {
            user: &event.user,
            amount: &event.amount,
            activity: Activity::Withdrawal,
            reward_rate: Some(&event.current_reward_rate),
            total_staked: &event.new_total_staked,
        },
    )?;

    Ok(Resolution::Applied)
}

/// Forfeits the user's entire stake; `amount` is what left the contract
/// after the penalty.
pub(super) fn apply_emergency_withdrawn<S: EntityStore + ?Sized>(
    changes: &mut Changeset<'_, S>,
    ctx: &EventContext<'_>,
    event: &EmergencyWithdrawn,
) -> Result<Resolution> {
    let mut user = match load_known_user(changes, ctx, &event.user, EventKind::EmergencyWithdrawn)?
    {
        Ok(user) => user,
        Err(reason) => return Ok(Resolution::Dropped(reason)),
    };
    let protocol = load_protocol(changes, ctx, EventKind::EmergencyWithdrawn)?;

    user.total_staked = Amount::zero();
    user.updated_at = ctx.timestamp;
    changes.upsert(&user)?;

    changes.upsert(&StakingPosition {
        id: StakingPosition::derive_id(&event.user, ctx.tx_hash, ctx.position.log_index),
        user: event.user.clone(),
        amount: event.amount.clone(),
        stake_timestamp: ctx.timestamp,
        last_reward_timestamp: ctx.timestamp,
        status: PositionStatus::EmergencyWithdrawn,
        rewards_earned: Amount::zero(),
        withdrawn_at: Some(ctx.timestamp),
        emergency_withdraw: true,
        penalty: event.penalty.clone(),
        transaction_hash: ctx.tx_hash.clone(),
        block_number: ctx.position.block_number,
    })?;

    let mut tx = ctx.transaction(&event.user, TransactionType::EmergencyWithdraw);
    tx.amount = event.amount.clone();
    tx.total_staked = event.new_total_staked.clone();
    tx.penalty = event.penalty.clone();
    changes.upsert(&tx)?;

    if let Some(mut protocol) = protocol {
        protocol.total_staked = event.new_total_staked.clone();
        protocol.total_transactions += 1;
        protocol.updated_at = ctx.timestamp;
        changes.upsert(&protocol)?;
    }

    daily::accumulate(
        changes,
        ctx,
        DailyDelta {
            user: &event.user,
            amount: &event.amount,
            activity: Activity::Withdrawal,
            reward_rate: None,
            total_staked: &event.new_total_staked,
        },
    )?;

    Ok(Resolution::Applied)
}
