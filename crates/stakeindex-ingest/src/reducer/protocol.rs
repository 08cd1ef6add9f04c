//! Protocol lifecycle: initialization and reward rate changes.

use super::{EventContext, Resolution, load_protocol};
use crate::Result;
use crate::store::{Changeset, EntityStore};
use stakeindex_core::{
    Amount, EventKind, Initialized, PROTOCOL_ID, RewardRateUpdate, RewardRateUpdated,
    StakingProtocol,
};
use tracing::{debug, info};

/// Create the protocol singleton.
///
/// A second initialization only advances `updated_at`; counters and
/// configuration from the first one are kept.
pub(super) fn apply_initialized<S: EntityStore + ?Sized>(
    changes: &mut Changeset<'_, S>,
    ctx: &EventContext<'_>,
    event: &Initialized,
) -> Result<Resolution> {
    if let Some(mut protocol) = changes.load::<StakingProtocol>(PROTOCOL_ID)? {
        debug!(position = %ctx.position, "protocol already initialized");
        protocol.updated_at = ctx.timestamp;
        changes.upsert(&protocol)?;
        return Ok(Resolution::Applied);
    }

    info!(
        token = %event.staking_token,
        rate = %event.initial_reward_rate,
        position = %ctx.position,
        "staking protocol initialized"
    );

    changes.upsert(&StakingProtocol {
        id: PROTOCOL_ID.to_string(),
        staking_contract: ctx.contract.cloned(),
        staking_token: event.staking_token.clone(),
        total_staked: Amount::zero(),
        current_reward_rate: event.initial_reward_rate.clone(),
        total_users: 0,
        total_transactions: 0,
        created_at: ctx.timestamp,
        updated_at: ctx.timestamp,
    })?;

    Ok(Resolution::Applied)
}

/// Append a rate change record and move the protocol to the new rate.
pub(super) fn apply_reward_rate_updated<S: EntityStore + ?Sized>(
    changes: &mut Changeset<'_, S>,
    ctx: &EventContext<'_>,
    event: &RewardRateUpdated,
) -> Result<Resolution> {
    let protocol = load_protocol(changes, ctx, EventKind::RewardRateUpdated)?;

    changes.upsert(&RewardRateUpdate {
        id: RewardRateUpdate::derive_id(ctx.position),
        old_rate: event.old_rate.clone(),
        new_rate: event.new_rate.clone(),
        total_staked: event.total_staked.clone(),
        timestamp: ctx.timestamp,
        block_number: ctx.position.block_number,
        log_index: ctx.position.log_index,
    })?;

    if let Some(mut protocol) = protocol {
        protocol.current_reward_rate = event.new_rate.clone();
        protocol.total_staked = event.total_staked.clone();
        protocol.updated_at = ctx.timestamp;
        changes.upsert(&protocol)?;
    }

    Ok(Resolution::Applied)
}
