//! Reward claims.

use super::daily::{self, Activity, DailyDelta};
use super::{EventContext, Resolution, load_known_user, load_protocol};
use crate::Result;
use crate::store::{Changeset, EntityStore};
use stakeindex_core::{EventKind, RewardsClaimed, TransactionType};

/// Credit claimed rewards to the user. Stake balances are untouched.
pub(super) fn apply_rewards_claimed<S: EntityStore + ?Sized>(
    changes: &mut Changeset<'_, S>,
    ctx: &EventContext<'_>,
    event: &RewardsClaimed,
) -> Result<Resolution> {
    let mut user = match load_known_user(changes, ctx, &event.user, EventKind::RewardsClaimed)? {
        Ok(user) => user,
        Err(reason) => return Ok(Resolution::Dropped(reason)),
    };
    let protocol = load_protocol(changes, ctx, EventKind::RewardsClaimed)?;

    user.total_rewards_claimed += &event.amount;
    user.updated_at = ctx.timestamp;
    changes.upsert(&user)?;

    // The claim event carries no rate, so the record keeps a zero rate.
    let mut tx = ctx.transaction(&event.user, TransactionType::ClaimRewards);
    tx.amount = event.amount.clone();
    tx.total_staked = event.total_staked.clone();
    tx.rewards_accrued = event.amount.clone();
    changes.upsert(&tx)?;

    if let Some(mut protocol) = protocol {
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
            activity: Activity::Claim,
            reward_rate: None,
            total_staked: &event.total_staked,
        },
    )?;

    Ok(Resolution::Applied)
}
