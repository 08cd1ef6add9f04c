//! Daily rollup accumulation.

use super::EventContext;
use crate::Result;
use crate::store::{Changeset, EntityStore};
use stakeindex_core::{Address, Amount, DailyActivity, DailyStats, day_key, day_start};

/// Which daily counter an event feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Activity {
    Stake,
    Withdrawal,
    Claim,
}

/// Contribution of one qualifying event to its day bucket.
pub(super) struct DailyDelta<'a> {
    pub user: &'a Address,
    pub amount: &'a Amount,
    pub activity: Activity,
    /// Rate carried by the event, folded into the day's average.
    pub reward_rate: Option<&'a Amount>,
    /// Protocol total reported by the event.
    pub total_staked: &'a Amount,
}

/// Fold `delta` into the `DailyStats` record for the event's day.
pub(super) fn accumulate<S: EntityStore + ?Sized>(
    changes: &mut Changeset<'_, S>,
    ctx: &EventContext<'_>,
    delta: DailyDelta<'_>,
) -> Result<()> {
    let date = day_key(ctx.timestamp)?;
    let mut stats = match changes.load::<DailyStats>(&date)? {
        Some(stats) => stats,
        None => DailyStats::new(date.clone(), day_start(ctx.timestamp)),
    };

    stats.volume += delta.amount;
    match delta.activity {
        Activity::Stake => stats.new_stakes += 1,
        Activity::Withdrawal => stats.withdrawals += 1,
        Activity::Claim => stats.rewards_claimed += delta.amount,
    }
    stats.total_staked = delta.total_staked.clone();

    if let Some(rate) = delta.reward_rate {
        stats.rate_sum += rate;
        stats.rate_samples += 1;
        stats.average_reward_rate = stats
            .rate_sum
            .checked_div_u64(stats.rate_samples)
            .unwrap_or_default();
    }

    let activity_id = DailyActivity::derive_id(&date, delta.user);
    if !changes.exists::<DailyActivity>(&activity_id)? {
        changes.upsert(&DailyActivity {
            id: activity_id,
            date: date.clone(),
            user: delta.user.clone(),
        })?;
        stats.active_users += 1;
    }

    changes.upsert(&stats)
}
