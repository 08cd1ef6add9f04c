//! Staking token transfers.

use super::{DropReason, EventContext, Resolution};
use crate::Result;
use crate::store::{Changeset, EntityStore};
use stakeindex_core::{Transfer, User};
use tracing::debug;

/// Register the recipient of a mint as a known, inactive user.
///
/// Mints do not count toward `total_users`; only staking does. A later
/// stake flips the user to active.
pub(super) fn apply_transfer<S: EntityStore + ?Sized>(
    changes: &mut Changeset<'_, S>,
    ctx: &EventContext<'_>,
    event: &Transfer,
) -> Result<Resolution> {
    if !event.from.is_zero() {
        return Ok(Resolution::Dropped(DropReason::NonMintTransfer));
    }

    if changes.exists::<User>(event.to.as_str())? {
        return Ok(Resolution::Applied);
    }

    debug!(user = %event.to, value = %event.value, position = %ctx.position, "mint recipient registered");
    changes.upsert(&User::new(event.to.clone(), ctx.timestamp, false))?;

    Ok(Resolution::Applied)
}
