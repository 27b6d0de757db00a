//! Human review workflow over candidate duplicate groups.
//!
//! Operators work the PendingReview queue in descending score order:
//! approve a group for AI merge, reject it with a reason, or repair it by
//! detaching a wrongly matched member. Every mutation here keeps the
//! two-member floor: a group that would shrink below two members is
//! dissolved instead.

use anyhow::{anyhow, bail, Result};
use sqlx::PgPool;
use tracing::info;

use crate::common::{ListingGroupId, ListingId};
use crate::domains::dedup::engine::pick_primary;
use crate::domains::dedup::models::ListingGroup;
use crate::domains::listings::models::Listing;

/// Result of removing one member from a group.
#[derive(Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The listing left the group; when it was the primary, a replacement
    /// was promoted.
    Removed { new_primary: Option<ListingId> },
    /// The group fell below two members and was deleted; every remaining
    /// member was returned to the pool.
    Dissolved,
}

/// The next group to look at, with its members. Skips the group the
/// operator just resolved.
pub async fn next_group_for_review(
    exclude: Option<ListingGroupId>,
    pool: &PgPool,
) -> Result<Option<(ListingGroup, Vec<Listing>)>> {
    let Some(group) = ListingGroup::next_for_review(exclude, pool).await? else {
        return Ok(None);
    };
    let members = Listing::find_by_group(group.id, pool).await?;
    Ok(Some((group, members)))
}

/// Queue a reviewed group for AI merge. Returns the updated group, or None
/// when it was not awaiting review.
pub async fn approve_group(group_id: ListingGroupId, pool: &PgPool) -> Result<Option<ListingGroup>> {
    let group = ListingGroup::approve(group_id, pool).await?;
    if let Some(group) = &group {
        info!(group_id = %group.id, "listing group approved");
    }
    Ok(group)
}

/// Reject a group and return every member to the pool as an independent
/// listing. Returns false when the group was not in a rejectable status.
pub async fn reject_group(group_id: ListingGroupId, reason: &str, pool: &PgPool) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let Some(group) = ListingGroup::reject(&mut tx, group_id, reason).await? else {
        tx.rollback().await?;
        return Ok(false);
    };
    let released = Listing::ungroup_all_for_group(&mut tx, group_id).await?;
    tx.commit().await?;

    info!(group_id = %group.id, released, reason, "listing group rejected");
    Ok(true)
}

/// Put a group that failed or stalled in AI merge back in the queue.
pub async fn retry_ai(group_id: ListingGroupId, pool: &PgPool) -> Result<Option<ListingGroup>> {
    let group = ListingGroup::retry_ai(group_id, pool).await?;
    if let Some(group) = &group {
        info!(group_id = %group.id, "listing group requeued for ai merge");
    }
    Ok(group)
}

/// Detach one listing from a group, dissolving the group when fewer than
/// two members would remain.
pub async fn remove_listing(
    group_id: ListingGroupId,
    listing_id: ListingId,
    pool: &PgPool,
) -> Result<RemoveOutcome> {
    let mut tx = pool.begin().await?;

    let group = ListingGroup::find_for_update(&mut tx, group_id)
        .await?
        .ok_or_else(|| anyhow!("listing group {} not found", group_id))?;
    if !group.is_editable() {
        bail!(
            "listing group {} cannot be edited in status {}",
            group_id,
            group.status
        );
    }

    let members = Listing::find_by_group_for_update(&mut tx, group_id).await?;
    let target = members
        .iter()
        .find(|l| l.id == listing_id)
        .ok_or_else(|| anyhow!("listing {} is not a member of group {}", listing_id, group_id))?;
    let was_primary = target.is_primary;

    Listing::ungroup_one(&mut tx, listing_id, group_id).await?;

    let remaining: Vec<&Listing> = members.iter().filter(|l| l.id != listing_id).collect();
    if remaining.len() < 2 {
        let released = Listing::ungroup_all_for_group(&mut tx, group_id).await?;
        ListingGroup::delete(&mut tx, group_id).await?;
        tx.commit().await?;
        info!(
            group_id = %group_id,
            listing_id = %listing_id,
            released,
            "listing group dissolved after member removal"
        );
        return Ok(RemoveOutcome::Dissolved);
    }

    let mut new_primary = None;
    if was_primary {
        if let Some(choice) = pick_primary(&remaining) {
            Listing::set_primary(&mut tx, choice.id, true).await?;
            new_primary = Some(choice.id);
        }
    }
    tx.commit().await?;

    info!(
        group_id = %group_id,
        listing_id = %listing_id,
        new_primary = new_primary.map(|id| id.to_string()),
        "listing removed from group"
    );
    Ok(RemoveOutcome::Removed { new_primary })
}
