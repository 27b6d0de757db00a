//! Scraping phase: fetch one discovered listing and turn it into a Listing.
//!
//! Handler for [`ScrapeListingCommand`], plus the stale-item reclaim used by
//! the maintenance schedule. Failure handling follows the per-item budget:
//!
//! * pages that are permanently gone (404/410) become Unavailable on the
//!   first sighting and are never retried within the run;
//! * transient fetch failures and extraction mismatches bubble up as job
//!   errors while attempts remain, so the queue retries with backoff;
//! * once attempts are exhausted the item terminalizes as Failed.
//!
//! Every terminal write lands in the same transaction as the run counter
//! update, and the run flips to Completed exactly once, at the zero crossing
//! of its pending-item count.

use anyhow::{anyhow, Result};
use tracing::{debug, info, warn};

use super::commands::ScrapeListingCommand;
use super::models::{DiscoveredListing, DiscoveryStatus, ItemOutcome, Platform, ScrapeRun};
use crate::common::ScrapeRunId;
use crate::domains::listings::models::listing::Listing;
use crate::domains::platforms::{parse_listing_page, ParsedListing};
use crate::kernel::traits::FetchError;
use crate::kernel::PipelineDeps;

pub async fn scrape_listing(cmd: ScrapeListingCommand, deps: &PipelineDeps) -> Result<()> {
    let run = ScrapeRun::find_by_id(cmd.scrape_run_id, &deps.db_pool).await?;
    if !run.is_processing() {
        debug!(
            scrape_run_id = %run.id,
            status = %run.status,
            "run no longer active, discarding scrape job"
        );
        return Ok(());
    }

    let Some(item) =
        DiscoveredListing::claim_for_scraping(cmd.discovered_listing_id, &deps.db_pool).await?
    else {
        debug!(
            discovered_listing_id = %cmd.discovered_listing_id,
            "item already settled, discarding scrape job"
        );
        return Ok(());
    };

    // A newer run re-discovered this URL after our job was queued; the claim
    // belongs to that run's cycle, so hand it back untouched.
    if item.batch_id != cmd.batch_id {
        DiscoveredListing::release_claim(item.id, &deps.db_pool).await?;
        debug!(
            discovered_listing_id = %item.id,
            "item re-discovered by a newer run, discarding scrape job"
        );
        return Ok(());
    }

    let platform = Platform::find_by_id(item.platform_id, &deps.db_pool).await?;
    let adapter = platform.adapter()?;

    let html = match deps.fetcher.fetch(&item.url, &adapter.scrape_options()).await {
        Ok(page) => page.html,
        Err(FetchError::Gone { status }) => {
            info!(
                discovered_listing_id = %item.id,
                url = %item.url,
                status,
                "listing permanently unavailable"
            );
            let message = format!("http {}", status);
            return finish_item(
                deps,
                run.id,
                &item,
                ItemOutcome::Unavailable,
                Some(&message),
            )
            .await;
        }
        Err(e) => {
            return transient_failure(deps, run.id, &item, &format!("fetch failed: {}", e)).await;
        }
    };

    let parsed = match parse_listing_page(adapter, &html, &item.url) {
        Ok(parsed) => parsed,
        Err(e) => {
            // Logged apart from fetch failures: a burst of these on one
            // platform means the page structure drifted, not that the site
            // is flaky.
            warn!(
                discovered_listing_id = %item.id,
                platform = adapter.code,
                url = %item.url,
                error = %e,
                "extraction mismatch"
            );
            return transient_failure(deps, run.id, &item, &e.to_string()).await;
        }
    };

    store_scraped(deps, run.id, &item, &parsed).await
}

/// Persist the parsed listing and settle the item as Scraped, atomically
/// with the run counter update.
async fn store_scraped(
    deps: &PipelineDeps,
    run_id: ScrapeRunId,
    item: &DiscoveredListing,
    parsed: &ParsedListing,
) -> Result<()> {
    let mut tx = deps.db_pool.begin().await?;

    let settled =
        DiscoveredListing::mark_terminal(&mut tx, item.id, DiscoveryStatus::Scraped, None).await?;
    if !settled {
        tx.rollback().await?;
        debug!(discovered_listing_id = %item.id, "item settled concurrently, dropping result");
        return Ok(());
    }

    let listing = Listing::upsert_from_scrape(&mut tx, item.platform_id, &item.url, parsed).await?;
    let completed = settle_run_counters(&mut tx, run_id, ItemOutcome::Scraped).await?;
    tx.commit().await?;

    info!(
        discovered_listing_id = %item.id,
        listing_id = %listing.id,
        "listing scraped"
    );
    if completed {
        info!(scrape_run_id = %run_id, "scrape run completed");
    }
    Ok(())
}

/// Retry while budget remains, otherwise settle the item as Failed.
async fn transient_failure(
    deps: &PipelineDeps,
    run_id: ScrapeRunId,
    item: &DiscoveredListing,
    message: &str,
) -> Result<()> {
    if item.attempts < deps.config.scrape_max_attempts {
        debug!(
            discovered_listing_id = %item.id,
            attempts = item.attempts,
            error = %message,
            "scrape attempt failed, leaving for retry"
        );
        return Err(anyhow!("scrape attempt {} failed: {}", item.attempts, message));
    }

    warn!(
        discovered_listing_id = %item.id,
        attempts = item.attempts,
        error = %message,
        "scrape attempts exhausted, failing item"
    );
    finish_item(deps, run_id, item, ItemOutcome::Failed, Some(message)).await
}

/// Settle an item with a terminal status and update the run counters in one
/// transaction.
async fn finish_item(
    deps: &PipelineDeps,
    run_id: ScrapeRunId,
    item: &DiscoveredListing,
    outcome: ItemOutcome,
    error_message: Option<&str>,
) -> Result<()> {
    let status = match outcome {
        ItemOutcome::Scraped => DiscoveryStatus::Scraped,
        ItemOutcome::Failed => DiscoveryStatus::Failed,
        ItemOutcome::Unavailable => DiscoveryStatus::Unavailable,
    };

    let mut tx = deps.db_pool.begin().await?;
    let settled = DiscoveredListing::mark_terminal(&mut tx, item.id, status, error_message).await?;
    if !settled {
        tx.rollback().await?;
        return Ok(());
    }
    let completed = settle_run_counters(&mut tx, run_id, outcome).await?;
    tx.commit().await?;

    if completed {
        info!(scrape_run_id = %run_id, "scrape run completed");
    }
    Ok(())
}

/// Bump the run counters for one settled item. Returns true when this was
/// the last pending item and the run just completed. A run that already left
/// the Scraping state skips the bookkeeping.
async fn settle_run_counters(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    run_id: ScrapeRunId,
    outcome: ItemOutcome,
) -> Result<bool> {
    match ScrapeRun::record_item_outcome(tx, run_id, outcome).await? {
        Some(remaining) if remaining <= 0 => ScrapeRun::complete_if_drained(tx, run_id).await,
        _ => Ok(false),
    }
}

/// Fail items stuck in Processing past the staleness window.
///
/// An item only stays in Processing that long when its job died for good
/// (dead-lettered or cancelled), so the run would otherwise never drain.
pub async fn fail_stale_items(deps: &PipelineDeps) -> Result<u64> {
    let stale = DiscoveredListing::find_stale_processing(
        deps.config.stale_processing_minutes,
        &deps.db_pool,
    )
    .await?;

    let mut failed = 0u64;
    for item in stale {
        let mut tx = deps.db_pool.begin().await?;
        let settled = DiscoveredListing::mark_terminal(
            &mut tx,
            item.id,
            DiscoveryStatus::Failed,
            Some("scrape worker timed out"),
        )
        .await?;
        if !settled {
            tx.rollback().await?;
            continue;
        }
        let completed = settle_run_counters(&mut tx, item.scrape_run_id, ItemOutcome::Failed).await?;
        tx.commit().await?;

        warn!(
            discovered_listing_id = %item.id,
            scrape_run_id = %item.scrape_run_id,
            "failed stale processing item"
        );
        if completed {
            info!(scrape_run_id = %item.scrape_run_id, "scrape run completed");
        }
        failed += 1;
    }

    Ok(failed)
}
