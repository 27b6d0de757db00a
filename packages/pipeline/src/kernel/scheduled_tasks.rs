//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! This module provides periodic tasks that run on schedules:
//! - Per-minute pipeline tick (due searches + batch stage dispatch)
//! - Stale Processing reclaim every five minutes
//!
//! # Architecture
//!
//! Scheduled tasks run independently of the job queue system.
//! They typically enqueue jobs rather than doing work directly.
//!
//! ```text
//! Scheduler (every minute)
//!     │
//!     ├─► start_due_runs()
//!     │       └─► For each due search → ScrapeRun + DiscoverRunCommand
//!     └─► enqueue geocode/dedup/assembly batch commands
//!             └─► idempotency keys drop the tick while a batch is active
//! ```

use anyhow::Result;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::dedup::commands::DedupBatchCommand;
use crate::domains::dedup::models::listing_group::ListingGroup;
use crate::domains::listings::commands::GeocodeBatchCommand;
use crate::domains::listings::models::listing::Listing;
use crate::domains::properties::commands::AssembleBatchCommand;
use crate::domains::scraping::{orchestrator, scraper};
use crate::kernel::PipelineDeps;

/// Start all scheduled tasks
pub async fn start_scheduler(deps: Arc<PipelineDeps>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    // Pipeline tick - runs every minute
    let tick_deps = deps.clone();
    let tick_job = Job::new_async("0 * * * * *", move |_uuid, _lock| {
        let deps = tick_deps.clone();
        Box::pin(async move {
            if let Err(e) = run_pipeline_tick(&deps).await {
                tracing::error!("Pipeline tick failed: {}", e);
            }
        })
    })?;

    scheduler.add(tick_job).await?;

    // Stale Processing reclaim - runs every five minutes
    let reclaim_deps = deps.clone();
    let reclaim_job = Job::new_async("0 */5 * * * *", move |_uuid, _lock| {
        let deps = reclaim_deps.clone();
        Box::pin(async move {
            if let Err(e) = run_stale_reclaim(&deps).await {
                tracing::error!("Stale reclaim task failed: {}", e);
            }
        })
    })?;

    scheduler.add(reclaim_job).await?;
    scheduler.start().await?;

    tracing::info!(
        "Scheduled tasks started (pipeline tick every minute, stale reclaim every 5 minutes)"
    );
    Ok(scheduler)
}

/// Run one pipeline tick
///
/// Starts scrape runs for searches that are due, then dispatches the batch
/// stages in priority order: geocoding feeds dedup, dedup feeds assembly.
/// Each batch stage carries a static idempotency key, so a tick that fires
/// while the previous batch of a stage is still active is dropped for that
/// stage, not deferred.
async fn run_pipeline_tick(deps: &Arc<PipelineDeps>) -> Result<()> {
    tracing::debug!("Running pipeline tick");

    let started = orchestrator::start_due_runs(deps).await?;
    if started > 0 {
        tracing::info!("Started {} scrape runs for due searches", started);
    }

    let geocode = deps.job_queue.enqueue(GeocodeBatchCommand {}).await?;
    let dedup = deps.job_queue.enqueue(DedupBatchCommand {}).await?;
    let assembly = deps.job_queue.enqueue(AssembleBatchCommand {}).await?;

    for (stage, result) in [
        ("geocode", geocode),
        ("dedup", dedup),
        ("assembly", assembly),
    ] {
        if !result.is_created() {
            tracing::debug!(stage, "previous batch still active, tick dropped");
        }
    }

    Ok(())
}

/// Reclaim work stuck in Processing states
///
/// Items whose worker died before writing a terminal status would otherwise
/// block their run or batch forever. Discovered listings are failed outright
/// (the run completion counter must reach zero), while dedup and assembly
/// work is returned to its pending state for the next batch.
async fn run_stale_reclaim(deps: &Arc<PipelineDeps>) -> Result<()> {
    tracing::debug!("Running stale Processing reclaim");

    let minutes = deps.config.stale_processing_minutes;

    let failed_items = scraper::fail_stale_items(deps).await?;
    let reclaimed_listings = Listing::reclaim_stale_processing(minutes, &deps.db_pool).await?;
    let reclaimed_groups =
        ListingGroup::reclaim_stale_processing_ai(minutes, &deps.db_pool).await?;

    if failed_items > 0 || reclaimed_listings > 0 || reclaimed_groups > 0 {
        tracing::info!(
            failed_items,
            reclaimed_listings,
            reclaimed_groups,
            "Stale reclaim complete"
        );
    }

    Ok(())
}
