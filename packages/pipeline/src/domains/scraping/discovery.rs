//! Discovery phase: walk a search's result pages and record every listing.
//!
//! Handler for [`DiscoverRunCommand`]. One job walks all pages of one run
//! serially, upserting discovered listings chunk by chunk, then flips the run
//! into its scraping phase and enqueues one scrape job per pending item.
//!
//! The walk is resumable: a lease-expired retry finds the run already in
//! Discovering and simply starts over from page one (upserts are idempotent),
//! or finds it in Scraping and re-seeds the scrape jobs (enqueues are
//! idempotent too). An aborted run is discarded at the next chunk boundary.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::commands::{DiscoverRunCommand, ScrapeListingCommand};
use super::models::{DiscoveredListing, Platform, ScrapeRun, SearchQuery};
use crate::domains::platforms::{parse_search_page, PlatformAdapter};
use crate::kernel::traits::FetchError;
use crate::kernel::PipelineDeps;

/// In-handler retries per search page before the whole run is failed.
const PAGE_FETCH_ATTEMPTS: u32 = 3;

pub async fn run_discovery(cmd: DiscoverRunCommand, deps: &PipelineDeps) -> Result<()> {
    let run = match ScrapeRun::begin_discovery(cmd.scrape_run_id, &deps.db_pool).await? {
        Some(run) => run,
        None => {
            let run = ScrapeRun::find_by_id(cmd.scrape_run_id, &deps.db_pool).await?;
            match run.status.as_str() {
                // Crashed mid-walk; start the walk over.
                "discovering" => run,
                // Crashed between phase flip and job seeding.
                "scraping" => return seed_scrape_jobs(&run, cmd.batch_id, deps).await,
                _ => {
                    debug!(
                        scrape_run_id = %run.id,
                        status = %run.status,
                        "run not in a discoverable state, discarding job"
                    );
                    return Ok(());
                }
            }
        }
    };

    let query = SearchQuery::find_by_id(run.search_query_id, &deps.db_pool).await?;
    let platform = Platform::find_by_id(query.platform_id, &deps.db_pool).await?;
    let adapter = platform.adapter()?;

    info!(
        scrape_run_id = %run.id,
        platform = adapter.code,
        url = %query.url,
        "starting discovery"
    );

    let chunk_size = deps.config.discovery_batch_size.max(1);
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut discovered = 0usize;
    let mut page = 1u32;

    loop {
        let page_url = adapter.paginate_url(&query.url, page);
        let html = match fetch_page(&page_url, adapter, deps).await {
            Ok(html) => html,
            Err(FetchError::Gone { status }) if page > 1 => {
                // Some portals 404 once past the real last page.
                debug!(scrape_run_id = %run.id, page, status, "page gone, end of results");
                break;
            }
            Err(e) => {
                let message = format!("discovery fetch failed on page {}: {}", page, e);
                warn!(scrape_run_id = %run.id, page, error = %e, "discovery failed, failing run");
                ScrapeRun::fail(run.id, &message, &deps.db_pool).await?;
                return Ok(());
            }
        };

        let parsed = parse_search_page(adapter, &html, &page_url);
        debug!(
            scrape_run_id = %run.id,
            page,
            results = parsed.results.len(),
            total_count = ?parsed.total_count,
            "parsed search page"
        );

        let mut new_on_page = 0usize;
        for chunk in parsed.results.chunks(chunk_size) {
            // Cancellation is honored between chunks, not mid-chunk.
            let current = ScrapeRun::find_by_id(run.id, &deps.db_pool).await?;
            if !current.is_processing() {
                info!(
                    scrape_run_id = %run.id,
                    status = %current.status,
                    "run cancelled mid-discovery, discarding"
                );
                return Ok(());
            }

            for result in chunk {
                if !seen_urls.insert(result.url.clone()) {
                    continue;
                }
                DiscoveredListing::upsert(platform.id, run.id, cmd.batch_id, result, &deps.db_pool)
                    .await?;
                new_on_page += 1;
            }
        }
        discovered += new_on_page;

        if parsed.results.is_empty() {
            break;
        }
        // A page that only re-serves known URLs means the portal is looping.
        if page > 1 && new_on_page == 0 {
            debug!(scrape_run_id = %run.id, page, "no new results, stopping pagination");
            break;
        }
        if !parsed.has_page(page + 1) {
            break;
        }
        if page >= deps.config.discovery_page_limit {
            warn!(
                scrape_run_id = %run.id,
                page,
                "discovery page ceiling reached, stopping pagination"
            );
            break;
        }
        page += 1;
    }

    // The batch, not the in-memory counter, decides the next phase: a resumed
    // walk may add nothing while the first pass already seeded the batch.
    let pending = DiscoveredListing::find_pending_for_batch(cmd.batch_id, &deps.db_pool).await?;
    if pending.is_empty() {
        if ScrapeRun::complete_empty(run.id, &deps.db_pool).await?.is_some() {
            info!(scrape_run_id = %run.id, "discovery found nothing, run completed");
        }
        return Ok(());
    }
    let run = match ScrapeRun::begin_scraping(run.id, pending.len() as i32, &deps.db_pool).await? {
        Some(run) => run,
        None => {
            info!(scrape_run_id = %cmd.scrape_run_id, "run cancelled before scraping phase");
            return Ok(());
        }
    };

    info!(
        scrape_run_id = %run.id,
        discovered,
        pending = pending.len(),
        "discovery complete, entering scraping phase"
    );

    seed_scrape_jobs(&run, cmd.batch_id, deps).await
}

/// Enqueue one scrape job per pending item of the batch. Safe to repeat:
/// already-queued items come back as idempotency duplicates.
async fn seed_scrape_jobs(run: &ScrapeRun, batch_id: Uuid, deps: &PipelineDeps) -> Result<()> {
    let pending = DiscoveredListing::find_pending_for_batch(batch_id, &deps.db_pool).await?;
    let mut queued = 0usize;

    for item in &pending {
        let result = deps
            .job_queue
            .enqueue(ScrapeListingCommand {
                discovered_listing_id: item.id,
                scrape_run_id: run.id,
                batch_id,
            })
            .await?;
        if result.is_created() {
            queued += 1;
        }
    }

    debug!(
        scrape_run_id = %run.id,
        pending = pending.len(),
        queued,
        "scrape jobs seeded"
    );
    Ok(())
}

/// Fetch one search page with bounded retries. Permanent failures surface
/// immediately; transient ones back off and retry in place.
async fn fetch_page(
    url: &str,
    adapter: &PlatformAdapter,
    deps: &PipelineDeps,
) -> Result<String, FetchError> {
    let options = adapter.scrape_options();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match deps.fetcher.fetch(url, &options).await {
            Ok(page) => return Ok(page.html),
            Err(e @ FetchError::Gone { .. }) => return Err(e),
            Err(e) if attempt < PAGE_FETCH_ATTEMPTS => {
                debug!(url, attempt, error = %e, "search page fetch failed, retrying");
                tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
            }
            Err(e) => return Err(e),
        }
    }
}
