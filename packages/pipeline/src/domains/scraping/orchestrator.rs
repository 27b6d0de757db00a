//! Run orchestration: turning due searches into scrape runs.
//!
//! The scheduler tick calls [`start_due_runs`] every minute; operators start
//! and abort individual runs through [`start_run`] and [`abort_run`]. All
//! three paths funnel through the same database-enforced rule: one active run
//! per search query.

use anyhow::Result;
use tracing::{info, warn};

use super::commands::DiscoverRunCommand;
use super::models::{ScrapeRun, SearchQuery, StartRun};
use crate::common::{ScrapeRunId, SearchQueryId};
use crate::kernel::jobs::JobStatus;
use crate::kernel::PipelineDeps;

/// Start a run for every due search query. Returns how many runs started.
///
/// A query whose previous run is still active is skipped for this cycle; its
/// schedule advances anyway so the tick does not re-land on it every minute.
pub async fn start_due_runs(deps: &PipelineDeps) -> Result<usize> {
    let due = SearchQuery::find_due(&deps.db_pool).await?;
    let mut started = 0;

    for query in due {
        match start_run(query.id, deps).await {
            Ok(StartRun::Started(run)) => {
                info!(
                    search_query_id = %query.id,
                    scrape_run_id = %run.id,
                    name = %query.name,
                    "started scrape run"
                );
                started += 1;
            }
            Ok(StartRun::AlreadyActive(run)) => {
                info!(
                    search_query_id = %query.id,
                    scrape_run_id = %run.id,
                    "previous run still active, skipping this cycle"
                );
            }
            Err(e) => {
                warn!(search_query_id = %query.id, error = %e, "failed to start scrape run");
                continue;
            }
        }
        SearchQuery::advance_schedule(query.id, &deps.db_pool).await?;
    }

    Ok(started)
}

/// Start a run for one search query.
///
/// Returns [`StartRun::AlreadyActive`] without side effects when the query
/// already has a pending/discovering/scraping run. On a fresh start the
/// discovery job is enqueued before returning.
pub async fn start_run(search_query_id: SearchQueryId, deps: &PipelineDeps) -> Result<StartRun> {
    let outcome = ScrapeRun::start(search_query_id, &deps.db_pool).await?;

    if let StartRun::Started(run) = &outcome {
        deps.job_queue
            .enqueue(DiscoverRunCommand {
                scrape_run_id: run.id,
                batch_id: run.batch_id,
            })
            .await?;
    }

    Ok(outcome)
}

/// Abort a run.
///
/// The run is moved to Failed immediately; in-flight workers notice the
/// status change at their next unit boundary and discard their work. A
/// discovery job still sitting in the queue is cancelled outright.
pub async fn abort_run(scrape_run_id: ScrapeRunId, deps: &PipelineDeps) -> Result<bool> {
    let aborted = ScrapeRun::fail(scrape_run_id, "aborted by operator", &deps.db_pool)
        .await?
        .is_some();

    if aborted {
        let key = format!("discover_run:{}", scrape_run_id);
        if let Some(job) = deps.job_queue.find_by_idempotency_key(&key).await? {
            if job.status == JobStatus::Pending && deps.job_queue.cancel(job.id).await? {
                info!(scrape_run_id = %scrape_run_id, "cancelled queued discovery job");
            }
        }
        info!(scrape_run_id = %scrape_run_id, "scrape run aborted");
    }

    Ok(aborted)
}
