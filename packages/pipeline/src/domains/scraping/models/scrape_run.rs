use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::common::{ScrapeRunId, SearchQueryId};

/// ScrapeRun - one pass over a search query, from discovery through scraping.
///
/// Lifecycle: Pending → Discovering → Scraping → Completed, with Failed
/// reachable from any non-terminal state. Every transition is guarded by a
/// WHERE clause on the current status, so a cancelled or concurrently-moved
/// run simply updates zero rows.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScrapeRun {
    pub id: ScrapeRunId,
    pub search_query_id: SearchQueryId,
    /// Batch tag stamped onto every discovered listing this run surfaced.
    pub batch_id: Uuid,
    pub status: String, // 'pending', 'discovering', 'scraping', 'completed', 'failed'
    pub discovered_count: i32,
    pub scraped_count: i32,
    pub failed_count: i32,
    pub unavailable_count: i32,
    /// Items still awaiting a terminal status; the run completes when the
    /// last decrement lands this on zero.
    pub pending_items: i32,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Run status enum
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Discovering,
    Scraping,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Discovering => write!(f, "discovering"),
            RunStatus::Scraping => write!(f, "scraping"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "discovering" => Ok(RunStatus::Discovering),
            "scraping" => Ok(RunStatus::Scraping),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid run status: {}", s)),
        }
    }
}

/// Outcome of starting a run for a query.
#[derive(Debug)]
pub enum StartRun {
    Started(ScrapeRun),
    /// The query already has a non-terminal run; starting again is rejected.
    AlreadyActive(ScrapeRun),
}

/// Terminal outcome of one discovered listing, for the run counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Scraped,
    Failed,
    Unavailable,
}

impl ItemOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Scraped => "scraped",
            ItemOutcome::Failed => "failed",
            ItemOutcome::Unavailable => "unavailable",
        }
    }
}

impl ScrapeRun {
    /// Whether workers should still process units belonging to this run.
    pub fn is_processing(&self) -> bool {
        matches!(self.status.as_str(), "discovering" | "scraping")
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.status.as_str(),
            "pending" | "discovering" | "scraping"
        )
    }

    // =========================================================================
    // SQL Queries - ALL queries for scrape_runs must be in this file
    // =========================================================================

    /// Start a run for a query. The partial unique index on active runs makes
    /// the one-active-run-per-query rule race-safe: a second caller conflicts
    /// and gets the existing run back instead.
    pub async fn start(search_query_id: SearchQueryId, pool: &PgPool) -> Result<StartRun> {
        let inserted = sqlx::query_as::<_, ScrapeRun>(
            r#"
            INSERT INTO scrape_runs (id, search_query_id, batch_id, status)
            VALUES ($1, $2, $3, 'pending')
            ON CONFLICT (search_query_id) WHERE status IN ('pending', 'discovering', 'scraping')
            DO NOTHING
            RETURNING *
            "#,
        )
        .bind(ScrapeRunId::new())
        .bind(search_query_id)
        .bind(Uuid::now_v7())
        .fetch_optional(pool)
        .await?;

        match inserted {
            Some(run) => Ok(StartRun::Started(run)),
            None => {
                let existing = Self::find_active_for_query(search_query_id, pool)
                    .await?
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "run insert conflicted but no active run found for query {}",
                            search_query_id
                        )
                    })?;
                Ok(StartRun::AlreadyActive(existing))
            }
        }
    }

    pub async fn find_by_id(id: ScrapeRunId, pool: &PgPool) -> Result<Self> {
        let run = sqlx::query_as::<_, ScrapeRun>("SELECT * FROM scrape_runs WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(run)
    }

    pub async fn find_active_for_query(
        search_query_id: SearchQueryId,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let run = sqlx::query_as::<_, ScrapeRun>(
            r#"
            SELECT * FROM scrape_runs
            WHERE search_query_id = $1
              AND status IN ('pending', 'discovering', 'scraping')
            LIMIT 1
            "#,
        )
        .bind(search_query_id)
        .fetch_optional(pool)
        .await?;
        Ok(run)
    }

    pub async fn find_recent(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let runs = sqlx::query_as::<_, ScrapeRun>(
            "SELECT * FROM scrape_runs ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(runs)
    }

    /// Pending → Discovering. Returns None when the run has already left
    /// Pending (aborted before the discovery job ran).
    pub async fn begin_discovery(id: ScrapeRunId, pool: &PgPool) -> Result<Option<Self>> {
        let run = sqlx::query_as::<_, ScrapeRun>(
            r#"
            UPDATE scrape_runs
            SET status = 'discovering', started_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(run)
    }

    /// Discovering → Scraping, arming the completion counter with the number
    /// of items the discovery pass left Pending.
    pub async fn begin_scraping(
        id: ScrapeRunId,
        item_count: i32,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let run = sqlx::query_as::<_, ScrapeRun>(
            r#"
            UPDATE scrape_runs
            SET status = 'scraping',
                discovered_count = $2,
                pending_items = $2,
                updated_at = NOW()
            WHERE id = $1 AND status = 'discovering'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(item_count)
        .fetch_optional(pool)
        .await?;
        Ok(run)
    }

    /// Complete a run that never entered the scraping phase (zero items).
    pub async fn complete_empty(id: ScrapeRunId, pool: &PgPool) -> Result<Option<Self>> {
        let run = sqlx::query_as::<_, ScrapeRun>(
            r#"
            UPDATE scrape_runs
            SET status = 'completed', completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'discovering'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(run)
    }

    /// Failed from any non-terminal state, with the reason.
    pub async fn fail(id: ScrapeRunId, message: &str, pool: &PgPool) -> Result<Option<Self>> {
        let run = sqlx::query_as::<_, ScrapeRun>(
            r#"
            UPDATE scrape_runs
            SET status = 'failed',
                error_message = $2,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'discovering', 'scraping')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(message)
        .fetch_optional(pool)
        .await?;
        Ok(run)
    }

    /// Record one item's terminal outcome inside the caller's transaction:
    /// bump the matching counter and decrement `pending_items`. Returns the
    /// remaining count, or None when the run is no longer scraping (aborted
    /// runs absorb late outcomes without effect).
    pub async fn record_item_outcome(
        tx: &mut Transaction<'_, Postgres>,
        id: ScrapeRunId,
        outcome: ItemOutcome,
    ) -> Result<Option<i32>> {
        let remaining = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE scrape_runs
            SET pending_items = pending_items - 1,
                scraped_count = scraped_count + CASE WHEN $2 = 'scraped' THEN 1 ELSE 0 END,
                failed_count = failed_count + CASE WHEN $2 = 'failed' THEN 1 ELSE 0 END,
                unavailable_count = unavailable_count + CASE WHEN $2 = 'unavailable' THEN 1 ELSE 0 END,
                updated_at = NOW()
            WHERE id = $1 AND status = 'scraping'
            RETURNING pending_items
            "#,
        )
        .bind(id)
        .bind(outcome.as_str())
        .fetch_optional(&mut **tx)
        .await?;
        Ok(remaining)
    }

    /// Scraping → Completed once the counter is drained. Only the transaction
    /// that observes the zero-crossing flips the row, so the completion fires
    /// exactly once.
    pub async fn complete_if_drained(
        tx: &mut Transaction<'_, Postgres>,
        id: ScrapeRunId,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scrape_runs
            SET status = 'completed', completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'scraping' AND pending_items <= 0
            "#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
