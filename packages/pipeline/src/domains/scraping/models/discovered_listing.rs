use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::common::{DiscoveredListingId, PlatformId, ScrapeRunId};
use crate::domains::platforms::SearchResult;

/// DiscoveredListing - a listing URL surfaced by a search, unique per
/// (platform, url).
///
/// Re-discovery re-associates the existing row with the new run's batch and
/// resets it to Pending instead of inserting a duplicate; that is what lets a
/// re-run of a query re-surface previously-seen listings for fresh scraping.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DiscoveredListing {
    pub id: DiscoveredListingId,
    pub platform_id: PlatformId,
    /// Most recent run that surfaced this URL.
    pub scrape_run_id: ScrapeRunId,
    pub batch_id: Uuid,
    pub url: String,
    pub external_id: Option<String>,
    pub status: String, // 'pending', 'processing', 'scraped', 'failed', 'unavailable'
    pub title_preview: Option<String>,
    pub price_preview: Option<String>,
    pub location_preview: Option<String>,
    /// Scrape attempts in the current discovery cycle; resets on re-discovery.
    pub attempts: i32,
    pub error_message: Option<String>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Discovery status enum
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStatus {
    Pending,
    Processing,
    Scraped,
    Failed,
    Unavailable,
}

impl DiscoveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DiscoveryStatus::Scraped | DiscoveryStatus::Failed | DiscoveryStatus::Unavailable
        )
    }
}

impl std::fmt::Display for DiscoveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryStatus::Pending => write!(f, "pending"),
            DiscoveryStatus::Processing => write!(f, "processing"),
            DiscoveryStatus::Scraped => write!(f, "scraped"),
            DiscoveryStatus::Failed => write!(f, "failed"),
            DiscoveryStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

impl std::str::FromStr for DiscoveryStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(DiscoveryStatus::Pending),
            "processing" => Ok(DiscoveryStatus::Processing),
            "scraped" => Ok(DiscoveryStatus::Scraped),
            "failed" => Ok(DiscoveryStatus::Failed),
            "unavailable" => Ok(DiscoveryStatus::Unavailable),
            _ => Err(anyhow::anyhow!("Invalid discovery status: {}", s)),
        }
    }
}

impl DiscoveredListing {
    // =========================================================================
    // SQL Queries - ALL queries for discovered_listings must be in this file
    // =========================================================================

    /// Upsert one search result. Conflict on (platform_id, url) re-points the
    /// row at the current run/batch, resets status and attempt budget, and
    /// keeps the richer of old/new preview fields.
    pub async fn upsert(
        platform_id: PlatformId,
        scrape_run_id: ScrapeRunId,
        batch_id: Uuid,
        result: &SearchResult,
        pool: &PgPool,
    ) -> Result<Self> {
        let row = sqlx::query_as::<_, DiscoveredListing>(
            r#"
            INSERT INTO discovered_listings (
                id, platform_id, scrape_run_id, batch_id, url, external_id,
                status, title_preview, price_preview, location_preview
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8, $9)
            ON CONFLICT (platform_id, url) DO UPDATE SET
                scrape_run_id = EXCLUDED.scrape_run_id,
                batch_id = EXCLUDED.batch_id,
                external_id = COALESCE(EXCLUDED.external_id, discovered_listings.external_id),
                status = 'pending',
                attempts = 0,
                error_message = NULL,
                processing_started_at = NULL,
                title_preview = COALESCE(EXCLUDED.title_preview, discovered_listings.title_preview),
                price_preview = COALESCE(EXCLUDED.price_preview, discovered_listings.price_preview),
                location_preview = COALESCE(EXCLUDED.location_preview, discovered_listings.location_preview),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(DiscoveredListingId::new())
        .bind(platform_id)
        .bind(scrape_run_id)
        .bind(batch_id)
        .bind(&result.url)
        .bind(&result.external_id)
        .bind(&result.preview.title)
        .bind(&result.preview.price_text)
        .bind(&result.preview.location)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn find_by_id(id: DiscoveredListingId, pool: &PgPool) -> Result<Self> {
        let row =
            sqlx::query_as::<_, DiscoveredListing>("SELECT * FROM discovered_listings WHERE id = $1")
                .bind(id)
                .fetch_one(pool)
                .await?;
        Ok(row)
    }

    /// Claim an item for scraping. Accepts rows already in 'processing' so a
    /// crashed worker's retry can re-enter its own claim; each claim counts
    /// one attempt.
    pub async fn claim_for_scraping(
        id: DiscoveredListingId,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, DiscoveredListing>(
            r#"
            UPDATE discovered_listings
            SET status = 'processing',
                attempts = attempts + 1,
                processing_started_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    /// Write a terminal status inside the caller's transaction. Returns false
    /// when the row was not in a claimable state (already terminal), which
    /// callers treat as someone else having settled it.
    pub async fn mark_terminal(
        tx: &mut Transaction<'_, Postgres>,
        id: DiscoveredListingId,
        status: DiscoveryStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE discovered_listings
            SET status = $2,
                error_message = $3,
                processing_started_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(error_message)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Release a claim back to Pending (used when the owning run went away
    /// between claim and fetch, so the unit is discarded without an outcome).
    pub async fn release_claim(id: DiscoveredListingId, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE discovered_listings
            SET status = 'pending',
                attempts = GREATEST(attempts - 1, 0),
                processing_started_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Items stuck in 'processing' past the window; their jobs died without
    /// reaching a terminal write.
    pub async fn find_stale_processing(minutes: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, DiscoveredListing>(
            r#"
            SELECT * FROM discovered_listings
            WHERE status = 'processing'
              AND processing_started_at < NOW() - ($1::TEXT || ' minutes')::INTERVAL
            ORDER BY processing_started_at
            "#,
        )
        .bind(minutes)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Pending items of a batch, for seeding the scrape phase.
    pub async fn find_pending_for_batch(batch_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, DiscoveredListing>(
            r#"
            SELECT * FROM discovered_listings
            WHERE batch_id = $1 AND status = 'pending'
            ORDER BY created_at
            "#,
        )
        .bind(batch_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Status breakdown for a batch, for run inspection.
    pub async fn count_by_status_for_batch(
        batch_id: Uuid,
        pool: &PgPool,
    ) -> Result<Vec<(String, i64)>> {
        let counts = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT status, COUNT(*) FROM discovered_listings
            WHERE batch_id = $1
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(batch_id)
        .fetch_all(pool)
        .await?;
        Ok(counts)
    }
}
