use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{PlatformId, SearchQueryId};

/// SearchQuery - a saved platform search the pipeline discovers from.
///
/// `interval_minutes` drives the recurring schedule; None means the query
/// only runs when an operator starts it by hand.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SearchQuery {
    pub id: SearchQueryId,
    pub platform_id: PlatformId,
    pub name: String,
    /// Page-1 search URL; deeper pages come from the adapter's paginate rule.
    pub url: String,
    pub interval_minutes: Option<i32>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SearchQuery {
    // =========================================================================
    // SQL Queries - ALL queries for search_queries must be in this file
    // =========================================================================

    pub async fn create(
        platform_id: PlatformId,
        name: &str,
        url: &str,
        interval_minutes: Option<i32>,
        pool: &PgPool,
    ) -> Result<Self> {
        let query = sqlx::query_as::<_, SearchQuery>(
            r#"
            INSERT INTO search_queries (id, platform_id, name, url, interval_minutes, next_run_at, active)
            VALUES ($1, $2, $3, $4, $5, CASE WHEN $5::INT IS NULL THEN NULL ELSE NOW() END, true)
            RETURNING *
            "#,
        )
        .bind(SearchQueryId::new())
        .bind(platform_id)
        .bind(name)
        .bind(url)
        .bind(interval_minutes)
        .fetch_one(pool)
        .await?;
        Ok(query)
    }

    pub async fn find_by_id(id: SearchQueryId, pool: &PgPool) -> Result<Self> {
        let query = sqlx::query_as::<_, SearchQuery>("SELECT * FROM search_queries WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(query)
    }

    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>> {
        let queries =
            sqlx::query_as::<_, SearchQuery>("SELECT * FROM search_queries ORDER BY created_at")
                .fetch_all(pool)
                .await?;
        Ok(queries)
    }

    /// Queries whose schedule has come due. Only active queries on an active
    /// platform qualify; manual-only queries (no interval) never appear.
    pub async fn find_due(pool: &PgPool) -> Result<Vec<Self>> {
        let queries = sqlx::query_as::<_, SearchQuery>(
            r#"
            SELECT sq.* FROM search_queries sq
            JOIN platforms p ON p.id = sq.platform_id
            WHERE sq.active = true
              AND p.active = true
              AND sq.interval_minutes IS NOT NULL
              AND (sq.next_run_at IS NULL OR sq.next_run_at <= NOW())
            ORDER BY sq.next_run_at NULLS FIRST
            "#,
        )
        .fetch_all(pool)
        .await?;
        Ok(queries)
    }

    /// Push `next_run_at` one interval into the future. Called when a run
    /// starts so the next tick does not double-start.
    pub async fn advance_schedule(id: SearchQueryId, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE search_queries
            SET next_run_at = NOW() + (interval_minutes::TEXT || ' minutes')::INTERVAL,
                updated_at = NOW()
            WHERE id = $1 AND interval_minutes IS NOT NULL
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn set_active(id: SearchQueryId, active: bool, pool: &PgPool) -> Result<Self> {
        let query = sqlx::query_as::<_, SearchQuery>(
            r#"
            UPDATE search_queries
            SET active = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(active)
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(query)
    }
}
