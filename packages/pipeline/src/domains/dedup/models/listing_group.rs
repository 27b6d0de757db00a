use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};

use crate::common::{ListingGroupId, PropertyId};

/// ListingGroup - a candidate duplicate cluster awaiting review.
///
/// Groups never exist with fewer than two members; the review operations
/// dissolve a group rather than let it shrink below that.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ListingGroup {
    pub id: ListingGroupId,
    /// Mean pair score of the cluster's matching edges, in [0, 1].
    pub score: f64,
    pub status: String, // 'pending_review', 'pending_ai', 'processing_ai', 'rejected', 'completed'
    pub city: Option<String>,
    pub rejection_reason: Option<String>,
    pub property_id: Option<PropertyId>,
    pub ai_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Group status enum
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    PendingReview,
    PendingAi,
    ProcessingAi,
    Rejected,
    Completed,
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupStatus::PendingReview => write!(f, "pending_review"),
            GroupStatus::PendingAi => write!(f, "pending_ai"),
            GroupStatus::ProcessingAi => write!(f, "processing_ai"),
            GroupStatus::Rejected => write!(f, "rejected"),
            GroupStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for GroupStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending_review" => Ok(GroupStatus::PendingReview),
            "pending_ai" => Ok(GroupStatus::PendingAi),
            "processing_ai" => Ok(GroupStatus::ProcessingAi),
            "rejected" => Ok(GroupStatus::Rejected),
            "completed" => Ok(GroupStatus::Completed),
            _ => Err(anyhow::anyhow!("Invalid group status: {}", s)),
        }
    }
}

impl ListingGroup {
    /// Whether review operations (reject, remove member) may still touch
    /// this group.
    pub fn is_editable(&self) -> bool {
        matches!(self.status.as_str(), "pending_review" | "pending_ai")
    }

    // =========================================================================
    // SQL Queries - ALL queries for listing_groups must be in this file
    // =========================================================================

    /// Create a group inside the clustering transaction.
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        score: f64,
        city: Option<&str>,
    ) -> Result<Self> {
        let group = sqlx::query_as::<_, ListingGroup>(
            r#"
            INSERT INTO listing_groups (id, score, status, city)
            VALUES ($1, $2, 'pending_review', $3)
            RETURNING *
            "#,
        )
        .bind(ListingGroupId::new())
        .bind(score)
        .bind(city)
        .fetch_one(&mut **tx)
        .await?;
        Ok(group)
    }

    pub async fn find_by_id(id: ListingGroupId, pool: &PgPool) -> Result<Self> {
        let group = sqlx::query_as::<_, ListingGroup>("SELECT * FROM listing_groups WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(group)
    }

    /// Lock one group for a transactional mutation.
    pub async fn find_for_update(
        tx: &mut Transaction<'_, Postgres>,
        id: ListingGroupId,
    ) -> Result<Option<Self>> {
        let group = sqlx::query_as::<_, ListingGroup>(
            "SELECT * FROM listing_groups WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(group)
    }

    /// The next group an operator should look at: highest score first,
    /// optionally skipping the one just resolved.
    pub async fn next_for_review(
        exclude: Option<ListingGroupId>,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let group = sqlx::query_as::<_, ListingGroup>(
            r#"
            SELECT * FROM listing_groups
            WHERE status = 'pending_review'
              AND ($1::UUID IS NULL OR id <> $1)
            ORDER BY score DESC, created_at
            LIMIT 1
            "#,
        )
        .bind(exclude)
        .fetch_optional(pool)
        .await?;
        Ok(group)
    }

    pub async fn find_pending_review(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let groups = sqlx::query_as::<_, ListingGroup>(
            r#"
            SELECT * FROM listing_groups
            WHERE status = 'pending_review'
            ORDER BY score DESC, created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(groups)
    }

    /// Queue an approved group for property assembly.
    pub async fn approve(id: ListingGroupId, pool: &PgPool) -> Result<Option<Self>> {
        let group = sqlx::query_as::<_, ListingGroup>(
            r#"
            UPDATE listing_groups
            SET status = 'pending_ai', updated_at = NOW()
            WHERE id = $1 AND status = 'pending_review'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(group)
    }

    /// Mark a group rejected. The caller ungroups the members in the same
    /// transaction.
    pub async fn reject(
        tx: &mut Transaction<'_, Postgres>,
        id: ListingGroupId,
        reason: &str,
    ) -> Result<Option<Self>> {
        let group = sqlx::query_as::<_, ListingGroup>(
            r#"
            UPDATE listing_groups
            SET status = 'rejected', rejection_reason = $2, updated_at = NOW()
            WHERE id = $1 AND status IN ('pending_review', 'pending_ai')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reason)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(group)
    }

    /// Return a group stuck in ProcessingAi to the assembly queue.
    pub async fn retry_ai(id: ListingGroupId, pool: &PgPool) -> Result<Option<Self>> {
        let group = sqlx::query_as::<_, ListingGroup>(
            r#"
            UPDATE listing_groups
            SET status = 'pending_ai',
                rejection_reason = NULL,
                ai_started_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending_ai', 'processing_ai')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(group)
    }

    /// Claim approved groups for the assembly pass.
    pub async fn claim_for_ai(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let groups = sqlx::query_as::<_, ListingGroup>(
            r#"
            UPDATE listing_groups
            SET status = 'processing_ai', ai_started_at = NOW(), updated_at = NOW()
            WHERE id IN (
                SELECT id FROM listing_groups
                WHERE status = 'pending_ai'
                ORDER BY created_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(groups)
    }

    /// Settle a merged group against its property.
    pub async fn complete(
        tx: &mut Transaction<'_, Postgres>,
        id: ListingGroupId,
        property_id: PropertyId,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE listing_groups
            SET status = 'completed', property_id = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'processing_ai'
            "#,
        )
        .bind(id)
        .bind(property_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a dissolved group. Members must be ungrouped first in the same
    /// transaction.
    pub async fn delete(tx: &mut Transaction<'_, Postgres>, id: ListingGroupId) -> Result<()> {
        sqlx::query("DELETE FROM listing_groups WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Groups whose AI merge never reported back; returned to PendingAi for
    /// another pass.
    pub async fn reclaim_stale_processing_ai(minutes: i64, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE listing_groups
            SET status = 'pending_ai', ai_started_at = NULL, updated_at = NOW()
            WHERE status = 'processing_ai'
              AND ai_started_at < NOW() - ($1::TEXT || ' minutes')::INTERVAL
            "#,
        )
        .bind(minutes)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Status breakdown across all groups, for operator stats.
    pub async fn count_by_status(pool: &PgPool) -> Result<Vec<(String, i64)>> {
        let counts = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM listing_groups GROUP BY status ORDER BY status",
        )
        .fetch_all(pool)
        .await?;
        Ok(counts)
    }
}
