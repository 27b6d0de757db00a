use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::PlatformId;
use crate::domains::platforms::{adapter_for, PlatformAdapter};

/// Platform - a listing source site.
///
/// Rows are immutable once queries or listings reference them; the only
/// mutable bit is `active`, which gates new run starts.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Platform {
    pub id: PlatformId,
    /// Stable code matching the adapter registry ("vivanuncios").
    pub code: String,
    pub name: String,
    pub base_url: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Platform {
    /// The adapter for this platform's code. A miss means the row was
    /// created for a code no shipped adapter covers.
    pub fn adapter(&self) -> Result<&'static PlatformAdapter> {
        adapter_for(&self.code)
            .ok_or_else(|| anyhow::anyhow!("no adapter registered for platform '{}'", self.code))
    }

    // =========================================================================
    // SQL Queries - ALL queries for platforms must be in this file
    // =========================================================================

    pub async fn create(code: &str, name: &str, base_url: &str, pool: &PgPool) -> Result<Self> {
        let platform = sqlx::query_as::<_, Platform>(
            r#"
            INSERT INTO platforms (id, code, name, base_url, active)
            VALUES ($1, $2, $3, $4, true)
            RETURNING *
            "#,
        )
        .bind(PlatformId::new())
        .bind(code)
        .bind(name)
        .bind(base_url)
        .fetch_one(pool)
        .await?;
        Ok(platform)
    }

    pub async fn find_by_id(id: PlatformId, pool: &PgPool) -> Result<Self> {
        let platform = sqlx::query_as::<_, Platform>("SELECT * FROM platforms WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(platform)
    }

    pub async fn find_by_code(code: &str, pool: &PgPool) -> Result<Option<Self>> {
        let platform = sqlx::query_as::<_, Platform>("SELECT * FROM platforms WHERE code = $1")
            .bind(code)
            .fetch_optional(pool)
            .await?;
        Ok(platform)
    }

    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>> {
        let platforms =
            sqlx::query_as::<_, Platform>("SELECT * FROM platforms ORDER BY created_at")
                .fetch_all(pool)
                .await?;
        Ok(platforms)
    }

    pub async fn set_active(id: PlatformId, active: bool, pool: &PgPool) -> Result<Self> {
        let platform = sqlx::query_as::<_, Platform>(
            r#"
            UPDATE platforms
            SET active = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(active)
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(platform)
    }
}
