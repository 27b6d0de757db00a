//! PostgreSQL-backed job queue implementation.
//!
//! This module provides the core job queue functionality for storing
//! and retrieving jobs from PostgreSQL.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::job::{ErrorKind, Job, JobPriority};

/// Result type for enqueue operations that handles idempotency.
#[derive(Debug, Clone)]
pub enum EnqueueResult {
    /// Command was enqueued, returns new job ID
    Created(Uuid),
    /// Command already exists (idempotency hit), returns existing job ID
    Duplicate(Uuid),
}

impl EnqueueResult {
    /// Get the job ID regardless of whether it was created or duplicate
    pub fn job_id(&self) -> Uuid {
        match self {
            EnqueueResult::Created(id) | EnqueueResult::Duplicate(id) => *id,
        }
    }

    /// Returns true if this was a newly created job
    pub fn is_created(&self) -> bool {
        matches!(self, EnqueueResult::Created(_))
    }
}

/// A claimed job ready for execution.
#[derive(Debug)]
pub struct ClaimedJob {
    /// The job ID
    pub id: Uuid,
    /// The raw job record
    pub job: Job,
}

impl ClaimedJob {
    /// Deserialize the command payload.
    pub fn deserialize<C: DeserializeOwned>(&self) -> Result<C> {
        let args = self
            .job
            .args
            .as_ref()
            .ok_or_else(|| anyhow!("job {} has no args", self.id))?;
        serde_json::from_value(args.clone())
            .map_err(|e| anyhow!("failed to deserialize command: {}", e))
    }

    /// Get the command type (job_type)
    pub fn command_type(&self) -> &str {
        &self.job.job_type
    }

    /// Get the command version
    pub fn command_version(&self) -> i32 {
        self.job.command_version
    }
}

/// Metadata for command serialization.
///
/// Commands should implement this trait to provide type information
/// and optional idempotency keys.
pub trait CommandMeta {
    /// The command type name (used as job_type).
    fn command_type(&self) -> &'static str;

    /// Optional idempotency key.
    ///
    /// If provided, ensures only one pending/running job exists with this key.
    fn idempotency_key(&self) -> Option<String> {
        None
    }

    /// The command version for schema evolution.
    fn command_version(&self) -> i32 {
        1
    }

    /// Optional priority override.
    fn priority(&self) -> JobPriority {
        JobPriority::Normal
    }

    /// Maximum retries for this command.
    fn max_retries(&self) -> i32 {
        3
    }

    /// Lease duration for this command.
    ///
    /// Long-running commands (page-by-page discovery) should raise this so
    /// the stale-lease recovery path does not reclaim them mid-run.
    fn lease_duration_ms(&self) -> i64 {
        60_000
    }
}

/// PostgreSQL-backed job queue.
pub struct PostgresJobQueue {
    pool: PgPool,
}

impl PostgresJobQueue {
    /// Create a new PostgreSQL job queue.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue a command for immediate execution.
    ///
    /// If the command provides an idempotency key and a matching
    /// pending/running job exists, returns `EnqueueResult::Duplicate` with
    /// the existing job ID.
    pub async fn enqueue<C>(&self, command: C) -> Result<EnqueueResult>
    where
        C: Serialize + Send + CommandMeta,
    {
        self.enqueue_internal(command, None).await
    }

    /// Schedule a command for future execution.
    pub async fn schedule<C>(&self, command: C, run_at: DateTime<Utc>) -> Result<EnqueueResult>
    where
        C: Serialize + Send + CommandMeta,
    {
        self.enqueue_internal(command, Some(run_at)).await
    }

    /// Claim up to `limit` jobs for processing.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` for concurrent-safe claiming.
    pub async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedJob>> {
        let jobs = Job::claim_jobs(limit, worker_id, &self.pool).await?;

        Ok(jobs
            .into_iter()
            .map(|job| ClaimedJob { id: job.id, job })
            .collect())
    }

    /// Check if a job with the given idempotency key already exists.
    pub async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, job_type, next_run_at, last_run_at, args,
                   priority, max_retries, retry_count, timeout_ms, lease_duration_ms,
                   lease_expires_at, worker_id, status, enabled, error_message, error_kind,
                   dead_lettered_at, dead_letter_reason, root_job_id, attempt,
                   idempotency_key, command_version, created_at, updated_at
            FROM jobs
            WHERE idempotency_key = $1
              AND status IN ('pending', 'running')
            LIMIT 1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// Mark a job as successfully completed.
    pub async fn mark_succeeded(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'succeeded',
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark a job as failed with an error.
    ///
    /// If the error is retryable and attempts remain, a retry job is
    /// scheduled with exponential backoff. Otherwise the job is moved to
    /// dead letter.
    pub async fn mark_failed(&self, job_id: Uuid, error: &str, kind: ErrorKind) -> Result<()> {
        let job = Job::find_by_id(job_id, &self.pool).await?;

        if kind.should_retry() && job.retry_count < job.max_retries {
            // Mark the original failed before inserting the retry row: the
            // partial unique index on active idempotency keys would otherwise
            // reject the pending retry while the original is still 'running'.
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'failed',
                    error_message = $1,
                    error_kind = $2,
                    updated_at = NOW()
                WHERE id = $3
                "#,
            )
            .bind(error)
            .bind(kind)
            .bind(job_id)
            .execute(&self.pool)
            .await?;

            // Exponential backoff, capped at 1 hour
            let delay_secs = 2i64.pow(job.retry_count as u32).min(3600);
            let retry_at = Utc::now() + chrono::Duration::seconds(delay_secs);

            let retry_job = job.create_retry(retry_at);
            retry_job.insert(&self.pool).await?;
        } else {
            // No retries left - dead letter
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'dead_letter',
                    error_message = $1,
                    error_kind = $2,
                    dead_lettered_at = NOW(),
                    dead_letter_reason = 'max retries exceeded',
                    updated_at = NOW()
                WHERE id = $3
                "#,
            )
            .bind(error)
            .bind(kind)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Cancel a pending job.
    ///
    /// Only cancels jobs in pending status. Running jobs are cancelled
    /// cooperatively by their handlers.
    pub async fn cancel(&self, job_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'cancelled',
                error_kind = 'cancelled',
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Extend the lease for a running job (heartbeat).
    pub async fn heartbeat(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET lease_expires_at = NOW() + (lease_duration_ms::TEXT || ' milliseconds')::INTERVAL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Internal method to enqueue a command.
    async fn enqueue_internal<C>(
        &self,
        command: C,
        run_at: Option<DateTime<Utc>>,
    ) -> Result<EnqueueResult>
    where
        C: Serialize + Send + CommandMeta,
    {
        // Check idempotency first
        let idempotency_key = command.idempotency_key();
        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.find_by_idempotency_key(key).await? {
                return Ok(EnqueueResult::Duplicate(existing.id));
            }
        }

        // Serialize command to JSON
        let args = serde_json::to_value(&command)?;

        let job = Job::for_command(
            command.command_type(),
            args,
            run_at,
            idempotency_key.clone(),
            command.command_version(),
            command.priority(),
            command.max_retries(),
            command.lease_duration_ms(),
        );

        // Insert (DB unique index on active idempotency keys backs up the check)
        match job.insert(&self.pool).await {
            Ok(inserted) => Ok(EnqueueResult::Created(inserted.id)),
            Err(e) if is_unique_violation(&e) => {
                let key = idempotency_key
                    .ok_or_else(|| anyhow!("unique violation without idempotency key: {}", e))?;
                let existing = self
                    .find_by_idempotency_key(&key)
                    .await?
                    .ok_or_else(|| anyhow!("lost idempotency race for key {}", key))?;
                Ok(EnqueueResult::Duplicate(existing.id))
            }
            Err(e) => Err(e),
        }
    }
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .map(|db| matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation))
        .unwrap_or(false)
}
