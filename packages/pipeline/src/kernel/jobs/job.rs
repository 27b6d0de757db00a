//! Job model for background command execution.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    DeadLetter,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_priority", rename_all = "snake_case")]
pub enum JobPriority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

impl JobPriority {
    /// Convert to integer for ordering checks (lower = higher priority)
    pub fn as_i16(&self) -> i16 {
        match self {
            JobPriority::Critical => 0,
            JobPriority::High => 1,
            JobPriority::Normal => 2,
            JobPriority::Low => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "error_kind", rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient error - will retry if attempts remain
    #[default]
    Retryable,
    /// Permanent error - will not retry
    NonRetryable,
    /// Job was cancelled by user/system
    Cancelled,
    /// Job was interrupted by graceful shutdown - will retry
    Shutdown,
}

impl ErrorKind {
    /// Whether this error kind should trigger a retry
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Retryable | ErrorKind::Shutdown)
    }
}

// ============================================================================
// Job Model
// ============================================================================

const JOB_COLUMNS: &str = r#"
    id, job_type, next_run_at, last_run_at, args,
    priority, max_retries, retry_count, timeout_ms, lease_duration_ms,
    lease_expires_at, worker_id, status, enabled, error_message, error_kind,
    dead_lettered_at, dead_letter_reason, root_job_id, attempt,
    idempotency_key, command_version, created_at, updated_at
"#;

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Job {
    #[builder(default = Uuid::now_v7())]
    pub id: Uuid,

    // Core identity
    pub job_type: String,

    // Scheduling
    #[builder(default, setter(strip_option))]
    pub next_run_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub last_run_at: Option<DateTime<Utc>>,

    // Payload
    #[builder(default, setter(strip_option))]
    pub args: Option<serde_json::Value>,

    // Policies
    #[builder(default)]
    pub priority: JobPriority,

    // Execution settings
    #[builder(default = 3)]
    pub max_retries: i32,
    #[builder(default = 0)]
    pub retry_count: i32,
    #[builder(default = 300_000)] // 5 minutes
    pub timeout_ms: i64,
    #[builder(default = 60_000)] // 1 minute
    pub lease_duration_ms: i64,

    // Lease management
    #[builder(default, setter(strip_option))]
    pub lease_expires_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub worker_id: Option<String>,

    // State
    #[builder(default)]
    pub status: JobStatus,
    #[builder(default = true)]
    pub enabled: bool,

    // Error tracking
    #[builder(default, setter(strip_option))]
    pub error_message: Option<String>,
    #[builder(default, setter(strip_option))]
    pub error_kind: Option<ErrorKind>,

    // Dead letter workflow
    #[builder(default, setter(strip_option))]
    pub dead_lettered_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub dead_letter_reason: Option<String>,

    // Retry chain tracing
    #[builder(default, setter(strip_option))]
    pub root_job_id: Option<Uuid>,
    #[builder(default = 1)]
    pub attempt: i32,

    // Command-level idempotency
    #[builder(default, setter(strip_option))]
    pub idempotency_key: Option<String>,
    #[builder(default = 1)]
    pub command_version: i32,

    // Timestamps
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create an immediate one-time job (convenience constructor)
    pub fn immediate(job_type: &str) -> Self {
        Self::builder().job_type(job_type.to_string()).build()
    }

    /// Create a job for a serialized command.
    ///
    /// This constructor is used by `PostgresJobQueue` to create jobs from
    /// Commands.
    #[allow(clippy::too_many_arguments)]
    pub fn for_command(
        job_type: &str,
        args: serde_json::Value,
        run_at: Option<DateTime<Utc>>,
        idempotency_key: Option<String>,
        command_version: i32,
        priority: JobPriority,
        max_retries: i32,
        lease_duration_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            job_type: job_type.to_string(),
            next_run_at: run_at,
            last_run_at: None,
            args: Some(args),
            priority,
            max_retries,
            retry_count: 0,
            timeout_ms: 300_000,
            lease_duration_ms,
            lease_expires_at: None,
            worker_id: None,
            status: JobStatus::Pending,
            enabled: true,
            error_message: None,
            error_kind: None,
            dead_lettered_at: None,
            dead_letter_reason: None,
            root_job_id: None,
            attempt: 1,
            idempotency_key,
            command_version,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Check if the job is ready to run
    pub fn is_ready(&self) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }

        if !self.enabled {
            return false;
        }

        if self.retry_count >= self.max_retries {
            return false;
        }

        match self.next_run_at {
            None => true,
            Some(next_run) => next_run <= Utc::now(),
        }
    }

    /// Create a retry job from a failed job
    pub fn create_retry(&self, scheduled_for: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            job_type: self.job_type.clone(),
            next_run_at: Some(scheduled_for),
            last_run_at: None,
            args: self.args.clone(),
            priority: self.priority,
            max_retries: self.max_retries,
            retry_count: self.retry_count + 1,
            timeout_ms: self.timeout_ms,
            lease_duration_ms: self.lease_duration_ms,
            lease_expires_at: None,
            worker_id: None,
            status: JobStatus::Pending,
            enabled: true,
            error_message: None,
            error_kind: None,
            dead_lettered_at: None,
            dead_letter_reason: None,
            root_job_id: self.root_job_id.or(Some(self.id)),
            attempt: self.attempt + 1,
            idempotency_key: self.idempotency_key.clone(),
            command_version: self.command_version,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub async fn find_by_id(id: Uuid, db: &PgPool) -> Result<Self> {
        let job = sqlx::query_as::<_, Self>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(db)
        .await?;

        Ok(job)
    }

    pub async fn insert(&self, db: &PgPool) -> Result<Self> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO jobs (
                id, job_type, next_run_at, last_run_at, args,
                priority, max_retries, retry_count, timeout_ms, lease_duration_ms,
                lease_expires_at, worker_id, status, enabled, error_message, error_kind,
                dead_lettered_at, dead_letter_reason, root_job_id, attempt,
                idempotency_key, command_version, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20,
                $21, $22, $23, $24
            )
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(&self.job_type)
        .bind(self.next_run_at)
        .bind(self.last_run_at)
        .bind(&self.args)
        .bind(self.priority)
        .bind(self.max_retries)
        .bind(self.retry_count)
        .bind(self.timeout_ms)
        .bind(self.lease_duration_ms)
        .bind(self.lease_expires_at)
        .bind(&self.worker_id)
        .bind(self.status)
        .bind(self.enabled)
        .bind(&self.error_message)
        .bind(self.error_kind)
        .bind(self.dead_lettered_at)
        .bind(&self.dead_letter_reason)
        .bind(self.root_job_id)
        .bind(self.attempt)
        .bind(&self.idempotency_key)
        .bind(self.command_version)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(db)
        .await?;

        Ok(job)
    }

    /// Claim jobs atomically using FOR UPDATE SKIP LOCKED
    /// Also recovers stale jobs with expired leases
    pub async fn claim_jobs(limit: i64, worker_id: &str, db: &PgPool) -> Result<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Self>(&format!(
            r#"
            WITH next_jobs AS (
                SELECT id
                FROM jobs
                WHERE
                    (status = 'pending' AND enabled = true AND (next_run_at IS NULL OR next_run_at <= NOW()) AND retry_count < max_retries)
                    OR (status = 'running' AND lease_expires_at < NOW())
                ORDER BY priority, COALESCE(next_run_at, created_at)
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET
                status = 'running',
                last_run_at = COALESCE(last_run_at, NOW()),
                lease_expires_at = NOW() + (lease_duration_ms::TEXT || ' milliseconds')::INTERVAL,
                worker_id = $2,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_jobs)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(limit)
        .bind(worker_id)
        .fetch_all(db)
        .await?;

        Ok(jobs)
    }

    /// Extend the lease for a running job (heartbeat)
    pub async fn extend_lease(&self, db: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET lease_expires_at = NOW() + (lease_duration_ms::TEXT || ' milliseconds')::INTERVAL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(self.id)
        .execute(db)
        .await?;

        Ok(())
    }

    /// Job counts per status, for operational inspection
    pub async fn count_by_status(db: &PgPool) -> Result<Vec<(JobStatus, i64)>> {
        let counts = sqlx::query_as::<_, (JobStatus, i64)>(
            "SELECT status, COUNT(*) FROM jobs GROUP BY status ORDER BY status",
        )
        .fetch_all(db)
        .await?;

        Ok(counts)
    }
}
