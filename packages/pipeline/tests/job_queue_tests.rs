mod common;

use common::harness::TestHarness;
use pipeline_core::domains::dedup::DedupBatchCommand;
use pipeline_core::domains::listings::GeocodeBatchCommand;
use pipeline_core::domains::properties::AssembleBatchCommand;
use pipeline_core::kernel::jobs::{ErrorKind, Job, JobStatus, PostgresJobQueue};
use test_context::test_context;

fn queue(ctx: &TestHarness) -> PostgresJobQueue {
    PostgresJobQueue::new(ctx.db_pool.clone())
}

// =============================================================================
// Tests: idempotent enqueue
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn test_idempotent_enqueue_collapses_duplicates(ctx: &TestHarness) {
    let queue = queue(ctx);

    let first = queue
        .enqueue(DedupBatchCommand {})
        .await
        .expect("Enqueue failed");
    assert!(first.is_created());

    let second = queue
        .enqueue(DedupBatchCommand {})
        .await
        .expect("Enqueue failed");
    assert!(!second.is_created());
    assert_eq!(second.job_id(), first.job_id());

    let existing = queue
        .find_by_idempotency_key("dedup_batch")
        .await
        .expect("Lookup failed")
        .expect("Active job should be findable by key");
    assert_eq!(existing.id, first.job_id());

    // Claiming the job keeps the key occupied; only terminal states free it.
    let claimed = queue.claim("worker-1", 10).await.expect("Claim failed");
    assert_eq!(claimed.len(), 1);
    let while_running = queue
        .enqueue(DedupBatchCommand {})
        .await
        .expect("Enqueue failed");
    assert!(!while_running.is_created());

    queue
        .mark_succeeded(first.job_id())
        .await
        .expect("Mark succeeded failed");
    let after_success = queue
        .enqueue(DedupBatchCommand {})
        .await
        .expect("Enqueue failed");
    assert!(after_success.is_created());
    assert_ne!(after_success.job_id(), first.job_id());
}

// =============================================================================
// Tests: claim order and payloads
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn test_claim_orders_by_priority_and_decodes_commands(ctx: &TestHarness) {
    let queue = queue(ctx);

    // Insertion order is the reverse of priority order.
    queue
        .enqueue(AssembleBatchCommand {})
        .await
        .expect("Enqueue failed");
    queue
        .enqueue(DedupBatchCommand {})
        .await
        .expect("Enqueue failed");
    queue
        .enqueue(GeocodeBatchCommand {})
        .await
        .expect("Enqueue failed");

    let claimed = queue.claim("worker-1", 10).await.expect("Claim failed");
    let types: Vec<&str> = claimed.iter().map(|j| j.command_type()).collect();
    assert_eq!(types, ["geocode_batch", "dedup_batch", "assemble_batch"]);

    for job in &claimed {
        assert_eq!(job.job.status, JobStatus::Running);
        assert_eq!(job.job.worker_id.as_deref(), Some("worker-1"));
        assert!(job.job.lease_expires_at.is_some());
    }

    claimed[1]
        .deserialize::<DedupBatchCommand>()
        .expect("Payload should decode to its command");

    // Nothing is double-claimed.
    let empty = queue.claim("worker-2", 10).await.expect("Claim failed");
    assert!(empty.is_empty());
}

// =============================================================================
// Tests: failure handling
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn test_retryable_failure_schedules_a_backoff_retry(ctx: &TestHarness) {
    let queue = queue(ctx);
    let enqueued = queue
        .enqueue(DedupBatchCommand {})
        .await
        .expect("Enqueue failed");
    let claimed = queue.claim("worker-1", 10).await.expect("Claim failed");
    assert_eq!(claimed.len(), 1);

    queue
        .mark_failed(enqueued.job_id(), "connection reset", ErrorKind::Retryable)
        .await
        .expect("Mark failed failed");

    let original = Job::find_by_id(enqueued.job_id(), &ctx.db_pool)
        .await
        .expect("Failed to reload job");
    assert_eq!(original.status, JobStatus::Failed);
    assert_eq!(original.error_message.as_deref(), Some("connection reset"));
    assert_eq!(original.error_kind, Some(ErrorKind::Retryable));

    let retry = queue
        .find_by_idempotency_key("dedup_batch")
        .await
        .expect("Lookup failed")
        .expect("A retry row should hold the key");
    assert_ne!(retry.id, original.id);
    assert_eq!(retry.status, JobStatus::Pending);
    assert_eq!(retry.retry_count, 1);
    assert_eq!(retry.attempt, 2);
    assert_eq!(retry.root_job_id, Some(original.id));
    assert!(retry.next_run_at.is_some(), "retries are delayed, not immediate");

    // First backoff step is one second; after it passes the retry is
    // claimable again.
    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    let reclaimed = queue.claim("worker-1", 10).await.expect("Claim failed");
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].id, retry.id);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_exhausted_or_permanent_failures_dead_letter(ctx: &TestHarness) {
    let queue = queue(ctx);

    // Budget exhausted on a retryable error.
    let exhausted = queue
        .enqueue(DedupBatchCommand {})
        .await
        .expect("Enqueue failed");
    queue.claim("worker-1", 10).await.expect("Claim failed");
    sqlx::query("UPDATE jobs SET retry_count = max_retries WHERE id = $1")
        .bind(exhausted.job_id())
        .execute(&ctx.db_pool)
        .await
        .expect("Failed to exhaust budget");
    queue
        .mark_failed(exhausted.job_id(), "still flaking", ErrorKind::Retryable)
        .await
        .expect("Mark failed failed");

    let job = Job::find_by_id(exhausted.job_id(), &ctx.db_pool)
        .await
        .expect("Failed to reload job");
    assert_eq!(job.status, JobStatus::DeadLetter);
    assert!(job.dead_lettered_at.is_some());
    assert_eq!(job.dead_letter_reason.as_deref(), Some("max retries exceeded"));

    // A permanent error skips the budget entirely.
    let permanent = queue
        .enqueue(GeocodeBatchCommand {})
        .await
        .expect("Enqueue failed");
    queue.claim("worker-1", 10).await.expect("Claim failed");
    queue
        .mark_failed(permanent.job_id(), "invalid api key", ErrorKind::NonRetryable)
        .await
        .expect("Mark failed failed");

    let job = Job::find_by_id(permanent.job_id(), &ctx.db_pool)
        .await
        .expect("Failed to reload job");
    assert_eq!(job.status, JobStatus::DeadLetter);
    assert_eq!(job.error_kind, Some(ErrorKind::NonRetryable));

    let pending = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM jobs WHERE status = 'pending'",
    )
    .fetch_one(&ctx.db_pool)
    .await
    .expect("Failed to count pending jobs");
    assert_eq!(pending, 0, "dead-lettered jobs spawn no retries");
}

// =============================================================================
// Tests: cancellation and lease recovery
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn test_cancel_only_touches_pending_jobs(ctx: &TestHarness) {
    let queue = queue(ctx);

    let pending = queue
        .enqueue(DedupBatchCommand {})
        .await
        .expect("Enqueue failed");
    let cancelled = queue
        .cancel(pending.job_id())
        .await
        .expect("Cancel failed");
    assert!(cancelled);

    let job = Job::find_by_id(pending.job_id(), &ctx.db_pool)
        .await
        .expect("Failed to reload job");
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.error_kind, Some(ErrorKind::Cancelled));

    // Cancellation freed the idempotency key.
    let running = queue
        .enqueue(DedupBatchCommand {})
        .await
        .expect("Enqueue failed");
    assert!(running.is_created());
    queue.claim("worker-1", 10).await.expect("Claim failed");

    let cancelled = queue
        .cancel(running.job_id())
        .await
        .expect("Cancel failed");
    assert!(!cancelled, "running jobs only stop cooperatively");
    let job = Job::find_by_id(running.job_id(), &ctx.db_pool)
        .await
        .expect("Failed to reload job");
    assert_eq!(job.status, JobStatus::Running);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_expired_leases_are_reclaimed_by_the_next_claim(ctx: &TestHarness) {
    let queue = queue(ctx);
    let enqueued = queue
        .enqueue(DedupBatchCommand {})
        .await
        .expect("Enqueue failed");
    let claimed = queue.claim("worker-1", 10).await.expect("Claim failed");
    assert_eq!(claimed.len(), 1);

    // The lease is live; a second worker sees nothing.
    let contested = queue.claim("worker-2", 10).await.expect("Claim failed");
    assert!(contested.is_empty());

    sqlx::query("UPDATE jobs SET lease_expires_at = NOW() - INTERVAL '1 second' WHERE id = $1")
        .bind(enqueued.job_id())
        .execute(&ctx.db_pool)
        .await
        .expect("Failed to expire lease");

    let recovered = queue.claim("worker-2", 10).await.expect("Claim failed");
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].id, enqueued.job_id());
    assert_eq!(recovered[0].job.worker_id.as_deref(), Some("worker-2"));
}
