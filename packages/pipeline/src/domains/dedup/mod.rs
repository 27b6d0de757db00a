//! Dedup domain: similarity scoring, batch clustering into candidate
//! duplicate groups, and the human review workflow over those groups.

pub mod commands;
pub mod engine;
pub mod models;
pub mod review;
pub mod scoring;

pub use commands::DedupBatchCommand;
pub use models::{GroupStatus, ListingGroup};
pub use review::RemoveOutcome;

use crate::kernel::jobs::JobRegistry;

/// Register this domain's background job handlers.
pub fn register_jobs(registry: &mut JobRegistry) {
    registry.register::<DedupBatchCommand, _, _>(DedupBatchCommand::JOB_TYPE, |cmd, deps| {
        async move { engine::run_dedup_batch(cmd, &deps).await }
    });
}
