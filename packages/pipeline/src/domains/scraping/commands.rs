//! Background commands for the scraping domain.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{DiscoveredListingId, ScrapeRunId};
use crate::kernel::jobs::{CommandMeta, JobPriority};

/// Walk a run's search pages and record every listing URL found.
///
/// One of these exists per run; the idempotency key makes a double enqueue
/// (scheduler tick racing a manual start) collapse onto the same job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverRunCommand {
    pub scrape_run_id: ScrapeRunId,
    pub batch_id: Uuid,
}

impl DiscoverRunCommand {
    pub const JOB_TYPE: &'static str = "discover_run";
}

impl CommandMeta for DiscoverRunCommand {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    fn idempotency_key(&self) -> Option<String> {
        Some(format!("discover_run:{}", self.scrape_run_id))
    }

    fn priority(&self) -> JobPriority {
        JobPriority::High
    }

    // Discovery walks pages serially; a busy portal can take minutes.
    fn lease_duration_ms(&self) -> i64 {
        15 * 60 * 1000
    }
}

/// Scrape one discovered listing's detail page.
///
/// The batch id is part of the key so a later re-discovery of the same item
/// enqueues a fresh job while the old run's job, if still queued, discards
/// itself against the run-active check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeListingCommand {
    pub discovered_listing_id: DiscoveredListingId,
    pub scrape_run_id: ScrapeRunId,
    pub batch_id: Uuid,
}

impl ScrapeListingCommand {
    pub const JOB_TYPE: &'static str = "scrape_listing";
}

impl CommandMeta for ScrapeListingCommand {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    fn idempotency_key(&self) -> Option<String> {
        Some(format!(
            "scrape_listing:{}:{}",
            self.discovered_listing_id, self.batch_id
        ))
    }

    // Job retries must outlast the per-item attempt budget; the item
    // terminalizes itself once attempts run out.
    fn max_retries(&self) -> i32 {
        5
    }

    fn lease_duration_ms(&self) -> i64 {
        3 * 60 * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_key_is_per_run() {
        let run_id = ScrapeRunId::new();
        let cmd = DiscoverRunCommand {
            scrape_run_id: run_id,
            batch_id: Uuid::now_v7(),
        };
        assert_eq!(
            cmd.idempotency_key(),
            Some(format!("discover_run:{}", run_id))
        );
        assert_eq!(cmd.command_type(), "discover_run");
    }

    #[test]
    fn test_scrape_key_changes_per_batch() {
        let item_id = DiscoveredListingId::new();
        let run_id = ScrapeRunId::new();
        let first = ScrapeListingCommand {
            discovered_listing_id: item_id,
            scrape_run_id: run_id,
            batch_id: Uuid::now_v7(),
        };
        let second = ScrapeListingCommand {
            batch_id: Uuid::now_v7(),
            ..first.clone()
        };
        assert_ne!(first.idempotency_key(), second.idempotency_key());
    }
}
