//! Background commands for the listings domain.

use serde::{Deserialize, Serialize};

use crate::kernel::jobs::{CommandMeta, JobPriority};

/// Geocode the next batch of listings that arrived without coordinates.
///
/// The constant idempotency key is the single-flight lock: a scheduler tick
/// that fires while the previous batch is still pending or running gets a
/// duplicate back and the tick is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeBatchCommand {}

impl GeocodeBatchCommand {
    pub const JOB_TYPE: &'static str = "geocode_batch";
}

impl CommandMeta for GeocodeBatchCommand {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    fn idempotency_key(&self) -> Option<String> {
        Some("geocode_batch".to_string())
    }

    // Runs ahead of dedup and assembly within a tick.
    fn priority(&self) -> JobPriority {
        JobPriority::High
    }

    fn lease_duration_ms(&self) -> i64 {
        10 * 60 * 1000
    }
}
