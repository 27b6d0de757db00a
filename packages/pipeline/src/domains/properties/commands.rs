//! Background commands for the properties domain.

use serde::{Deserialize, Serialize};

use crate::kernel::jobs::{CommandMeta, JobPriority};

/// Assemble properties from approved groups and resolution-window listings.
///
/// Single-flight via the constant idempotency key. Low priority so a tick's
/// geocode and dedup batches dispatch ahead of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembleBatchCommand {}

impl AssembleBatchCommand {
    pub const JOB_TYPE: &'static str = "assemble_batch";
}

impl CommandMeta for AssembleBatchCommand {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    fn idempotency_key(&self) -> Option<String> {
        Some("assemble_batch".to_string())
    }

    fn priority(&self) -> JobPriority {
        JobPriority::Low
    }

    // A full batch makes one merge-model call per group
    fn lease_duration_ms(&self) -> i64 {
        30 * 60 * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight_key_is_constant() {
        let a = AssembleBatchCommand {};
        let b = AssembleBatchCommand {};
        assert_eq!(a.idempotency_key(), b.idempotency_key());
        assert_eq!(a.command_type(), "assemble_batch");
        assert_eq!(a.priority(), JobPriority::Low);
    }
}
