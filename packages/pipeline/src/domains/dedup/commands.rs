//! Background commands for the dedup domain.

use serde::{Deserialize, Serialize};

use crate::kernel::jobs::CommandMeta;

/// Run one clustering pass over the unchecked listing backlog.
///
/// Single-flight via the constant idempotency key, same as the other batch
/// commands: overlapping scheduler ticks collapse into one pending job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupBatchCommand {}

impl DedupBatchCommand {
    pub const JOB_TYPE: &'static str = "dedup_batch";
}

impl CommandMeta for DedupBatchCommand {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    fn idempotency_key(&self) -> Option<String> {
        Some("dedup_batch".to_string())
    }

    fn lease_duration_ms(&self) -> i64 {
        5 * 60 * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::jobs::JobPriority;

    #[test]
    fn test_single_flight_key_is_constant() {
        let a = DedupBatchCommand {};
        let b = DedupBatchCommand {};
        assert_eq!(a.idempotency_key(), b.idempotency_key());
        assert_eq!(a.command_type(), "dedup_batch");
        assert_eq!(a.priority(), JobPriority::Normal);
    }
}
