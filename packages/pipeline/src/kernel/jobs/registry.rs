//! Job registry for deserializing and executing jobs.
//!
//! The registry maps job type strings (e.g., "discover_run") to:
//! - Deserializers that reconstruct typed command structs from JSON
//! - Handlers that execute the command logic
//!
//! This allows the JobRunner to claim jobs from the database and dispatch
//! them to the appropriate domain handlers without knowing the concrete
//! types.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;

use super::queue::{ClaimedJob, CommandMeta};
use crate::kernel::PipelineDeps;

/// Type alias for the async handler function.
///
/// Handlers take a reference to PipelineDeps and return a Result.
/// The command data is captured in the closure when registering.
type BoxedHandler = Box<
    dyn Fn(
            serde_json::Value,
            Arc<PipelineDeps>,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>
        + Send
        + Sync,
>;

/// Registration entry containing the handler.
struct JobRegistration {
    handler: BoxedHandler,
}

/// Registry that maps job type strings to handlers.
///
/// Each domain registers its job types at startup. When the JobRunner
/// claims a job, it uses this registry to deserialize and execute
/// the command in one step.
///
/// # Example
///
/// ```ignore
/// let mut registry = JobRegistry::new();
///
/// registry.register::<DiscoverRunCommand, _, _>(
///     DiscoverRunCommand::JOB_TYPE,
///     |cmd, deps| async move { discovery::run_discovery(cmd, &deps).await },
/// );
///
/// // Later, in JobRunner
/// registry.execute(&claimed_job, deps.clone()).await?;
/// ```
#[derive(Default)]
pub struct JobRegistry {
    registrations: HashMap<&'static str, JobRegistration>,
}

impl JobRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            registrations: HashMap::new(),
        }
    }

    /// Register a job type with its handler.
    ///
    /// The handler is an async function that receives the deserialized
    /// command and PipelineDeps, and returns a Result.
    pub fn register<J, F, Fut>(&mut self, job_type: &'static str, handler: F)
    where
        J: CommandMeta + DeserializeOwned + Send + Sync + 'static,
        F: Fn(J, Arc<PipelineDeps>) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let boxed_handler: BoxedHandler = Box::new(move |value, deps| {
            let handler = handler.clone();
            Box::pin(async move {
                let command: J = serde_json::from_value(value)
                    .map_err(|e| anyhow!("Failed to deserialize {}: {}", job_type, e))?;
                handler(command, deps).await
            })
        });

        self.registrations.insert(
            job_type,
            JobRegistration {
                handler: boxed_handler,
            },
        );
    }

    /// Execute a claimed job using its registered handler.
    ///
    /// Returns an error if:
    /// - The job type is not registered
    /// - The JSON payload cannot be deserialized
    /// - The handler returns an error
    pub async fn execute(&self, job: &ClaimedJob, deps: Arc<PipelineDeps>) -> Result<()> {
        let job_type = job.command_type();
        let registration = self
            .registrations
            .get(job_type)
            .ok_or_else(|| anyhow!("Unknown job type: {}", job_type))?;

        let args = job
            .job
            .args
            .clone()
            .ok_or_else(|| anyhow!("Job {} has no args", job.id))?;

        (registration.handler)(args, deps).await
    }

    /// Check if a job type is registered.
    pub fn is_registered(&self, job_type: &str) -> bool {
        self.registrations.contains_key(job_type)
    }

    /// Get all registered job types.
    pub fn registered_types(&self) -> Vec<&'static str> {
        self.registrations.keys().copied().collect()
    }
}

/// Thread-safe registry wrapped in Arc.
pub type SharedJobRegistry = Arc<JobRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    use crate::kernel::jobs::JobPriority;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct TestCommand {
        pub id: Uuid,
        pub name: String,
    }

    impl CommandMeta for TestCommand {
        fn command_type(&self) -> &'static str {
            "test_command"
        }

        fn priority(&self) -> JobPriority {
            JobPriority::Normal
        }
    }

    #[test]
    fn test_register_and_check() {
        let mut registry = JobRegistry::new();
        registry.register::<TestCommand, _, _>("test_command", |_cmd, _deps| async move { Ok(()) });

        assert!(registry.is_registered("test_command"));
        assert!(!registry.is_registered("unknown_command"));
    }

    #[test]
    fn test_registered_types() {
        let mut registry = JobRegistry::new();
        registry.register::<TestCommand, _, _>("test_command", |_cmd, _deps| async move { Ok(()) });

        let types = registry.registered_types();
        assert!(types.contains(&"test_command"));
    }
}
