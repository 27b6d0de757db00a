//! Properties domain: the canonical records assembled from approved
//! duplicate groups and individually resolved listings.

pub mod assembler;
pub mod commands;
pub mod models;

pub use commands::AssembleBatchCommand;
pub use models::{Property, PropertyDraft};

use crate::kernel::jobs::JobRegistry;

/// Register this domain's background job handlers.
pub fn register_jobs(registry: &mut JobRegistry) {
    registry.register::<AssembleBatchCommand, _, _>(AssembleBatchCommand::JOB_TYPE, |cmd, deps| {
        async move { assembler::run_assembly_batch(cmd, &deps).await }
    });
}
