//! Listings domain: scraped listing detail and the geocoding enrichment
//! stage that prepares it for deduplication.

pub mod commands;
pub mod geocoding;
pub mod models;

pub use commands::GeocodeBatchCommand;
pub use models::{DedupStatus, Listing};

use crate::kernel::jobs::JobRegistry;

/// Register this domain's background job handlers.
pub fn register_jobs(registry: &mut JobRegistry) {
    registry.register::<GeocodeBatchCommand, _, _>(
        GeocodeBatchCommand::JOB_TYPE,
        |cmd, deps| async move { geocoding::run_geocode_batch(cmd, &deps).await },
    );
}
