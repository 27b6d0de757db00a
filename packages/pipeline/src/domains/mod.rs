// Business domains
pub mod dedup;
pub mod listings;
pub mod platforms;
pub mod properties;
pub mod scraping;

use crate::kernel::jobs::JobRegistry;

/// Job registry with every domain's background handlers registered.
pub fn build_job_registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    scraping::register_jobs(&mut registry);
    listings::register_jobs(&mut registry);
    dedup::register_jobs(&mut registry);
    properties::register_jobs(&mut registry);
    registry
}
