//! Scraping domain: platforms, search queries, runs, and the two-phase
//! discovery/scraping workflow that turns a saved search into Listing rows.

pub mod commands;
pub mod discovery;
pub mod models;
pub mod orchestrator;
pub mod scraper;

pub use commands::{DiscoverRunCommand, ScrapeListingCommand};
pub use models::{DiscoveredListing, Platform, ScrapeRun, SearchQuery};

use crate::kernel::jobs::JobRegistry;

/// Register this domain's background job handlers.
pub fn register_jobs(registry: &mut JobRegistry) {
    registry.register::<DiscoverRunCommand, _, _>(
        DiscoverRunCommand::JOB_TYPE,
        |cmd, deps| async move { discovery::run_discovery(cmd, &deps).await },
    );
    registry.register::<ScrapeListingCommand, _, _>(
        ScrapeListingCommand::JOB_TYPE,
        |cmd, deps| async move { scraper::scrape_listing(cmd, &deps).await },
    );
}
