pub mod discovered_listing;
pub mod platform;
pub mod scrape_run;
pub mod search_query;

pub use discovered_listing::{DiscoveredListing, DiscoveryStatus};
pub use platform::Platform;
pub use scrape_run::{ItemOutcome, RunStatus, ScrapeRun, StartRun};
pub use search_query::SearchQuery;
