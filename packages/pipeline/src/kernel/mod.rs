//! Kernel module - pipeline infrastructure and dependencies.

pub mod ai;
pub mod deps;
pub mod fetcher;
pub mod geocoder;
pub mod jobs;
pub mod scheduled_tasks;
pub mod test_dependencies;
pub mod traits;

/// Default model for property merge synthesis.
pub const MERGE_MODEL: &str = "gpt-4o";

pub use ai::OpenAIClient;
pub use deps::PipelineDeps;
pub use fetcher::ScrapingBeeFetcher;
pub use geocoder::NominatimGeocoder;
pub use test_dependencies::{MockAI, MockGeocoder, MockPageFetcher};
pub use traits::*;
