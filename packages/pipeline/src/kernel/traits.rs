// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (like "parse a search page") should be domain functions
// that use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseAI, BasePageFetcher)

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::common::utils::GeocodedLocation;

// =============================================================================
// Page Fetcher Trait (Infrastructure - rendered HTML retrieval)
// =============================================================================

/// Per-request fetch options, supplied by the platform adapter.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// ISO country code for the proxy exit node (e.g. "mx")
    pub proxy_country: Option<String>,
    /// Extra request headers forwarded to the target site
    pub headers: Vec<(String, String)>,
    /// Milliseconds to wait after page load before capturing HTML
    pub wait_ms: Option<u32>,
}

/// A fetched, fully rendered page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
    /// Final URL after redirects, when the provider reports it
    pub resolved_url: Option<String>,
}

/// Fetch failures, split by whether a retry can ever succeed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The page is permanently gone (HTTP 404/410). Never retried.
    #[error("page permanently unavailable (http {status})")]
    Gone { status: u16 },
    /// Anything else: throttling, timeouts, upstream errors. Retried with backoff.
    #[error("transient fetch failure: {source}")]
    Transient {
        #[source]
        source: anyhow::Error,
    },
}

#[async_trait]
pub trait BasePageFetcher: Send + Sync {
    /// Fetch a URL through the rendering proxy and return the page HTML
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedPage, FetchError>;
}

// =============================================================================
// Geocoder Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseGeocoder: Send + Sync {
    /// Resolve an address to coordinates
    async fn geocode(&self, address: &str, city: &str, state: &str) -> Result<GeocodedLocation>;
}

// =============================================================================
// AI Trait (Infrastructure - Generic LLM capabilities)
// =============================================================================

#[async_trait]
pub trait BaseAI: Send + Sync {
    /// Complete a prompt with an LLM (returns raw text response)
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Complete a prompt expecting JSON response (returns raw JSON string)
    /// Parse with serde_json::from_str in calling code
    async fn complete_json(&self, prompt: &str) -> Result<String> {
        // Default implementation calls complete
        self.complete(prompt).await
    }
}
