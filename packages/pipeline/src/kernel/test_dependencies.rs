// Mock implementations for testing
//
// Provides mock services that can be injected into PipelineDeps for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::traits::{
    BaseAI, BaseGeocoder, BasePageFetcher, FetchError, FetchOptions, FetchedPage,
};
use crate::common::utils::GeocodedLocation;

// =============================================================================
// Mock Page Fetcher
// =============================================================================

/// A canned fetch outcome for the mock fetcher
#[derive(Debug, Clone)]
pub enum MockFetchResponse {
    Page { html: String },
    Gone { status: u16 },
    Transient { message: String },
}

/// Clones share state, so a test can keep one handle for assertions while
/// the dependency bundle owns the other.
#[derive(Clone)]
pub struct MockPageFetcher {
    responses: Arc<Mutex<Vec<MockFetchResponse>>>,
    fetch_calls: Arc<Mutex<Vec<String>>>,
}

impl MockPageFetcher {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            fetch_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful page response
    pub fn with_page(self, html: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push(MockFetchResponse::Page {
                html: html.to_string(),
            });
        self
    }

    /// Queue a permanent "page gone" response
    pub fn with_gone(self, status: u16) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push(MockFetchResponse::Gone { status });
        self
    }

    /// Queue a transient failure response
    pub fn with_transient(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push(MockFetchResponse::Transient {
                message: message.to_string(),
            });
        self
    }

    /// Queue a response after construction (for Arc-shared mocks)
    pub fn push_response(&self, response: MockFetchResponse) {
        self.responses.lock().unwrap().push(response);
    }

    /// Get all URLs that were fetched
    pub fn fetch_calls(&self) -> Vec<String> {
        self.fetch_calls.lock().unwrap().clone()
    }

    /// Check if a URL was fetched
    pub fn was_fetched(&self, url: &str) -> bool {
        self.fetch_calls.lock().unwrap().iter().any(|u| u == url)
    }
}

impl Default for MockPageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BasePageFetcher for MockPageFetcher {
    async fn fetch(&self, url: &str, _options: &FetchOptions) -> Result<FetchedPage, FetchError> {
        // Record the call
        self.fetch_calls.lock().unwrap().push(url.to_string());

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(FetchedPage {
                url: url.to_string(),
                html: "<html><body>Mock page</body></html>".to_string(),
                resolved_url: None,
            });
        }

        match responses.remove(0) {
            MockFetchResponse::Page { html } => Ok(FetchedPage {
                url: url.to_string(),
                html,
                resolved_url: None,
            }),
            MockFetchResponse::Gone { status } => Err(FetchError::Gone { status }),
            MockFetchResponse::Transient { message } => Err(FetchError::Transient {
                source: anyhow!(message),
            }),
        }
    }
}

// =============================================================================
// Mock Geocoder
// =============================================================================

#[derive(Clone)]
pub struct MockGeocoder {
    responses: Arc<Mutex<Vec<Result<GeocodedLocation, String>>>>,
    geocode_calls: Arc<Mutex<Vec<String>>>,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            geocode_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful geocode response
    pub fn with_location(self, latitude: f64, longitude: f64) -> Self {
        self.responses.lock().unwrap().push(Ok(GeocodedLocation {
            latitude,
            longitude,
            display_name: "Mock location".to_string(),
        }));
        self
    }

    /// Queue a geocoding failure
    pub fn with_failure(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push(Err(message.to_string()));
        self
    }

    /// Get all queries that were geocoded
    pub fn geocode_calls(&self) -> Vec<String> {
        self.geocode_calls.lock().unwrap().clone()
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseGeocoder for MockGeocoder {
    async fn geocode(&self, address: &str, city: &str, state: &str) -> Result<GeocodedLocation> {
        let query = format!("{}, {}, {}", address, city, state);
        self.geocode_calls.lock().unwrap().push(query);

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Guadalajara centro as a stable default
            return Ok(GeocodedLocation {
                latitude: 20.6767,
                longitude: -103.3475,
                display_name: "Guadalajara, Jalisco, Mexico".to_string(),
            });
        }

        responses.remove(0).map_err(|message| anyhow!(message))
    }
}

// =============================================================================
// Mock AI
// =============================================================================

#[derive(Clone)]
pub struct MockAI {
    responses: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockAI {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a canned completion response
    pub fn with_response(self, response: &str) -> Self {
        self.responses.lock().unwrap().push(response.to_string());
        self
    }

    /// Queue a response after construction (for Arc-shared mocks)
    pub fn push_response(&self, response: &str) {
        self.responses.lock().unwrap().push(response.to_string());
    }

    /// Get all prompts that were sent
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for MockAI {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseAI for MockAI {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok("{}".to_string());
        }

        Ok(responses.remove(0))
    }
}
