use serde::{Deserialize, Serialize};

/// Options controlling how ScrapingBee renders and proxies a request.
#[derive(Debug, Clone, Serialize)]
pub struct RenderOptions {
    /// Execute JavaScript in a headless browser before returning HTML.
    pub render_js: bool,
    /// Two-letter country code for the proxy exit (e.g. "mx").
    pub country_code: Option<String>,
    /// Milliseconds to wait after page load before capturing HTML.
    pub wait_ms: Option<u32>,
    /// Use the premium (residential) proxy pool.
    pub premium_proxy: bool,
    /// Headers forwarded to the target site.
    pub headers: Vec<(String, String)>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            render_js: true,
            country_code: None,
            wait_ms: None,
            premium_proxy: false,
            headers: Vec::new(),
        }
    }
}

/// A fetched page.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderedPage {
    /// The URL that was requested.
    pub url: String,
    /// HTTP status of the target page.
    pub status: u16,
    /// Raw HTML body.
    pub html: String,
    /// Final URL after redirects, when the API reports one.
    pub resolved_url: Option<String>,
}
