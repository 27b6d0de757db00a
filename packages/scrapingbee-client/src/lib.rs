//! Pure ScrapingBee REST API client.
//!
//! A minimal client for the ScrapingBee HTML API. Supports JavaScript
//! rendering, geographic proxy selection, post-load wait, and header
//! forwarding.
//!
//! # Example
//!
//! ```rust,ignore
//! use scrapingbee_client::{RenderOptions, ScrapingBeeClient};
//!
//! let client = ScrapingBeeClient::new("your-api-key".into());
//!
//! let options = RenderOptions {
//!     country_code: Some("mx".into()),
//!     wait_ms: Some(2000),
//!     ..Default::default()
//! };
//! let page = client.fetch_html("https://example.com/listing/123", &options).await?;
//! println!("{} bytes", page.html.len());
//! ```

pub mod error;
pub mod types;

pub use error::{Result, ScrapingBeeError};
pub use types::{RenderOptions, RenderedPage};

const BASE_URL: &str = "https://app.scrapingbee.com/api/v1/";

/// Name of the response header carrying the post-redirect URL.
const RESOLVED_URL_HEADER: &str = "Spb-resolved-url";

pub struct ScrapingBeeClient {
    client: reqwest::Client,
    api_key: String,
}

impl ScrapingBeeClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    /// Fetch a page through the rendering proxy and return its HTML.
    ///
    /// The HTTP status of the target page is mirrored onto the API response:
    /// 404/410 become [`ScrapingBeeError::Gone`], 429 becomes
    /// [`ScrapingBeeError::Throttled`], and everything else non-success is
    /// [`ScrapingBeeError::Api`].
    pub async fn fetch_html(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage> {
        let mut query: Vec<(String, String)> = vec![
            ("api_key".into(), self.api_key.clone()),
            ("url".into(), url.to_string()),
            ("render_js".into(), options.render_js.to_string()),
        ];

        if let Some(country) = &options.country_code {
            query.push(("country_code".into(), country.clone()));
        }
        if let Some(wait) = options.wait_ms {
            query.push(("wait".into(), wait.to_string()));
        }
        if options.premium_proxy {
            query.push(("premium_proxy".into(), "true".into()));
        }

        let mut request = self.client.get(BASE_URL).query(&query);

        // Custom headers are forwarded to the target with an Spb- prefix.
        if !options.headers.is_empty() {
            request = request.query(&[("forward_headers", "true")]);
            for (name, value) in &options.headers {
                request = request.header(format!("Spb-{}", name), value);
            }
        }

        tracing::debug!(url, country = ?options.country_code, "Fetching page via ScrapingBee");

        let resp = request.send().await?;
        let status = resp.status().as_u16();

        let resolved_url = resp
            .headers()
            .get(RESOLVED_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = resp.text().await?;

        match status {
            200..=299 => {
                tracing::debug!(url, status, bytes = body.len(), "Page fetched");
                Ok(RenderedPage {
                    url: url.to_string(),
                    status,
                    html: body,
                    resolved_url,
                })
            }
            404 | 410 => Err(ScrapingBeeError::Gone { status }),
            429 => Err(ScrapingBeeError::Throttled {
                status,
                message: body,
            }),
            _ => Err(ScrapingBeeError::Api {
                status,
                message: body,
            }),
        }
    }
}
