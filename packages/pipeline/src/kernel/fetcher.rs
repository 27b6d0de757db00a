//! ScrapingBee-backed page fetcher.
//!
//! Implements [`BasePageFetcher`] on top of the `scrapingbee-client` crate.
//! Listing portals are JS-heavy and geo-fenced, so every request renders
//! JavaScript and goes through premium proxies.

use anyhow::anyhow;
use async_trait::async_trait;
use scrapingbee_client::{RenderOptions, ScrapingBeeClient, ScrapingBeeError};

use super::traits::{BasePageFetcher, FetchError, FetchOptions, FetchedPage};

pub struct ScrapingBeeFetcher {
    client: ScrapingBeeClient,
}

impl ScrapingBeeFetcher {
    pub fn new(api_key: String) -> Self {
        Self {
            client: ScrapingBeeClient::new(api_key),
        }
    }
}

#[async_trait]
impl BasePageFetcher for ScrapingBeeFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedPage, FetchError> {
        let render = RenderOptions {
            render_js: true,
            country_code: options.proxy_country.clone(),
            wait_ms: options.wait_ms,
            premium_proxy: true,
            headers: options.headers.clone(),
        };

        let page = self
            .client
            .fetch_html(url, &render)
            .await
            .map_err(|e| match e {
                ScrapingBeeError::Gone { status } => FetchError::Gone { status },
                other => FetchError::Transient {
                    source: anyhow!(other),
                },
            })?;

        Ok(FetchedPage {
            url: page.url,
            html: page.html,
            resolved_url: page.resolved_url,
        })
    }
}
