//! Parse a rendered search-results page into structured results.
//!
//! No I/O here: the discovery worker fetches, this module only reads the
//! markup it is handed.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::adapter::PlatformAdapter;
use super::extraction;

/// Lightweight per-card preview; enough for operators to recognize a listing
/// before it has been scraped.
#[derive(Debug, Clone, Default)]
pub struct SearchPreview {
    pub title: Option<String>,
    pub price_text: Option<String>,
    pub location: Option<String>,
}

/// One search result: the listing URL plus whatever the card revealed.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub url: String,
    pub external_id: Option<String>,
    pub preview: SearchPreview,
}

/// A parsed results page.
#[derive(Debug, Clone)]
pub struct SearchPage {
    /// Declared total result count, when the page exposes one.
    pub total_count: Option<i64>,
    /// Page numbers visible in the pagination strip.
    pub visible_pages: Vec<u32>,
    pub results: Vec<SearchResult>,
}

impl SearchPage {
    /// Whether the pagination strip says this page exists.
    pub fn has_page(&self, page: u32) -> bool {
        self.visible_pages.contains(&page)
    }
}

/// Extract results, total count, and visible pages from a search page.
/// Relative hrefs are resolved against `source_url`; duplicate card URLs on
/// the same page collapse to one result.
pub fn parse_search_page(adapter: &PlatformAdapter, html: &str, source_url: &str) -> SearchPage {
    let document = Html::parse_document(html);

    let total_count = extraction::extract_first(&document, html, &adapter.search.total_count)
        .and_then(|t| extraction::first_number(&t))
        .map(|n| n as i64);

    let mut visible_pages: Vec<u32> =
        extraction::select_all_text(&document, adapter.search.page_link_selector)
            .iter()
            .filter_map(|t| t.trim().parse::<u32>().ok())
            .collect();
    visible_pages.sort_unstable();
    visible_pages.dedup();

    let mut results = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    if let Ok(card_selector) = Selector::parse(adapter.search.result_selector) {
        for card in document.select(&card_selector) {
            let Some(href) = card_attr(card, adapter.search.link_selector, "href") else {
                continue;
            };
            let Some(url) = absolutize(source_url, &href) else {
                continue;
            };
            if !seen.insert(url.clone()) {
                continue;
            }
            let external_id = adapter.extract_external_id(&url);
            let preview = SearchPreview {
                title: adapter
                    .search
                    .title_selector
                    .and_then(|s| card_text(card, s)),
                price_text: adapter
                    .search
                    .price_selector
                    .and_then(|s| card_text(card, s)),
                location: adapter
                    .search
                    .location_selector
                    .and_then(|s| card_text(card, s)),
            };
            results.push(SearchResult {
                url,
                external_id,
                preview,
            });
        }
    }

    SearchPage {
        total_count,
        visible_pages,
        results,
    }
}

/// Trimmed text of the first selector match inside a card.
fn card_text(card: ElementRef, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    card.select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|t| !t.is_empty())
}

/// Attribute of the first selector match inside a card.
fn card_attr(card: ElementRef, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    card.select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Resolve a card href against the page it came from; http(s) only.
fn absolutize(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let url = base.join(href).ok()?;
    if url.scheme() == "http" || url.scheme() == "https" {
        Some(url.to_string())
    } else {
        None
    }
}
