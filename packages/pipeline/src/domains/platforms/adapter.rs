//! Platform adapter contract.
//!
//! An adapter is pure data plus three pure functions: where to find fields on
//! a platform's pages, how to build the URL for page N of a search, and how
//! to read the platform's listing id out of a URL. Orchestration never
//! branches on platform; adding a source means adding one configuration.

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use crate::common::utils::normalize_text;
use crate::kernel::FetchOptions;

use super::extraction::{Extractor, FieldSpec};

lazy_static! {
    // Trailing page token some platforms carry in the final search segment
    // ("v1c1098l10594p1" → page 1).
    static ref PAGE_TOKEN: Regex = Regex::new(r"p\d+$").unwrap();
}

/// Where to find search-result cards and their per-card fields.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// CSS selector matching one result card.
    pub result_selector: &'static str,
    /// Within a card, the anchor carrying the listing URL.
    pub link_selector: &'static str,
    pub title_selector: Option<&'static str>,
    pub price_selector: Option<&'static str>,
    pub location_selector: Option<&'static str>,
    /// Whole-page extractors for the declared total result count.
    pub total_count: Vec<Extractor>,
    /// Pagination links; numeric link text is collected as the visible pages.
    pub page_link_selector: &'static str,
}

/// Field specs and script-block patterns for a listing detail page.
#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub fields: Vec<FieldSpec>,
    pub amenity_selector: Option<&'static str>,
    /// (selector, attribute) for gallery images.
    pub image_selector: Option<(&'static str, &'static str)>,
    /// Regexes over inline script content for values the markup omits.
    pub js_variable_patterns: Vec<(&'static str, &'static str)>,
    /// Regexes over analytics dataLayer pushes.
    pub data_layer_patterns: Vec<(&'static str, &'static str)>,
}

/// Platform-native code → standardized value tables.
#[derive(Debug, Clone)]
pub struct CodeMaps {
    pub property_types: &'static [(&'static str, &'static str)],
    pub operation_types: &'static [(&'static str, &'static str)],
    pub currencies: &'static [(&'static str, &'static str)],
    pub publisher_types: &'static [(&'static str, &'static str)],
    /// Normalized keyword → standardized amenity name.
    pub amenities: &'static [(&'static str, &'static str)],
    /// Regex over normalized title/description → property subtype.
    pub subtypes: &'static [(&'static str, &'static str)],
}

/// Fetch hints forwarded to the rendering collaborator.
#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub proxy_country: Option<&'static str>,
    pub headers: &'static [(&'static str, &'static str)],
    pub wait_ms: Option<u32>,
}

/// One source site: declarative extraction config, code maps, and URL rules.
#[derive(Debug, Clone)]
pub struct PlatformAdapter {
    /// Stable platform code ("vivanuncios"); matches the platforms table.
    pub code: &'static str,
    pub name: &'static str,
    pub search: SearchConfig,
    pub listing: ListingConfig,
    pub maps: CodeMaps,
    /// Tried in order against the URL path; first capture group is the id.
    pub external_id_patterns: &'static [&'static str],
    pub scrape: ScrapeOptions,
}

impl PlatformAdapter {
    /// URL for page N of a search. Page 1 is the base URL unchanged; deeper
    /// pages insert a `page-N` segment before the final path segment and
    /// advance a trailing `pN` token where the platform carries one. The
    /// query string survives the transformation.
    pub fn paginate_url(&self, base: &str, page: u32) -> String {
        if page <= 1 {
            return base.to_string();
        }
        let Ok(mut url) = Url::parse(base) else {
            return base.to_string();
        };
        let mut segments: Vec<String> = match url.path_segments() {
            Some(parts) => parts
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => vec![],
        };
        if segments.is_empty() {
            segments.push(format!("page-{page}"));
        } else {
            let idx = segments.len() - 1;
            if PAGE_TOKEN.is_match(&segments[idx]) {
                segments[idx] = PAGE_TOKEN
                    .replace(&segments[idx], format!("p{page}").as_str())
                    .into_owned();
            }
            segments.insert(idx, format!("page-{page}"));
        }
        url.set_path(&segments.join("/"));
        url.to_string()
    }

    /// The platform's listing identifier, or None when the URL carries no
    /// decodable id (navigation links, ads, malformed hrefs).
    pub fn extract_external_id(&self, url: &str) -> Option<String> {
        let end = url.find(|c| c == '?' || c == '#').unwrap_or(url.len());
        let path = &url[..end];
        for pattern in self.external_id_patterns {
            let Ok(re) = Regex::new(pattern) else { continue };
            if let Some(caps) = re.captures(path) {
                if let Some(m) = caps.get(1) {
                    return Some(m.as_str().to_string());
                }
            }
        }
        None
    }

    /// Fetch hints for this platform, in collaborator form.
    pub fn scrape_options(&self) -> FetchOptions {
        FetchOptions {
            proxy_country: self.scrape.proxy_country.map(str::to_string),
            headers: self
                .scrape
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            wait_ms: self.scrape.wait_ms,
        }
    }

    pub fn map_property_type(&self, raw: &str) -> Option<String> {
        lookup(self.maps.property_types, raw)
    }

    pub fn map_operation_type(&self, raw: &str) -> Option<String> {
        lookup(self.maps.operation_types, raw)
    }

    pub fn map_currency(&self, raw: &str) -> Option<String> {
        lookup(self.maps.currencies, raw)
    }

    pub fn map_publisher_type(&self, raw: &str) -> Option<String> {
        lookup(self.maps.publisher_types, raw)
    }

    /// First subtype whose pattern matches the normalized text.
    pub fn map_subtype(&self, text: &str) -> Option<String> {
        let haystack = normalize_text(text);
        for (pattern, subtype) in self.maps.subtypes {
            let Ok(re) = Regex::new(pattern) else { continue };
            if re.is_match(&haystack) {
                return Some((*subtype).to_string());
            }
        }
        None
    }

    /// Standardized amenity names found in the raw feature texts, first-seen
    /// order, deduplicated.
    pub fn standard_amenities(&self, raw_items: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for item in raw_items {
            let normalized = normalize_text(item);
            for (keyword, standard) in self.maps.amenities {
                if normalized.contains(keyword) && !out.iter().any(|a| a == standard) {
                    out.push((*standard).to_string());
                }
            }
        }
        out
    }
}

/// Case-insensitive exact lookup in a code table.
fn lookup(map: &[(&str, &str)], raw: &str) -> Option<String> {
    let key = raw.trim().to_lowercase();
    map.iter()
        .find(|(code, _)| *code == key)
        .map(|(_, standard)| (*standard).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_adapter() -> PlatformAdapter {
        PlatformAdapter {
            code: "test",
            name: "Test Portal",
            search: SearchConfig {
                result_selector: ".card",
                link_selector: "a",
                title_selector: None,
                price_selector: None,
                location_selector: None,
                total_count: vec![],
                page_link_selector: ".pagination a",
            },
            listing: ListingConfig {
                fields: vec![],
                amenity_selector: None,
                image_selector: None,
                js_variable_patterns: vec![],
                data_layer_patterns: vec![],
            },
            maps: CodeMaps {
                property_types: &[("1", "house"), ("casa", "house"), ("2", "apartment")],
                operation_types: &[("venta", "sale"), ("renta", "rent")],
                currencies: &[("mxn", "MXN"), ("usd", "USD")],
                publisher_types: &[("inmobiliaria", "agency"), ("dueño", "owner")],
                amenities: &[("alberca", "pool"), ("jardin", "garden")],
                subtypes: &[(r"\bduplex\b", "duplex"), (r"\bpenthouse\b", "penthouse")],
            },
            external_id_patterns: &[r"/(\d{6,})/?$"],
            scrape: ScrapeOptions {
                proxy_country: Some("mx"),
                headers: &[("Accept-Language", "es-MX")],
                wait_ms: Some(2000),
            },
        }
    }

    #[test]
    fn test_paginate_page_one_is_identity() {
        let adapter = test_adapter();
        let base = "https://example.com/casas-en-venta/guadalajara?sort=price";
        assert_eq!(adapter.paginate_url(base, 1), base);
        assert_eq!(adapter.paginate_url(base, 0), base);
    }

    #[test]
    fn test_paginate_inserts_before_final_segment() {
        let adapter = test_adapter();
        assert_eq!(
            adapter.paginate_url("https://example.com/casas-en-venta/guadalajara", 3),
            "https://example.com/casas-en-venta/page-3/guadalajara"
        );
    }

    #[test]
    fn test_paginate_advances_trailing_page_token() {
        let adapter = test_adapter();
        assert_eq!(
            adapter.paginate_url("https://example.com/casas/puerto-vallarta/v1c1098l10594p1", 2),
            "https://example.com/casas/puerto-vallarta/page-2/v1c1098l10594p2"
        );
    }

    #[test]
    fn test_paginate_preserves_query_string() {
        let adapter = test_adapter();
        assert_eq!(
            adapter.paginate_url("https://example.com/casas/zapopan?sort=price&min=100", 2),
            "https://example.com/casas/page-2/zapopan?sort=price&min=100"
        );
    }

    #[test]
    fn test_paginate_tolerates_trailing_slash() {
        let adapter = test_adapter();
        assert_eq!(
            adapter.paginate_url("https://example.com/casas/zapopan/", 2),
            "https://example.com/casas/page-2/zapopan"
        );
    }

    #[test]
    fn test_extract_external_id() {
        let adapter = test_adapter();
        assert_eq!(
            adapter.extract_external_id("https://example.com/casa-en-venta-granja/1234567890"),
            Some("1234567890".to_string())
        );
        assert_eq!(
            adapter.extract_external_id("https://example.com/casa/1234567890?utm_source=mail"),
            Some("1234567890".to_string())
        );
        assert_eq!(
            adapter.extract_external_id("https://example.com/casas-en-venta/guadalajara"),
            None
        );
    }

    #[test]
    fn test_code_lookups_are_case_insensitive() {
        let adapter = test_adapter();
        assert_eq!(adapter.map_property_type("Casa"), Some("house".to_string()));
        assert_eq!(adapter.map_property_type("1"), Some("house".to_string()));
        assert_eq!(adapter.map_property_type("bodega"), None);
        assert_eq!(adapter.map_operation_type("VENTA"), Some("sale".to_string()));
        assert_eq!(adapter.map_currency(" MXN "), Some("MXN".to_string()));
        assert_eq!(
            adapter.map_publisher_type("Inmobiliaria"),
            Some("agency".to_string())
        );
    }

    #[test]
    fn test_map_subtype_over_normalized_text() {
        let adapter = test_adapter();
        assert_eq!(
            adapter.map_subtype("Hermoso Dúplex en Providencia"),
            Some("duplex".to_string())
        );
        assert_eq!(adapter.map_subtype("Casa sola en esquina"), None);
    }

    #[test]
    fn test_standard_amenities_dedupes() {
        let adapter = test_adapter();
        let raw = vec![
            "Alberca techada".to_string(),
            "Jardín amplio".to_string(),
            "alberca".to_string(),
        ];
        assert_eq!(adapter.standard_amenities(&raw), vec!["pool", "garden"]);
    }

    #[test]
    fn test_scrape_options_conversion() {
        let adapter = test_adapter();
        let opts = adapter.scrape_options();
        assert_eq!(opts.proxy_country.as_deref(), Some("mx"));
        assert_eq!(opts.wait_ms, Some(2000));
        assert_eq!(
            opts.headers,
            vec![("Accept-Language".to_string(), "es-MX".to_string())]
        );
    }
}
