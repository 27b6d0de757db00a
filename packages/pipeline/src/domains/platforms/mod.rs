//! Platform adapters and the shared extraction machinery.
//!
//! Everything here is pure: adapters are data, parsers read HTML strings.
//! Fetching, persistence, and run state live in the scraping domain.

pub mod adapter;
pub mod casasyterrenos;
pub mod extraction;
pub mod inmuebles24;
pub mod listing_parser;
pub mod search_parser;
pub mod vivanuncios;

pub use adapter::PlatformAdapter;
pub use listing_parser::{parse_listing_page, ExtractionMismatch, ParsedListing};
pub use search_parser::{parse_search_page, SearchPage, SearchResult};

/// Resolve the adapter for a platform code. Codes match the `platforms`
/// table; unknown codes mean the row predates the adapter or the code was
/// fat-fingered, and callers surface that as a configuration error.
pub fn adapter_for(code: &str) -> Option<&'static PlatformAdapter> {
    match code {
        "vivanuncios" => Some(vivanuncios::adapter()),
        "inmuebles24" => Some(inmuebles24::adapter()),
        "casasyterrenos" => Some(casasyterrenos::adapter()),
        _ => None,
    }
}

/// Every shipped adapter.
pub fn all_adapters() -> Vec<&'static PlatformAdapter> {
    vec![
        vivanuncios::adapter(),
        inmuebles24::adapter(),
        casasyterrenos::adapter(),
    ]
}

#[cfg(test)]
mod tests {
    use regex::Regex;
    use scraper::Selector;

    use super::extraction::Extractor;
    use super::*;

    fn check_selector(errors: &mut Vec<String>, code: &str, what: &str, selector: &str) {
        if Selector::parse(selector).is_err() {
            errors.push(format!("{code}: {what} selector does not parse: {selector}"));
        }
    }

    fn check_pattern(errors: &mut Vec<String>, code: &str, what: &str, pattern: &str) {
        if Regex::new(pattern).is_err() {
            errors.push(format!("{code}: {what} pattern does not compile: {pattern}"));
        }
    }

    fn check_extractor(errors: &mut Vec<String>, code: &str, what: &str, extractor: &Extractor) {
        match extractor {
            Extractor::Css { selector, .. } => check_selector(errors, code, what, selector),
            Extractor::Pattern(pattern) => check_pattern(errors, code, what, pattern),
        }
    }

    // A config typo would otherwise surface as silently-missing fields in
    // production, so every shipped selector and pattern gets compiled here.
    #[test]
    fn test_all_shipped_configs_compile() {
        let mut errors = Vec::new();
        for adapter in all_adapters() {
            let code = adapter.code;

            check_selector(&mut errors, code, "result", adapter.search.result_selector);
            check_selector(&mut errors, code, "link", adapter.search.link_selector);
            for sel in [
                adapter.search.title_selector,
                adapter.search.price_selector,
                adapter.search.location_selector,
            ]
            .into_iter()
            .flatten()
            {
                check_selector(&mut errors, code, "card field", sel);
            }
            check_selector(
                &mut errors,
                code,
                "page link",
                adapter.search.page_link_selector,
            );
            for extractor in &adapter.search.total_count {
                check_extractor(&mut errors, code, "total count", extractor);
            }

            for field in &adapter.listing.fields {
                for extractor in &field.extractors {
                    check_extractor(&mut errors, code, field.name, extractor);
                }
            }
            if let Some(sel) = adapter.listing.amenity_selector {
                check_selector(&mut errors, code, "amenity", sel);
            }
            if let Some((sel, _)) = adapter.listing.image_selector {
                check_selector(&mut errors, code, "image", sel);
            }
            for (name, pattern) in adapter
                .listing
                .js_variable_patterns
                .iter()
                .chain(&adapter.listing.data_layer_patterns)
            {
                check_pattern(&mut errors, code, name, pattern);
            }

            for pattern in adapter.external_id_patterns {
                check_pattern(&mut errors, code, "external id", pattern);
            }
            for (pattern, subtype) in adapter.maps.subtypes {
                check_pattern(&mut errors, code, subtype, pattern);
            }
        }
        assert!(errors.is_empty(), "{}", errors.join("\n"));
    }

    #[test]
    fn test_adapter_for_known_codes() {
        assert_eq!(adapter_for("vivanuncios").map(|a| a.code), Some("vivanuncios"));
        assert_eq!(adapter_for("inmuebles24").map(|a| a.code), Some("inmuebles24"));
        assert_eq!(
            adapter_for("casasyterrenos").map(|a| a.code),
            Some("casasyterrenos")
        );
        assert!(adapter_for("zillow").is_none());
    }

    #[test]
    fn test_adapter_codes_are_unique() {
        let mut codes: Vec<&str> = all_adapters().iter().map(|a| a.code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all_adapters().len());
    }
}
