//! Generic field extraction over rendered listing markup.
//!
//! Platform adapters declare *what* to pull (selector and regex maps); this
//! module is the engine that pulls it. Everything here is pure over the HTML
//! string so it can be tested against saved page fixtures.

use std::collections::HashMap;

use regex::Regex;
use scraper::{Html, Selector};

/// One way to pull a field out of a page. Extractors are tried in order and
/// the first non-empty value wins, so adapters can list a preferred selector
/// followed by fallbacks for older page variants.
#[derive(Debug, Clone)]
pub enum Extractor {
    /// CSS selector; reads trimmed text content, or an attribute when `attr`
    /// is set.
    Css {
        selector: &'static str,
        attr: Option<&'static str>,
    },
    /// Regex over the raw HTML. The first capture group wins; a pattern
    /// without groups contributes the whole match.
    Pattern(&'static str),
}

impl Extractor {
    pub fn css(selector: &'static str) -> Self {
        Extractor::Css {
            selector,
            attr: None,
        }
    }

    pub fn attr(selector: &'static str, attr: &'static str) -> Self {
        Extractor::Css {
            selector,
            attr: Some(attr),
        }
    }

    pub fn pattern(pattern: &'static str) -> Self {
        Extractor::Pattern(pattern)
    }
}

/// A named field with ordered extraction fallbacks.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub extractors: Vec<Extractor>,
}

impl FieldSpec {
    pub fn new(name: &'static str, extractors: Vec<Extractor>) -> Self {
        Self { name, extractors }
    }
}

/// Run every field spec against a parsed document. Fields that match nothing
/// are simply absent from the map; callers decide which absences matter.
pub fn extract_fields(
    document: &Html,
    raw_html: &str,
    specs: &[FieldSpec],
) -> HashMap<&'static str, String> {
    let mut fields = HashMap::new();
    for spec in specs {
        if let Some(value) = extract_first(document, raw_html, &spec.extractors) {
            fields.insert(spec.name, value);
        }
    }
    fields
}

/// Try extractors in order, returning the first non-empty value.
pub fn extract_first(
    document: &Html,
    raw_html: &str,
    extractors: &[Extractor],
) -> Option<String> {
    for extractor in extractors {
        let value = match extractor {
            Extractor::Css {
                selector,
                attr: None,
            } => select_text(document, selector),
            Extractor::Css {
                selector,
                attr: Some(attr),
            } => select_attr(document, selector, attr),
            Extractor::Pattern(pattern) => capture(raw_html, pattern),
        };
        if let Some(v) = value {
            return Some(v);
        }
    }
    None
}

/// Apply `(field, pattern)` pairs over the raw HTML, filling only fields the
/// selector pass missed. This is how script-embedded values (dataLayer pushes,
/// inline JS variables) backfill gaps in the visible markup.
pub fn apply_patterns(
    raw_html: &str,
    patterns: &[(&'static str, &'static str)],
    fields: &mut HashMap<&'static str, String>,
) {
    for (name, pattern) in patterns {
        if fields.contains_key(name) {
            continue;
        }
        if let Some(value) = capture(raw_html, pattern) {
            fields.insert(name, value);
        }
    }
}

/// First match's trimmed text content, or None when the selector matches
/// nothing (or fails to parse).
pub fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|t| !t.is_empty())
}

/// First match's attribute value.
pub fn select_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Trimmed text of every match, empty entries dropped.
pub fn select_all_text(document: &Html, selector: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return vec![];
    };
    document
        .select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Attribute value of every match, empty entries dropped.
pub fn select_all_attr(document: &Html, selector: &str, attr: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return vec![];
    };
    document
        .select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Run a regex over raw HTML and return the first capture group (or the whole
/// match when the pattern has no groups). Invalid patterns extract nothing.
pub fn capture(raw_html: &str, pattern: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    let caps = re.captures(raw_html)?;
    let matched = caps.get(1).or_else(|| caps.get(0))?;
    let value = matched.as_str().trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// First number in a text fragment, tolerating thousands separators the
/// Mexican portals use ("$2,500,000", "1,234 resultados", "120.5 m²").
pub fn first_number(text: &str) -> Option<f64> {
    let re = Regex::new(r"\d[\d,]*(?:\.\d+)?").ok()?;
    let matched = re.find(text)?;
    matched.as_str().replace(',', "").parse::<f64>().ok()
}

/// First integer in a text fragment ("3 recámaras" → 3).
pub fn first_int(text: &str) -> Option<i32> {
    let re = Regex::new(r"\d[\d,]*").ok()?;
    let matched = re.find(text)?;
    matched.as_str().replace(',', "").parse::<i32>().ok()
}
