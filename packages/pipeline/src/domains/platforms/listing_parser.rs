//! Parse a rendered listing detail page into a normalized record.
//!
//! Extraction is declarative (the adapter says where fields live); this
//! module owns the normalization: numbers out of localized text, platform
//! codes through the adapter's lookup tables, coordinates out of script
//! blocks. Pure over the HTML string.

use scraper::Html;
use serde_json::json;

use crate::common::utils::{content_hash, normalize_text};

use super::adapter::PlatformAdapter;
use super::extraction;

/// The page fetched fine but the platform's selectors no longer line up with
/// the markup. Treated as a transient scrape failure, logged apart from fetch
/// errors so selector drift shows up in one place.
#[derive(Debug, thiserror::Error)]
#[error("extraction mismatch: anchor fields missing ({missing})")]
pub struct ExtractionMismatch {
    pub missing: String,
}

/// Normalized output of a listing parse. Fields the page did not expose stay
/// None; downstream stages work with whatever survived.
#[derive(Debug, Clone, Default)]
pub struct ParsedListing {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub operation_type: Option<String>,
    pub property_type: Option<String>,
    pub property_subtype: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<f64>,
    pub parking_spaces: Option<i32>,
    pub area_built_m2: Option<f64>,
    pub area_lot_m2: Option<f64>,
    pub address: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub amenities: Vec<String>,
    pub image_urls: Vec<String>,
    pub publisher_name: Option<String>,
    pub publisher_type: Option<String>,
    pub external_id: Option<String>,
    /// Raw extracted fields as the page declared them.
    pub raw: serde_json::Value,
}

impl ParsedListing {
    /// Stable digest of the salient content. Re-scrapes that leave it
    /// unchanged keep their dedup state.
    pub fn content_digest(&self) -> String {
        content_hash(&format!(
            "{} {} {} {} {}",
            self.title.as_deref().unwrap_or(""),
            self.description.as_deref().unwrap_or(""),
            self.price.map(|p| p.to_string()).unwrap_or_default(),
            self.area_built_m2.map(|a| a.to_string()).unwrap_or_default(),
            self.address.as_deref().unwrap_or(""),
        ))
    }
}

/// Extract and normalize a listing page. Errors only when neither of the
/// anchor fields (title, price) could be found, which means the selectors
/// have drifted rather than the page being a thin variant.
pub fn parse_listing_page(
    adapter: &PlatformAdapter,
    html: &str,
    url: &str,
) -> Result<ParsedListing, ExtractionMismatch> {
    let document = Html::parse_document(html);

    let mut fields = extraction::extract_fields(&document, html, &adapter.listing.fields);
    extraction::apply_patterns(html, &adapter.listing.js_variable_patterns, &mut fields);
    extraction::apply_patterns(html, &adapter.listing.data_layer_patterns, &mut fields);

    if !fields.contains_key("title") && !fields.contains_key("price") {
        return Err(ExtractionMismatch {
            missing: "title, price".to_string(),
        });
    }

    let amenity_texts = adapter
        .listing
        .amenity_selector
        .map(|s| extraction::select_all_text(&document, s))
        .unwrap_or_default();
    let image_urls = adapter
        .listing
        .image_selector
        .map(|(s, attr)| extraction::select_all_attr(&document, s, attr))
        .unwrap_or_default();

    let mut raw_fields = serde_json::Map::new();
    for (name, value) in &fields {
        raw_fields.insert((*name).to_string(), serde_json::Value::String(value.clone()));
    }
    let raw = json!({
        "url": url,
        "fields": raw_fields,
        "amenities": amenity_texts,
        "images": image_urls,
    });

    let get = |name: &str| fields.get(name).cloned();

    let title = get("title");
    let description = get("description");
    let price_text = get("price");
    let price = price_text.as_deref().and_then(extraction::first_number);
    let currency = resolve_currency(adapter, get("currency"), price_text.as_deref(), price);
    let operation_type = get("operation_type")
        .and_then(|raw| adapter.map_operation_type(&raw))
        .or_else(|| infer_operation(title.as_deref(), url));
    let property_type = get("property_type").and_then(|raw| adapter.map_property_type(&raw));
    let subtype_basis = format!(
        "{} {}",
        title.as_deref().unwrap_or(""),
        description.as_deref().unwrap_or("")
    );
    let property_subtype = adapter.map_subtype(&subtype_basis);

    Ok(ParsedListing {
        title,
        description,
        price,
        currency,
        operation_type,
        property_type,
        property_subtype,
        bedrooms: get("bedrooms").as_deref().and_then(extraction::first_int),
        bathrooms: get("bathrooms").as_deref().and_then(extraction::first_number),
        parking_spaces: get("parking").as_deref().and_then(extraction::first_int),
        area_built_m2: get("area_built").as_deref().and_then(extraction::first_number),
        area_lot_m2: get("area_lot").as_deref().and_then(extraction::first_number),
        address: get("address"),
        neighborhood: get("neighborhood"),
        city: get("city"),
        state: get("state"),
        latitude: get("latitude").and_then(|t| t.trim().parse::<f64>().ok()),
        longitude: get("longitude").and_then(|t| t.trim().parse::<f64>().ok()),
        amenities: adapter.standard_amenities(&amenity_texts),
        image_urls,
        publisher_name: get("publisher_name"),
        publisher_type: get("publisher_type").and_then(|raw| adapter.map_publisher_type(&raw)),
        external_id: get("external_id").or_else(|| adapter.extract_external_id(url)),
        raw,
    })
}

/// Currency from the adapter's table, else from hints in the price text,
/// else MXN once a price exists (the shipped platforms are Mexican market).
fn resolve_currency(
    adapter: &PlatformAdapter,
    raw_currency: Option<String>,
    price_text: Option<&str>,
    price: Option<f64>,
) -> Option<String> {
    if let Some(raw) = raw_currency {
        if let Some(mapped) = adapter.map_currency(&raw) {
            return Some(mapped);
        }
    }
    if let Some(text) = price_text {
        let hint = normalize_text(text);
        if hint.contains("usd") || hint.contains("dls") || hint.contains("dolar") {
            return Some("USD".to_string());
        }
        if hint.contains("mxn") || hint.contains("pesos") {
            return Some("MXN".to_string());
        }
    }
    price.map(|_| "MXN".to_string())
}

/// Operation type when the page never states one: Mexican portals encode it
/// in the slug/title ("casa-en-renta", "venta de departamento").
fn infer_operation(title: Option<&str>, url: &str) -> Option<String> {
    let basis = normalize_text(&format!("{} {}", title.unwrap_or(""), url));
    if basis.contains("renta") || basis.contains("alquiler") {
        Some("rent".to_string())
    } else if basis.contains("venta") {
        Some("sale".to_string())
    } else {
        None
    }
}
