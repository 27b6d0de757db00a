//! Pair similarity scoring for duplicate detection.
//!
//! The clustering engine only depends on the [`PairScorer`] contract: a
//! [0, 1] score per listing pair. [`WeightedScorer`] is the default policy;
//! swap it out behind the trait if product tuning calls for something else.

use crate::common::utils::{calculate_distance_km, normalize_text, token_jaccard};
use crate::domains::listings::models::Listing;

/// Scoring strategy contract. Implementations must be pure: same pair in,
/// same score out.
pub trait PairScorer: Send + Sync {
    /// Similarity of two listings in [0, 1]. Higher means more likely the
    /// same real-world property.
    fn score(&self, a: &Listing, b: &Listing) -> f64;
}

/// Weighted mean over four signals: location, price, beds/baths/area, text.
///
/// Each component is optional. When one side lacks the data for a signal
/// (no coordinates, differing currencies, no title text) that signal drops
/// out and its weight is redistributed over the rest. A pair with no
/// comparable signal at all scores 0.0 rather than guessing.
#[derive(Debug, Clone)]
pub struct WeightedScorer {
    pub location_weight: f64,
    pub price_weight: f64,
    pub spec_weight: f64,
    pub text_weight: f64,
}

impl Default for WeightedScorer {
    fn default() -> Self {
        Self {
            location_weight: 0.30,
            price_weight: 0.25,
            spec_weight: 0.25,
            text_weight: 0.20,
        }
    }
}

impl PairScorer for WeightedScorer {
    fn score(&self, a: &Listing, b: &Listing) -> f64 {
        let components = [
            (self.location_weight, location_score(a, b)),
            (self.price_weight, price_score(a, b)),
            (self.spec_weight, spec_score(a, b)),
            (self.text_weight, text_score(a, b)),
        ];

        let mut total = 0.0;
        let mut total_weight = 0.0;
        for (weight, component) in components {
            if let Some(value) = component {
                total += weight * value;
                total_weight += weight;
            }
        }

        if total_weight == 0.0 {
            return 0.0;
        }
        total / total_weight
    }
}

/// Coordinate distance when both sides are geocoded, neighborhood match as
/// a fallback. Two points 1km apart or more score 0.
fn location_score(a: &Listing, b: &Listing) -> Option<f64> {
    if let (Some(lat_a), Some(lng_a), Some(lat_b), Some(lng_b)) =
        (a.latitude, a.longitude, b.latitude, b.longitude)
    {
        let distance_km = calculate_distance_km(lat_a, lng_a, lat_b, lng_b);
        return Some((1.0 - distance_km).clamp(0.0, 1.0));
    }

    match (&a.neighborhood, &b.neighborhood) {
        (Some(na), Some(nb)) => {
            if normalize_text(na) == normalize_text(nb) {
                // Same neighborhood narrows it down but is far from exact
                Some(0.75)
            } else {
                Some(0.2)
            }
        }
        _ => None,
    }
}

/// Relative price difference. Only comparable within one currency.
fn price_score(a: &Listing, b: &Listing) -> Option<f64> {
    let (price_a, price_b) = (a.price?, b.price?);
    if a.currency != b.currency {
        return None;
    }

    let max = price_a.max(price_b);
    if max <= 0.0 {
        return Some(1.0);
    }
    Some((1.0 - (price_a - price_b).abs() / max).clamp(0.0, 1.0))
}

/// Mean over whichever structural fields both listings carry.
fn spec_score(a: &Listing, b: &Listing) -> Option<f64> {
    let mut parts: Vec<f64> = Vec::new();

    if let (Some(ba), Some(bb)) = (a.bedrooms, b.bedrooms) {
        parts.push(match (ba - bb).abs() {
            0 => 1.0,
            1 => 0.5,
            _ => 0.0,
        });
    }

    if let (Some(ba), Some(bb)) = (a.bathrooms, b.bathrooms) {
        let diff = (ba - bb).abs();
        parts.push(if diff < 0.01 {
            1.0
        } else if diff <= 1.0 {
            0.5
        } else {
            0.0
        });
    }

    if let (Some(aa), Some(ab)) = (a.area_built_m2, b.area_built_m2) {
        if let Some(part) = area_similarity(aa, ab) {
            parts.push(part);
        }
    }

    if let (Some(ta), Some(tb)) = (&a.property_type, &b.property_type) {
        parts.push(if ta.eq_ignore_ascii_case(tb) { 1.0 } else { 0.0 });
    }

    if let (Some(oa), Some(ob)) = (&a.operation_type, &b.operation_type) {
        parts.push(if oa.eq_ignore_ascii_case(ob) { 1.0 } else { 0.0 });
    }

    if parts.is_empty() {
        return None;
    }
    Some(parts.iter().sum::<f64>() / parts.len() as f64)
}

/// Built areas within 10% are a match; the score decays linearly to 0 at a
/// 50% difference. Portals round the same home's area differently.
fn area_similarity(a: f64, b: f64) -> Option<f64> {
    let max = a.max(b);
    if max <= 0.0 {
        return None;
    }
    let diff_frac = (a - b).abs() / max;
    if diff_frac <= 0.10 {
        Some(1.0)
    } else if diff_frac >= 0.50 {
        Some(0.0)
    } else {
        Some(1.0 - (diff_frac - 0.10) / 0.40)
    }
}

/// Token overlap of title plus description after normalization.
fn text_score(a: &Listing, b: &Listing) -> Option<f64> {
    let text_a = combined_text(a);
    let text_b = combined_text(b);
    if text_a.is_empty() || text_b.is_empty() {
        return None;
    }
    Some(token_jaccard(&text_a, &text_b))
}

fn combined_text(listing: &Listing) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(title) = &listing.title {
        parts.push(title);
    }
    if let Some(description) = &listing.description {
        parts.push(description);
    }
    normalize_text(&parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ListingId, PlatformId};
    use chrono::Utc;

    fn bare_listing() -> Listing {
        Listing {
            id: ListingId::new(),
            platform_id: PlatformId::new(),
            url: "https://example.com/casa/1".to_string(),
            external_id: None,
            status: "pending".to_string(),
            listing_group_id: None,
            is_primary: false,
            property_id: None,
            title: None,
            description: None,
            price: None,
            currency: None,
            operation_type: None,
            property_type: None,
            property_subtype: None,
            bedrooms: None,
            bathrooms: None,
            parking_spaces: None,
            area_built_m2: None,
            area_lot_m2: None,
            address: None,
            neighborhood: None,
            city: None,
            state: None,
            latitude: None,
            longitude: None,
            amenities: vec![],
            image_urls: vec![],
            publisher_name: None,
            publisher_type: None,
            raw: serde_json::Value::Null,
            content_hash: String::new(),
            geocoded_at: None,
            dedup_checked_at: None,
            processing_started_at: None,
            first_scraped_at: Utc::now(),
            last_scraped_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn scored(a: &Listing, b: &Listing) -> f64 {
        WeightedScorer::default().score(a, b)
    }

    #[test]
    fn test_identical_listings_score_high() {
        let mut a = bare_listing();
        a.latitude = Some(20.676);
        a.longitude = Some(-103.347);
        a.price = Some(2_500_000.0);
        a.currency = Some("MXN".to_string());
        a.bedrooms = Some(3);
        a.bathrooms = Some(2.0);
        a.area_built_m2 = Some(140.0);
        a.property_type = Some("house".to_string());
        a.title = Some("Casa en venta Colonia Americana".to_string());
        let b = a.clone();

        assert!(scored(&a, &b) > 0.99);
    }

    #[test]
    fn test_distant_coordinates_score_low() {
        let mut a = bare_listing();
        a.latitude = Some(20.676);
        a.longitude = Some(-103.347);
        let mut b = bare_listing();
        // Roughly 500km away
        b.latitude = Some(19.432);
        b.longitude = Some(-99.133);

        assert_eq!(scored(&a, &b), 0.0);
    }

    #[test]
    fn test_neighborhood_fallback_when_coordinates_missing() {
        let mut a = bare_listing();
        a.neighborhood = Some("Colonia Americana".to_string());
        let mut b = bare_listing();
        b.neighborhood = Some("colonia americana".to_string());

        // Location is the only comparable signal, so the pair score is the
        // neighborhood-match value itself.
        assert!((scored(&a, &b) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_differing_currencies_drop_price_signal() {
        let mut a = bare_listing();
        a.price = Some(2_500_000.0);
        a.currency = Some("MXN".to_string());
        let mut b = bare_listing();
        b.price = Some(130_000.0);
        b.currency = Some("USD".to_string());

        assert!(price_score(&a, &b).is_none());
    }

    #[test]
    fn test_price_similarity_is_relative() {
        let mut a = bare_listing();
        a.price = Some(1_000_000.0);
        a.currency = Some("MXN".to_string());
        let mut b = bare_listing();
        b.price = Some(900_000.0);
        b.currency = Some("MXN".to_string());

        let score = price_score(&a, &b).unwrap();
        assert!((score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_area_within_ten_percent_is_exact() {
        assert_eq!(area_similarity(100.0, 95.0), Some(1.0));
        assert_eq!(area_similarity(100.0, 50.0), Some(0.0));
        let mid = area_similarity(100.0, 70.0).unwrap();
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_off_by_one_bedroom_is_partial() {
        let mut a = bare_listing();
        a.bedrooms = Some(3);
        let mut b = bare_listing();
        b.bedrooms = Some(4);

        assert_eq!(spec_score(&a, &b), Some(0.5));
    }

    #[test]
    fn test_no_comparable_signal_scores_zero() {
        let a = bare_listing();
        let b = bare_listing();
        assert_eq!(scored(&a, &b), 0.0);
    }

    #[test]
    fn test_weights_renormalize_over_missing_components() {
        // Only text is comparable; identical text must still reach 1.0.
        let mut a = bare_listing();
        a.title = Some("Departamento céntrico".to_string());
        let mut b = bare_listing();
        b.title = Some("departamento centrico".to_string());

        assert!((scored(&a, &b) - 1.0).abs() < 1e-9);
    }
}
