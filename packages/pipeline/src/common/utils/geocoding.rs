use anyhow::{anyhow, Result};
use serde::Deserialize;
use tracing::{debug, error, instrument, warn};

/// Nominatim API response for geocoding
#[derive(Debug, Deserialize)]
struct NominatimResponse {
    lat: String,
    lon: String,
    display_name: String,
}

/// Geocoded location
#[derive(Debug, Clone)]
pub struct GeocodedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

/// Geocode a listing address to lat/lng coordinates using Nominatim (OpenStreetMap)
///
/// Results are restricted to Mexico since every supported portal lists
/// Mexican inventory. Full precision is kept: duplicate scoring compares
/// listings at street level.
///
/// # Arguments
/// * `address` - Street address or neighborhood (e.g., "Av. Chapultepec 480")
/// * `city` - City name (e.g., "Guadalajara")
/// * `state` - State name (e.g., "Jalisco")
#[instrument]
pub async fn geocode_address(address: &str, city: &str, state: &str) -> Result<GeocodedLocation> {
    let query = format!("{}, {}, {}", address.trim(), city.trim(), state.trim());
    let url = format!(
        "https://nominatim.openstreetmap.org/search?q={}&format=json&limit=1&countrycodes=mx",
        urlencoding::encode(&query)
    );

    debug!("Geocoding location: {}", query);

    let client = reqwest::Client::new();
    let response: Vec<NominatimResponse> = client
        .get(&url)
        .header("User-Agent", "Propfusion/1.0 (Listing Consolidation)")
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| {
            error!(error = %e, city = %city, state = %state, "Geocoding API request failed");
            anyhow!("Geocoding API request failed: {}", e)
        })?
        .json()
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to parse geocoding response");
            anyhow!("Failed to parse geocoding response: {}", e)
        })?;

    let result = response.first().ok_or_else(|| {
        warn!(city = %city, state = %state, "Location not found by geocoding API");
        anyhow!("Location not found: {}", query)
    })?;

    let lat: f64 = result
        .lat
        .parse()
        .map_err(|e| anyhow!("Invalid latitude in response: {}", e))?;
    let lng: f64 = result
        .lon
        .parse()
        .map_err(|e| anyhow!("Invalid longitude in response: {}", e))?;

    debug!("Geocoded {} → ({}, {})", query, lat, lng);

    Ok(GeocodedLocation {
        latitude: lat,
        longitude: lng,
        display_name: result.display_name.clone(),
    })
}

/// Calculate distance between two coordinates in kilometers
///
/// Uses Haversine formula for accuracy on Earth's surface
///
/// # Arguments
/// * `lat1`, `lng1` - First coordinate
/// * `lat2`, `lng2` - Second coordinate
///
/// # Returns
/// Distance in kilometers
pub fn calculate_distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlng / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_distance() {
        // Guadalajara centro to Zapopan centro (≈8 km)
        let guadalajara = (20.6767, -103.3475);
        let zapopan = (20.7235, -103.3848);

        let distance = calculate_distance_km(guadalajara.0, guadalajara.1, zapopan.0, zapopan.1);

        // Should be approximately 6-8 km
        assert!(distance > 5.0 && distance < 9.0);

        // Same location
        let distance = calculate_distance_km(20.6767, -103.3475, 20.6767, -103.3475);
        assert!(distance < 0.1);
    }

    #[test]
    fn test_calculate_distance_street_level() {
        // Two points ~200m apart in Colonia Americana
        let a = (20.6740, -103.3630);
        let b = (20.6755, -103.3640);

        let distance = calculate_distance_km(a.0, a.1, b.0, b.1);
        assert!(distance < 0.3);
    }

    #[tokio::test]
    async fn test_geocode_address() {
        // Integration test - requires internet
        // Skip in CI by checking for env var
        if std::env::var("SKIP_GEOCODING_TESTS").is_ok() {
            return;
        }

        let result = geocode_address("Av. Chapultepec", "Guadalajara", "Jalisco").await;
        assert!(result.is_ok());

        let location = result.unwrap();
        assert!(location.latitude > 20.0 && location.latitude < 21.0);
        assert!(location.longitude < -103.0 && location.longitude > -104.0);
    }

    #[tokio::test]
    async fn test_geocode_invalid_address() {
        if std::env::var("SKIP_GEOCODING_TESTS").is_ok() {
            return;
        }

        let result = geocode_address("Xyzzy 99999", "NonexistentCity123", "XX").await;
        assert!(result.is_err());
    }
}
