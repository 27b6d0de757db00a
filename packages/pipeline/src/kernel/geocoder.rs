//! Nominatim-backed geocoder.

use anyhow::Result;
use async_trait::async_trait;

use super::traits::BaseGeocoder;
use crate::common::utils::{geocode_address, GeocodedLocation};

pub struct NominatimGeocoder;

impl NominatimGeocoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NominatimGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseGeocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str, city: &str, state: &str) -> Result<GeocodedLocation> {
        geocode_address(address, city, state).await
    }
}
