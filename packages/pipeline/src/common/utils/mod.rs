pub mod content_hash;
pub mod geocoding;
pub mod text;

pub use content_hash::content_hash;
pub use geocoding::{calculate_distance_km, geocode_address, GeocodedLocation};
pub use text::{normalize_text, token_jaccard};
