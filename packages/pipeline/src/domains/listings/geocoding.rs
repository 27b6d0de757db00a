//! Geocoding enrichment: resolve coordinates for listings that arrived
//! without them.
//!
//! Handler for [`GeocodeBatchCommand`]. Strictly best-effort: a failed lookup
//! is recorded on the listing (so it is never re-picked) and the batch moves
//! on. Listings whose page already carried coordinates skip this stage
//! entirely.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use super::commands::GeocodeBatchCommand;
use super::models::listing::Listing;
use crate::kernel::PipelineDeps;

/// Nominatim's usage policy allows one request per second.
const LOOKUP_SPACING: Duration = Duration::from_millis(1100);

pub async fn run_geocode_batch(_cmd: GeocodeBatchCommand, deps: &PipelineDeps) -> Result<()> {
    let batch = Listing::find_geocode_batch(deps.config.geocode_batch_size, &deps.db_pool).await?;
    if batch.is_empty() {
        return Ok(());
    }

    debug!(batch = batch.len(), "geocoding batch");
    let mut resolved = 0usize;

    for (i, listing) in batch.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(LOOKUP_SPACING).await;
        }

        let address = listing
            .address
            .as_deref()
            .or(listing.neighborhood.as_deref())
            .unwrap_or_default();
        let city = listing.city.as_deref().unwrap_or_default();
        let state = listing.state.as_deref().unwrap_or_default();

        match deps.geocoder.geocode(address, city, state).await {
            Ok(location) => {
                Listing::mark_geocoded(
                    listing.id,
                    location.latitude,
                    location.longitude,
                    &deps.db_pool,
                )
                .await?;
                resolved += 1;
            }
            Err(e) => {
                warn!(listing_id = %listing.id, error = %e, "geocode lookup failed");
                Listing::mark_geocode_attempted(listing.id, &deps.db_pool).await?;
            }
        }
    }

    info!(batch = batch.len(), resolved, "geocode batch finished");
    Ok(())
}
