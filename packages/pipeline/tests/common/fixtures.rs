//! Test fixtures for creating test data.
//!
//! These fixtures use the model methods directly to create test data.

use anyhow::{anyhow, Result};
use sqlx::PgPool;

use pipeline_core::common::PlatformId;
use pipeline_core::domains::listings::models::Listing;
use pipeline_core::domains::platforms::ParsedListing;
use pipeline_core::domains::scraping::models::{Platform, ScrapeRun, SearchQuery, StartRun};

/// Create a test platform. The code must be one of the shipped adapters for
/// discovery and scraping flows; dedup-level tests can use any code.
pub async fn create_test_platform(pool: &PgPool, code: &str) -> Result<Platform> {
    Platform::create(code, code, "https://www.example.com", pool).await
}

/// Create a manually-triggered search query (no schedule).
pub async fn create_test_search_query(
    pool: &PgPool,
    platform_id: PlatformId,
    url: &str,
) -> Result<SearchQuery> {
    SearchQuery::create(platform_id, "test search", url, None, pool).await
}

/// Start a run for a query, unwrapping the fresh-start case.
pub async fn start_test_run(pool: &PgPool, query: &SearchQuery) -> Result<ScrapeRun> {
    match ScrapeRun::start(query.id, pool).await? {
        StartRun::Started(run) => Ok(run),
        StartRun::AlreadyActive(run) => Err(anyhow!("query already had active run {}", run.id)),
    }
}

/// A fully-populated parse result, the shape a detail page scrape produces.
/// Tests override the fields they care about.
pub fn parsed_listing(title: &str, city: &str) -> ParsedListing {
    ParsedListing {
        title: Some(title.to_string()),
        description: Some(format!("{} con jardin y cochera, excelente ubicacion", title)),
        price: Some(2_500_000.0),
        currency: Some("MXN".to_string()),
        operation_type: Some("sale".to_string()),
        property_type: Some("house".to_string()),
        bedrooms: Some(3),
        bathrooms: Some(2.0),
        parking_spaces: Some(2),
        area_built_m2: Some(180.0),
        area_lot_m2: Some(220.0),
        neighborhood: Some("Providencia".to_string()),
        city: Some(city.to_string()),
        state: Some("Jalisco".to_string()),
        latitude: Some(20.6767),
        longitude: Some(-103.3475),
        amenities: vec!["garden".to_string(), "garage".to_string()],
        raw: serde_json::json!({"title": title}),
        ..Default::default()
    }
}

/// Insert a listing the way the scrape phase does, via the upsert.
pub async fn insert_test_listing(
    pool: &PgPool,
    platform_id: PlatformId,
    url: &str,
    parsed: &ParsedListing,
) -> Result<Listing> {
    let mut tx = pool.begin().await?;
    let listing = Listing::upsert_from_scrape(&mut tx, platform_id, url, parsed).await?;
    tx.commit().await?;
    Ok(listing)
}

/// Backdate a listing's dedup check so it falls past the resolution window.
pub async fn backdate_dedup_check(
    pool: &PgPool,
    listing: &Listing,
    minutes_ago: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE listings
         SET dedup_checked_at = NOW() - ($2::TEXT || ' minutes')::INTERVAL
         WHERE id = $1",
    )
    .bind(listing.id)
    .bind(minutes_ago)
    .execute(pool)
    .await?;
    Ok(())
}
