use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub scrapingbee_api_key: String,
    pub openai_api_key: String,

    // Discovery
    pub discovery_page_limit: u32,
    pub discovery_batch_size: usize,

    // Scraping
    pub scrape_max_attempts: i32,

    // Geocoding
    pub geocode_batch_size: i64,

    // Deduplication
    pub dedup_batch_size: i64,
    pub dedup_score_threshold: f64,

    // Property assembly
    pub assembly_batch_size: i64,
    pub single_resolution_minutes: i64,

    // Maintenance
    pub stale_processing_minutes: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            scrapingbee_api_key: env::var("SCRAPINGBEE_API_KEY")
                .context("SCRAPINGBEE_API_KEY must be set")?,
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            discovery_page_limit: parse_var("DISCOVERY_PAGE_LIMIT", "50")?,
            discovery_batch_size: parse_var("DISCOVERY_BATCH_SIZE", "40")?,
            scrape_max_attempts: parse_var("SCRAPE_MAX_ATTEMPTS", "3")?,
            geocode_batch_size: parse_var("GEOCODE_BATCH_SIZE", "25")?,
            dedup_batch_size: parse_var("DEDUP_BATCH_SIZE", "100")?,
            dedup_score_threshold: parse_var("DEDUP_SCORE_THRESHOLD", "0.75")?,
            assembly_batch_size: parse_var("ASSEMBLY_BATCH_SIZE", "20")?,
            single_resolution_minutes: parse_var("SINGLE_RESOLUTION_MINUTES", "60")?,
            stale_processing_minutes: parse_var("STALE_PROCESSING_MINUTES", "15")?,
        })
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("{} must be a valid value: {}", name, e))
}
