//! Pipeline dependencies (using traits for testability)
//!
//! This module provides the central dependency container used by all domain
//! handlers. All external services use trait abstractions to enable testing.

use sqlx::PgPool;
use std::sync::Arc;

use super::jobs::PostgresJobQueue;
use super::traits::{BaseAI, BaseGeocoder, BasePageFetcher};
use crate::config::Config;

/// Dependencies accessible to job handlers and domain operations
#[derive(Clone)]
pub struct PipelineDeps {
    pub db_pool: PgPool,
    /// Rendering proxy for portal pages
    pub fetcher: Arc<dyn BasePageFetcher>,
    /// Address resolution for scraped listings
    pub geocoder: Arc<dyn BaseGeocoder>,
    /// LLM client for property merge synthesis
    pub ai: Arc<dyn BaseAI>,
    /// Queue for background command execution
    pub job_queue: Arc<PostgresJobQueue>,
    pub config: Config,
}

impl PipelineDeps {
    pub fn new(
        db_pool: PgPool,
        fetcher: Arc<dyn BasePageFetcher>,
        geocoder: Arc<dyn BaseGeocoder>,
        ai: Arc<dyn BaseAI>,
        job_queue: Arc<PostgresJobQueue>,
        config: Config,
    ) -> Self {
        Self {
            db_pool,
            fetcher,
            geocoder,
            ai,
            job_queue,
            config,
        }
    }
}
