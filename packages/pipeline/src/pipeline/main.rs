// Main entry point for the pipeline worker

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use pipeline_core::domains::build_job_registry;
use pipeline_core::kernel::jobs::{JobRunner, PostgresJobQueue};
use pipeline_core::kernel::{
    scheduled_tasks, NominatimGeocoder, OpenAIClient, PipelineDeps, ScrapingBeeFetcher,
};
use pipeline_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pipeline_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Propfusion pipeline worker");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Wire dependencies
    let job_queue = Arc::new(PostgresJobQueue::new(pool.clone()));
    let deps = Arc::new(PipelineDeps::new(
        pool,
        Arc::new(ScrapingBeeFetcher::new(config.scrapingbee_api_key.clone())),
        Arc::new(NominatimGeocoder::new()),
        Arc::new(OpenAIClient::new(config.openai_api_key.clone())),
        job_queue.clone(),
        config,
    ));

    // Cron-driven ticks: due searches, batch stages, stale reclaim
    let mut scheduler = scheduled_tasks::start_scheduler(deps.clone()).await?;

    // Job runner processes the queue until shutdown
    let registry = Arc::new(build_job_registry());
    let runner = JobRunner::new(job_queue, registry, deps);
    let shutdown = runner.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    runner.run().await?;

    scheduler.shutdown().await.ok();
    tracing::info!("Pipeline worker stopped");
    Ok(())
}
