//! Operator CLI for the Propfusion pipeline.
//!
//! Everything an operator does by hand goes through here: registering
//! platforms and search queries, starting and aborting runs, working the
//! duplicate review queue, and reclaiming stuck work. Review decisions only
//! touch the database; the worker picks up the consequences on its next poll.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use pipeline_core::common::{ListingGroupId, ListingId, PlatformId, ScrapeRunId, SearchQueryId};
use pipeline_core::domains::dedup::review::{self, RemoveOutcome};
use pipeline_core::domains::dedup::ListingGroup;
use pipeline_core::domains::listings::models::Listing;
use pipeline_core::domains::platforms;
use pipeline_core::domains::properties::models::Property;
use pipeline_core::domains::scraping::models::{Platform, ScrapeRun, SearchQuery, StartRun};
use pipeline_core::domains::scraping::{orchestrator, scraper};
use pipeline_core::kernel::jobs::PostgresJobQueue;
use pipeline_core::kernel::{
    NominatimGeocoder, OpenAIClient, PipelineDeps, ScrapingBeeFetcher,
};
use pipeline_core::Config;

#[derive(Parser)]
#[command(name = "ops_cli")]
#[command(about = "Operate the Propfusion pipeline: platforms, runs, and review")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a platform (the code must have a shipped adapter)
    AddPlatform {
        code: String,
        name: String,
        base_url: String,
    },
    /// Add a search query to a platform
    AddQuery {
        /// Platform code the query belongs to
        platform: String,
        name: String,
        url: String,
        /// Re-run cadence; omit for manually-triggered queries
        #[arg(long)]
        interval_minutes: Option<i32>,
    },
    /// List search queries and their schedules
    ListQueries,
    /// Start a scrape run for a search query
    StartRun { search_query_id: SearchQueryId },
    /// Abort an active run
    AbortRun { scrape_run_id: ScrapeRunId },
    /// Show recent runs, or one run in detail
    RunStatus {
        #[arg(long)]
        id: Option<ScrapeRunId>,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// List duplicate groups waiting for review, highest score first
    ListReviews {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show the next group to review, with its member listings
    NextReview,
    /// Approve a group for consolidation
    Approve { group_id: ListingGroupId },
    /// Reject a group and release its members
    Reject { group_id: ListingGroupId, reason: String },
    /// Send a stuck or failed group back to the consolidation queue
    RetryAi { group_id: ListingGroupId },
    /// Remove one listing from a group
    RemoveListing {
        group_id: ListingGroupId,
        listing_id: ListingId,
    },
    /// Release work stuck in processing states past the staleness window
    ReclaimStale,
    /// Pipeline counters by stage
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::AddPlatform {
            code,
            name,
            base_url,
        } => {
            let pool = connect_db().await?;
            if platforms::adapter_for(&code).is_none() {
                let known: Vec<&str> = platforms::all_adapters().iter().map(|a| a.code).collect();
                bail!(
                    "no adapter is shipped for '{}'; available codes: {}",
                    code,
                    known.join(", ")
                );
            }
            if Platform::find_by_code(&code, &pool).await?.is_some() {
                bail!("platform '{}' already exists", code);
            }
            let platform = Platform::create(&code, &name, &base_url, &pool).await?;
            println!("Created platform {} ({})", platform.code, platform.id);
        }

        Commands::AddQuery {
            platform,
            name,
            url,
            interval_minutes,
        } => {
            let pool = connect_db().await?;
            let Some(platform) = Platform::find_by_code(&platform, &pool).await? else {
                bail!("no platform with code '{}'; run add-platform first", platform);
            };
            let query =
                SearchQuery::create(platform.id, &name, &url, interval_minutes, &pool).await?;
            match query.interval_minutes {
                Some(minutes) => println!(
                    "Created search query {} ({}), runs every {} minutes",
                    query.name, query.id, minutes
                ),
                None => println!(
                    "Created search query {} ({}), start it with start-run",
                    query.name, query.id
                ),
            }
        }

        Commands::ListQueries => {
            let pool = connect_db().await?;
            let queries = SearchQuery::find_all(&pool).await?;
            if queries.is_empty() {
                println!("No search queries configured");
                return Ok(());
            }
            let platform_codes = platform_code_index(&pool).await?;
            println!(
                "{:<38} {:<16} {:<8} {:<10} {:<22} NAME",
                "ID", "PLATFORM", "ACTIVE", "INTERVAL", "NEXT RUN"
            );
            for query in queries {
                let code = platform_codes
                    .get(&query.platform_id)
                    .map(String::as_str)
                    .unwrap_or("?");
                let interval = query
                    .interval_minutes
                    .map(|m| format!("{}m", m))
                    .unwrap_or_else(|| "manual".to_string());
                let next_run = query
                    .next_run_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "{:<38} {:<16} {:<8} {:<10} {:<22} {}",
                    query.id, code, query.active, interval, next_run, query.name
                );
            }
        }

        Commands::StartRun { search_query_id } => {
            let deps = build_deps().await?;
            match orchestrator::start_run(search_query_id, &deps).await? {
                StartRun::Started(run) => {
                    println!("Started run {} (batch {})", run.id, run.batch_id);
                }
                StartRun::AlreadyActive(run) => {
                    bail!(
                        "search query {} already has an active run ({}, status {})",
                        search_query_id,
                        run.id,
                        run.status
                    );
                }
            }
        }

        Commands::AbortRun { scrape_run_id } => {
            let deps = build_deps().await?;
            if orchestrator::abort_run(scrape_run_id, &deps).await? {
                println!("Aborted run {}", scrape_run_id);
            } else {
                bail!("run {} is not active", scrape_run_id);
            }
        }

        Commands::RunStatus { id, limit } => {
            let pool = connect_db().await?;
            match id {
                Some(id) => {
                    let run = ScrapeRun::find_by_id(id, &pool).await?;
                    print_run_detail(&run);
                }
                None => {
                    let runs = ScrapeRun::find_recent(limit, &pool).await?;
                    if runs.is_empty() {
                        println!("No runs yet");
                        return Ok(());
                    }
                    println!(
                        "{:<38} {:<12} {:>5} {:>5} {:>4} {:>6} {:>7}  STARTED",
                        "ID", "STATUS", "DISC", "DONE", "FAIL", "UNAVL", "PENDING"
                    );
                    for run in runs {
                        let started = run
                            .started_at
                            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                            .unwrap_or_default();
                        println!(
                            "{:<38} {:<12} {:>5} {:>5} {:>4} {:>6} {:>7}  {}",
                            run.id,
                            run.status,
                            run.discovered_count,
                            run.scraped_count,
                            run.failed_count,
                            run.unavailable_count,
                            run.pending_items,
                            started
                        );
                    }
                }
            }
        }

        Commands::ListReviews { limit } => {
            let pool = connect_db().await?;
            let groups = ListingGroup::find_pending_review(limit, &pool).await?;
            if groups.is_empty() {
                println!("Review queue is empty");
                return Ok(());
            }
            println!("{:<38} {:>6} {:<20} CREATED", "ID", "SCORE", "CITY");
            for group in groups {
                println!(
                    "{:<38} {:>6.2} {:<20} {}",
                    group.id,
                    group.score,
                    group.city.as_deref().unwrap_or(""),
                    group.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }

        Commands::NextReview => {
            let pool = connect_db().await?;
            let Some((group, members)) = review::next_group_for_review(None, &pool).await? else {
                println!("Review queue is empty");
                return Ok(());
            };
            let platform_codes = platform_code_index(&pool).await?;
            println!(
                "Group {}  score {:.2}  city {}  created {}",
                group.id,
                group.score,
                group.city.as_deref().unwrap_or("(unknown)"),
                group.created_at.format("%Y-%m-%d %H:%M")
            );
            println!();
            for listing in &members {
                print_member(listing, &platform_codes);
            }
            println!(
                "approve {id} | reject {id} <reason> | remove-listing {id} <listing>",
                id = group.id
            );
        }

        Commands::Approve { group_id } => {
            let pool = connect_db().await?;
            match review::approve_group(group_id, &pool).await? {
                Some(group) => println!("Approved group {}, queued for consolidation", group.id),
                None => bail!("group {} is not awaiting review", group_id),
            }
        }

        Commands::Reject { group_id, reason } => {
            let pool = connect_db().await?;
            if review::reject_group(group_id, &reason, &pool).await? {
                println!("Rejected group {}, members released", group_id);
            } else {
                bail!("group {} cannot be rejected in its current status", group_id);
            }
        }

        Commands::RetryAi { group_id } => {
            let pool = connect_db().await?;
            match review::retry_ai(group_id, &pool).await? {
                Some(group) => println!("Group {} queued for consolidation again", group.id),
                None => bail!("group {} is not in an AI state", group_id),
            }
        }

        Commands::RemoveListing {
            group_id,
            listing_id,
        } => {
            let pool = connect_db().await?;
            match review::remove_listing(group_id, listing_id, &pool).await? {
                RemoveOutcome::Removed { new_primary } => {
                    println!("Removed listing {} from group {}", listing_id, group_id);
                    if let Some(primary) = new_primary {
                        println!("Primary reassigned to {}", primary);
                    }
                }
                RemoveOutcome::Dissolved => {
                    println!(
                        "Removed listing {}; group {} dissolved, remaining member released",
                        listing_id, group_id
                    );
                }
            }
        }

        Commands::ReclaimStale => {
            let deps = build_deps().await?;
            let minutes = deps.config.stale_processing_minutes;
            let failed_items = scraper::fail_stale_items(&deps).await?;
            let listings = Listing::reclaim_stale_processing(minutes, &deps.db_pool).await?;
            let groups =
                ListingGroup::reclaim_stale_processing_ai(minutes, &deps.db_pool).await?;
            println!(
                "Reclaimed after {}m: {} scrape items failed, {} listings released, {} groups re-queued",
                minutes, failed_items, listings, groups
            );
        }

        Commands::Stats => {
            let pool = connect_db().await?;
            println!("Listings:");
            for (status, count) in Listing::count_by_status(&pool).await? {
                println!("  {:<16} {}", status, count);
            }
            println!("Listing groups:");
            for (status, count) in ListingGroup::count_by_status(&pool).await? {
                println!("  {:<16} {}", status, count);
            }
            println!("Properties:");
            println!("  {:<16} {}", "total", Property::count(&pool).await?);
        }
    }

    Ok(())
}

/// Review and reporting commands only need the database, so they read
/// DATABASE_URL directly instead of requiring the full worker environment.
async fn connect_db() -> Result<PgPool> {
    dotenvy::dotenv().ok();
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    PgPoolOptions::new()
        .max_connections(4)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")
}

/// Run control and reclaim go through the same dependency bundle the worker
/// uses, so they need the full environment (API keys included).
async fn build_deps() -> Result<Arc<PipelineDeps>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration")?;
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let job_queue = Arc::new(PostgresJobQueue::new(pool.clone()));
    Ok(Arc::new(PipelineDeps::new(
        pool,
        Arc::new(ScrapingBeeFetcher::new(config.scrapingbee_api_key.clone())),
        Arc::new(NominatimGeocoder::new()),
        Arc::new(OpenAIClient::new(config.openai_api_key.clone())),
        job_queue,
        config,
    )))
}

async fn platform_code_index(pool: &PgPool) -> Result<HashMap<PlatformId, String>> {
    Ok(Platform::find_all(pool)
        .await?
        .into_iter()
        .map(|p| (p.id, p.code))
        .collect())
}

fn print_run_detail(run: &ScrapeRun) {
    println!("Run {}", run.id);
    println!("  search query   {}", run.search_query_id);
    println!("  batch          {}", run.batch_id);
    println!("  status         {}", run.status);
    println!("  discovered     {}", run.discovered_count);
    println!("  scraped        {}", run.scraped_count);
    println!("  failed         {}", run.failed_count);
    println!("  unavailable    {}", run.unavailable_count);
    println!("  pending items  {}", run.pending_items);
    if let Some(error) = &run.error_message {
        println!("  error          {}", error);
    }
    if let Some(started) = run.started_at {
        println!("  started        {}", started.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(completed) = run.completed_at {
        println!("  completed      {}", completed.format("%Y-%m-%d %H:%M:%S"));
    }
}

fn print_member(listing: &Listing, platform_codes: &HashMap<PlatformId, String>) {
    let marker = if listing.is_primary { "*" } else { " " };
    let code = platform_codes
        .get(&listing.platform_id)
        .map(String::as_str)
        .unwrap_or("?");
    let price = match (listing.price, listing.currency.as_deref()) {
        (Some(price), Some(currency)) => format!("{} {:.0}", currency, price),
        (Some(price), None) => format!("{:.0}", price),
        _ => "no price".to_string(),
    };
    let beds = listing
        .bedrooms
        .map(|b| format!("{}bd", b))
        .unwrap_or_default();
    let baths = listing
        .bathrooms
        .map(|b| format!("{}ba", b))
        .unwrap_or_default();
    let area = listing
        .area_built_m2
        .map(|a| format!("{:.0}m2", a))
        .unwrap_or_default();
    let location = [listing.neighborhood.as_deref(), listing.city.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");

    println!("{} {}  [{}]", marker, listing.id, code);
    println!(
        "    {}  {} {} {}  {}",
        price, beds, baths, area, location
    );
    if let Some(title) = &listing.title {
        println!("    {}", truncate(title, 90));
    }
    println!("    {}", listing.url);
    println!();
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}
