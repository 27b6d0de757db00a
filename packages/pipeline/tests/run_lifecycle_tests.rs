mod common;

use common::fixtures;
use common::harness::TestHarness;
use pipeline_core::domains::scraping::discovery::run_discovery;
use pipeline_core::domains::scraping::models::{DiscoveredListing, ScrapeRun, StartRun};
use pipeline_core::domains::scraping::scraper::scrape_listing;
use pipeline_core::domains::scraping::{orchestrator, DiscoverRunCommand, ScrapeListingCommand};
use pipeline_core::kernel::test_dependencies::{MockAI, MockGeocoder, MockPageFetcher};
use test_context::test_context;

// =============================================================================
// Page fixtures in the vivanuncios markup shape
// =============================================================================

const SEARCH_PAGE_TWO_RESULTS: &str = r##"
<html><body>
    <span class="total-ads">2</span>
    <div class="tileV2">
        <a class="href-link" href="/casa-providencia/1000001">ver</a>
        <span class="tile-title-text">Casa en Providencia</span>
        <span class="ad-price">$2,500,000</span>
        <div class="tile-location">Guadalajara</div>
    </div>
    <div class="tileV2">
        <a class="href-link" href="/casa-americana/1000002">ver</a>
        <span class="tile-title-text">Casa en Americana</span>
        <span class="ad-price">$1,900,000</span>
        <div class="tile-location">Guadalajara</div>
    </div>
    <div class="pagination"><a href="#">1</a></div>
</body></html>
"##;

const SEARCH_PAGE_ONE_RESULT: &str = r##"
<html><body>
    <div class="tileV2">
        <a class="href-link" href="/casa-providencia/1000001">ver</a>
        <span class="tile-title-text">Casa en Providencia</span>
    </div>
    <div class="pagination"><a href="#">1</a></div>
</body></html>
"##;

fn listing_page(title: &str) -> String {
    format!(
        r#"
<html><body>
    <h1 id="vip-ad-title">{}</h1>
    <div id="vip-ad-price"><span class="amount">2,500,000</span></div>
    <div id="vip-ad-description"><div class="description-content">Bonita casa con jardin.</div></div>
    <ul class="attributes">
        <li class="attribute-recamaras"><span class="value">3</span></li>
        <li class="attribute-banos"><span class="value">2</span></li>
        <li class="attribute-metros"><span class="value">180 m2</span></li>
    </ul>
    <div class="vip-location">
        <span class="neighborhood">Providencia</span>
        <span class="city">Guadalajara</span>
        <span class="state">Jalisco</span>
    </div>
</body></html>
"#,
        title
    )
}

struct RunSetup {
    run: ScrapeRun,
}

/// Create platform + query + run, ready for a discovery pass.
async fn setup_run(ctx: &TestHarness) -> RunSetup {
    let platform = fixtures::create_test_platform(&ctx.db_pool, "vivanuncios")
        .await
        .expect("Failed to create platform");
    let query = fixtures::create_test_search_query(
        &ctx.db_pool,
        platform.id,
        "https://www.example.com/casas-en-venta/guadalajara",
    )
    .await
    .expect("Failed to create search query");
    let run = fixtures::start_test_run(&ctx.db_pool, &query)
        .await
        .expect("Failed to start run");
    RunSetup { run }
}

// =============================================================================
// Tests: discovery through scraping to completion
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn test_full_run_discovers_scrapes_and_completes(ctx: &TestHarness) {
    let setup = setup_run(ctx).await;

    // One search page, then one detail page per discovered item.
    let fetcher = MockPageFetcher::new()
        .with_page(SEARCH_PAGE_TWO_RESULTS)
        .with_page(&listing_page("Casa en Providencia"))
        .with_page(&listing_page("Casa en Americana"));
    let deps = ctx.deps_with(fetcher, MockGeocoder::new(), MockAI::new());

    run_discovery(
        DiscoverRunCommand {
            scrape_run_id: setup.run.id,
            batch_id: setup.run.batch_id,
        },
        &deps,
    )
    .await
    .expect("Discovery failed");

    let run = ScrapeRun::find_by_id(setup.run.id, &ctx.db_pool)
        .await
        .expect("Failed to reload run");
    assert_eq!(run.status, "scraping");
    assert_eq!(run.discovered_count, 2);
    assert_eq!(run.pending_items, 2);

    let pending = DiscoveredListing::find_pending_for_batch(setup.run.batch_id, &ctx.db_pool)
        .await
        .expect("Failed to load pending items");
    assert_eq!(pending.len(), 2);

    for item in &pending {
        scrape_listing(
            ScrapeListingCommand {
                discovered_listing_id: item.id,
                scrape_run_id: setup.run.id,
                batch_id: setup.run.batch_id,
            },
            &deps,
        )
        .await
        .expect("Scrape failed");
    }

    let run = ScrapeRun::find_by_id(setup.run.id, &ctx.db_pool)
        .await
        .expect("Failed to reload run");
    assert_eq!(run.status, "completed", "run should complete at zero pending");
    assert_eq!(run.scraped_count, 2);
    assert_eq!(run.pending_items, 0);
    assert!(run.completed_at.is_some());

    let listing_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM listings")
        .fetch_one(&ctx.db_pool)
        .await
        .expect("Failed to count listings");
    assert_eq!(listing_count, 2);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_second_run_for_same_query_is_rejected(ctx: &TestHarness) {
    let platform = fixtures::create_test_platform(&ctx.db_pool, "vivanuncios")
        .await
        .expect("Failed to create platform");
    let query = fixtures::create_test_search_query(
        &ctx.db_pool,
        platform.id,
        "https://www.example.com/casas-en-venta/guadalajara",
    )
    .await
    .expect("Failed to create search query");

    let deps = ctx.deps();
    let first = orchestrator::start_run(query.id, &deps)
        .await
        .expect("First start failed");
    assert!(matches!(first, StartRun::Started(_)));

    let second = orchestrator::start_run(query.id, &deps)
        .await
        .expect("Second start failed");
    match second {
        StartRun::AlreadyActive(run) => assert_eq!(run.status, "pending"),
        StartRun::Started(_) => panic!("second start must not create a run"),
    }

    let active_count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM scrape_runs
         WHERE search_query_id = $1
           AND status IN ('pending', 'discovering', 'scraping')",
    )
    .bind(query.id)
    .fetch_one(&ctx.db_pool)
    .await
    .expect("Failed to count active runs");
    assert_eq!(active_count, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_rediscovery_reuses_the_existing_row(ctx: &TestHarness) {
    let setup = setup_run(ctx).await;

    let fetcher = MockPageFetcher::new()
        .with_page(SEARCH_PAGE_ONE_RESULT)
        .with_page(&listing_page("Casa en Providencia"));
    let deps = ctx.deps_with(fetcher, MockGeocoder::new(), MockAI::new());

    run_discovery(
        DiscoverRunCommand {
            scrape_run_id: setup.run.id,
            batch_id: setup.run.batch_id,
        },
        &deps,
    )
    .await
    .expect("First discovery failed");

    let pending = DiscoveredListing::find_pending_for_batch(setup.run.batch_id, &ctx.db_pool)
        .await
        .expect("Failed to load pending items");
    scrape_listing(
        ScrapeListingCommand {
            discovered_listing_id: pending[0].id,
            scrape_run_id: setup.run.id,
            batch_id: setup.run.batch_id,
        },
        &deps,
    )
    .await
    .expect("Scrape failed");

    // Same query, fresh run, same card on the portal.
    let query = pipeline_core::domains::scraping::models::SearchQuery::find_by_id(
        setup.run.search_query_id,
        &ctx.db_pool,
    )
    .await
    .expect("Failed to reload query");
    let second_run = fixtures::start_test_run(&ctx.db_pool, &query)
        .await
        .expect("Failed to start second run");

    let fetcher = MockPageFetcher::new().with_page(SEARCH_PAGE_ONE_RESULT);
    let deps = ctx.deps_with(fetcher, MockGeocoder::new(), MockAI::new());
    run_discovery(
        DiscoverRunCommand {
            scrape_run_id: second_run.id,
            batch_id: second_run.batch_id,
        },
        &deps,
    )
    .await
    .expect("Second discovery failed");

    // The URL gets one row for its lifetime; re-discovery re-points it.
    let rows = sqlx::query_as::<_, (String, uuid::Uuid)>(
        "SELECT status, batch_id FROM discovered_listings WHERE url = $1",
    )
    .bind("https://www.example.com/casa-providencia/1000001")
    .fetch_all(&ctx.db_pool)
    .await
    .expect("Failed to load discovered rows");
    assert_eq!(rows.len(), 1, "re-discovery must not create a second row");
    assert_eq!(rows[0].0, "pending");
    assert_eq!(rows[0].1, second_run.batch_id);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_gone_listing_is_unavailable_and_never_retried(ctx: &TestHarness) {
    let setup = setup_run(ctx).await;

    let fetcher = MockPageFetcher::new()
        .with_page(SEARCH_PAGE_ONE_RESULT)
        .with_gone(404);
    let deps = ctx.deps_with(fetcher, MockGeocoder::new(), MockAI::new());

    run_discovery(
        DiscoverRunCommand {
            scrape_run_id: setup.run.id,
            batch_id: setup.run.batch_id,
        },
        &deps,
    )
    .await
    .expect("Discovery failed");

    let pending = DiscoveredListing::find_pending_for_batch(setup.run.batch_id, &ctx.db_pool)
        .await
        .expect("Failed to load pending items");
    let outcome = scrape_listing(
        ScrapeListingCommand {
            discovered_listing_id: pending[0].id,
            scrape_run_id: setup.run.id,
            batch_id: setup.run.batch_id,
        },
        &deps,
    )
    .await;
    assert!(outcome.is_ok(), "a gone page is settled, not retried");

    let item = DiscoveredListing::find_by_id(pending[0].id, &ctx.db_pool)
        .await
        .expect("Failed to reload item");
    assert_eq!(item.status, "unavailable");
    assert_eq!(item.attempts, 1, "first sighting settles it");
    assert_eq!(item.error_message.as_deref(), Some("http 404"));

    let run = ScrapeRun::find_by_id(setup.run.id, &ctx.db_pool)
        .await
        .expect("Failed to reload run");
    assert_eq!(run.status, "completed");
    assert_eq!(run.unavailable_count, 1);
    assert_eq!(run.scraped_count, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_transient_failures_are_bounded_by_the_attempt_budget(ctx: &TestHarness) {
    let setup = setup_run(ctx).await;

    let fetcher = MockPageFetcher::new()
        .with_page(SEARCH_PAGE_ONE_RESULT)
        .with_transient("connection reset")
        .with_transient("connection reset")
        .with_transient("connection reset");
    let deps = ctx.deps_with(fetcher, MockGeocoder::new(), MockAI::new());

    run_discovery(
        DiscoverRunCommand {
            scrape_run_id: setup.run.id,
            batch_id: setup.run.batch_id,
        },
        &deps,
    )
    .await
    .expect("Discovery failed");

    let pending = DiscoveredListing::find_pending_for_batch(setup.run.batch_id, &ctx.db_pool)
        .await
        .expect("Failed to load pending items");
    let cmd = ScrapeListingCommand {
        discovered_listing_id: pending[0].id,
        scrape_run_id: setup.run.id,
        batch_id: setup.run.batch_id,
    };

    // Attempts 1 and 2 bubble up as job errors so the queue retries.
    assert!(scrape_listing(cmd.clone(), &deps).await.is_err());
    assert!(scrape_listing(cmd.clone(), &deps).await.is_err());
    // Attempt 3 exhausts the budget and settles the item.
    assert!(scrape_listing(cmd, &deps).await.is_ok());

    let item = DiscoveredListing::find_by_id(pending[0].id, &ctx.db_pool)
        .await
        .expect("Failed to reload item");
    assert_eq!(item.status, "failed");
    assert_eq!(item.attempts, 3);

    let run = ScrapeRun::find_by_id(setup.run.id, &ctx.db_pool)
        .await
        .expect("Failed to reload run");
    assert_eq!(run.status, "completed");
    assert_eq!(run.failed_count, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_aborted_run_discards_queued_discovery(ctx: &TestHarness) {
    let platform = fixtures::create_test_platform(&ctx.db_pool, "vivanuncios")
        .await
        .expect("Failed to create platform");
    let query = fixtures::create_test_search_query(
        &ctx.db_pool,
        platform.id,
        "https://www.example.com/casas-en-venta/guadalajara",
    )
    .await
    .expect("Failed to create search query");

    let deps = ctx.deps();
    let StartRun::Started(run) = orchestrator::start_run(query.id, &deps)
        .await
        .expect("Start failed")
    else {
        panic!("expected a fresh run");
    };

    let aborted = orchestrator::abort_run(run.id, &deps)
        .await
        .expect("Abort failed");
    assert!(aborted);

    let run = ScrapeRun::find_by_id(run.id, &ctx.db_pool)
        .await
        .expect("Failed to reload run");
    assert_eq!(run.status, "failed");
    assert_eq!(run.error_message.as_deref(), Some("aborted by operator"));

    let job_status = sqlx::query_scalar::<_, String>(
        "SELECT status::TEXT FROM jobs WHERE idempotency_key = $1",
    )
    .bind(format!("discover_run:{}", run.id))
    .fetch_one(&ctx.db_pool)
    .await
    .expect("Failed to load discovery job");
    assert_eq!(job_status, "cancelled");

    // A worker that already claimed the job discards it against the run state.
    run_discovery(
        DiscoverRunCommand {
            scrape_run_id: run.id,
            batch_id: run.batch_id,
        },
        &deps,
    )
    .await
    .expect("Discarding discovery failed");
    let discovered = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM discovered_listings WHERE scrape_run_id = $1",
    )
    .bind(run.id)
    .fetch_one(&ctx.db_pool)
    .await
    .expect("Failed to count discovered rows");
    assert_eq!(discovered, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_discovery_failure_fails_the_run(ctx: &TestHarness) {
    let setup = setup_run(ctx).await;

    // Three transient failures exhaust the in-handler page retry budget.
    let fetcher = MockPageFetcher::new()
        .with_transient("proxy timeout")
        .with_transient("proxy timeout")
        .with_transient("proxy timeout");
    let deps = ctx.deps_with(fetcher, MockGeocoder::new(), MockAI::new());

    run_discovery(
        DiscoverRunCommand {
            scrape_run_id: setup.run.id,
            batch_id: setup.run.batch_id,
        },
        &deps,
    )
    .await
    .expect("Discovery handler should settle the run, not error");

    let run = ScrapeRun::find_by_id(setup.run.id, &ctx.db_pool)
        .await
        .expect("Failed to reload run");
    assert_eq!(run.status, "failed");
    assert!(
        run.error_message
            .as_deref()
            .unwrap_or_default()
            .contains("page 1"),
        "failure message should name the page"
    );
}
