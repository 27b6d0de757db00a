//! Test harness with testcontainers for integration testing.
//!
//! One Postgres container is shared across the whole test run. Migrations run
//! once into a template database; every test then gets its own database
//! cloned from that template. Batch handlers claim work globally, so tests
//! must not share a database or they would steal each other's rows.

use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use pipeline_core::kernel::jobs::PostgresJobQueue;
use pipeline_core::kernel::test_dependencies::{MockAI, MockGeocoder, MockPageFetcher};
use pipeline_core::kernel::PipelineDeps;
use pipeline_core::Config;

const TEMPLATE_DB: &str = "propfusion_template";

/// Shared test infrastructure that persists across all tests.
/// The container starts once and the template database is migrated once.
struct SharedTestInfra {
    base_url: String,
    admin_pool: PgPool,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

/// Global shared infrastructure - initialized once, reused by all tests.
static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        // Respect RUST_LOG in test output; try_init() because another thread
        // may have won the race.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16")
            .with_cmd(["-c", "max_connections=200"])
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let base_url = format!("postgresql://postgres:postgres@{}:{}", pg_host, pg_port);

        let admin_pool = PgPool::connect(&format!("{}/postgres", base_url))
            .await
            .context("Failed to connect to Postgres")?;

        sqlx::query(&format!("CREATE DATABASE {}", TEMPLATE_DB))
            .execute(&admin_pool)
            .await
            .context("Failed to create template database")?;

        let template_pool = PgPool::connect(&format!("{}/{}", base_url, TEMPLATE_DB))
            .await
            .context("Failed to connect to template database")?;
        sqlx::migrate!("./migrations")
            .run(&template_pool)
            .await
            .context("Failed to run migrations")?;
        // The template must have no connections while it is being cloned.
        template_pool.close().await;

        Ok(Self {
            base_url,
            admin_pool,
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Test harness backed by a database of its own.
///
/// # Example using test-context
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let deps = ctx.deps();
///     // ... test code
/// }
/// ```
pub struct TestHarness {
    /// Database pool - use this for test fixtures.
    pub db_pool: PgPool,
    pub db_url: String,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        // The per-test database stays behind; the container is discarded at
        // the end of the run anyway.
        self.db_pool.close().await;
    }
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;

        let db_name = format!("test_{}", Uuid::new_v4().simple());
        sqlx::query(&format!(
            "CREATE DATABASE {} TEMPLATE {}",
            db_name, TEMPLATE_DB
        ))
        .execute(&infra.admin_pool)
        .await
        .context("Failed to clone test database from template")?;

        let db_url = format!("{}/{}", infra.base_url, db_name);
        let db_pool = PgPool::connect(&db_url)
            .await
            .context("Failed to connect to test database")?;

        Ok(Self { db_pool, db_url })
    }

    /// Dependency bundle with default mock collaborators.
    pub fn deps(&self) -> Arc<PipelineDeps> {
        self.deps_with(MockPageFetcher::new(), MockGeocoder::new(), MockAI::new())
    }

    /// Dependency bundle with caller-configured mocks. The job queue is real
    /// and writes to this test's database.
    pub fn deps_with(
        &self,
        fetcher: MockPageFetcher,
        geocoder: MockGeocoder,
        ai: MockAI,
    ) -> Arc<PipelineDeps> {
        let job_queue = Arc::new(PostgresJobQueue::new(self.db_pool.clone()));
        Arc::new(PipelineDeps::new(
            self.db_pool.clone(),
            Arc::new(fetcher),
            Arc::new(geocoder),
            Arc::new(ai),
            job_queue,
            self.config(),
        ))
    }

    /// Worker configuration with test-friendly knobs.
    pub fn config(&self) -> Config {
        Config {
            database_url: self.db_url.clone(),
            scrapingbee_api_key: "test-scrapingbee-key".to_string(),
            openai_api_key: "test-openai-key".to_string(),
            discovery_page_limit: 50,
            discovery_batch_size: 40,
            scrape_max_attempts: 3,
            geocode_batch_size: 25,
            dedup_batch_size: 100,
            dedup_score_threshold: 0.75,
            assembly_batch_size: 20,
            single_resolution_minutes: 60,
            stale_processing_minutes: 15,
        }
    }
}
