//! Schema migration runner.
//!
//! Applies the SQL migrations the worker also applies at startup; useful for
//! deploy steps that migrate before rolling the new binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use std::collections::HashSet;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Parser)]
#[command(name = "migrate_cli")]
#[command(about = "Run database schema migrations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all pending migrations
    Run,
    /// Show applied and pending migrations
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = dotenvy::dotenv();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Commands::Run => {
            MIGRATOR.run(&pool).await.context("Migration failed")?;
            println!("Migrations applied");
        }
        Commands::Info => {
            let applied: Vec<(i64,)> =
                sqlx::query_as("SELECT version FROM _sqlx_migrations ORDER BY version")
                    .fetch_all(&pool)
                    .await
                    .unwrap_or_default();
            let applied: HashSet<i64> = applied.into_iter().map(|row| row.0).collect();

            for migration in MIGRATOR.iter() {
                let status = if applied.contains(&migration.version) {
                    "applied"
                } else {
                    "pending"
                };
                println!(
                    "{:>4} [{}] {}",
                    migration.version, status, migration.description
                );
            }
        }
    }

    Ok(())
}
