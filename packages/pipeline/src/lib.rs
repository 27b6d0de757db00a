// Property Listing Consolidation Pipeline - Core
//
// This crate ingests real-estate listings from external platforms, scrapes
// full detail, clusters near-duplicates across platforms, and consolidates
// approved clusters into canonical property records.
//
// Orchestration runs on a database-backed job queue; stage cadence is driven
// by a cron scheduler in kernel/scheduled_tasks.rs.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
