//! Property assembly from approved groups and resolution-window listings.
//!
//! The batch claims PendingAi groups into ProcessingAi, asks the merge model
//! for one canonical draft per group, and settles group, members, and the
//! new property in a single transaction. A merge failure deliberately leaves
//! the group in ProcessingAi instead of reverting it: the model may have
//! produced partial side effects, and an operator (or the stale reclaim after
//! its window) decides whether to retry.
//!
//! Listings that sat unmatched past the resolution window take the short
//! path: a one-element merge needs no model call, the listing's own fields
//! become the property.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domains::dedup::models::ListingGroup;
use crate::domains::listings::models::Listing;
use crate::domains::properties::commands::AssembleBatchCommand;
use crate::domains::properties::models::{Property, PropertyDraft};
use crate::kernel::PipelineDeps;

/// Job handler for [`AssembleBatchCommand`].
pub async fn run_assembly_batch(_cmd: AssembleBatchCommand, deps: &PipelineDeps) -> Result<()> {
    let merged = assemble_approved_groups(deps).await?;
    let resolved = resolve_single_listings(deps).await?;
    if merged > 0 || resolved > 0 {
        info!(merged, resolved, "assembly pass finished");
    }
    Ok(())
}

async fn assemble_approved_groups(deps: &PipelineDeps) -> Result<usize> {
    let groups = ListingGroup::claim_for_ai(deps.config.assembly_batch_size, &deps.db_pool).await?;
    if groups.is_empty() {
        return Ok(0);
    }

    let mut merged = 0usize;
    for group in &groups {
        match assemble_group(group, deps).await {
            Ok(true) => merged += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(
                    group_id = %group.id,
                    error = %e,
                    "property merge failed, group stays in processing_ai"
                );
            }
        }
    }
    Ok(merged)
}

async fn assemble_group(group: &ListingGroup, deps: &PipelineDeps) -> Result<bool> {
    let members = Listing::find_by_group(group.id, &deps.db_pool).await?;
    if members.is_empty() {
        warn!(group_id = %group.id, "claimed group has no members, leaving for operator");
        return Ok(false);
    }

    let draft = merge_members(&members, deps).await?;

    let mut tx = deps.db_pool.begin().await?;
    let property = Property::create(&mut tx, &draft, Some(group.id), members.len() as i32).await?;
    Listing::complete_group_members(&mut tx, group.id, property.id).await?;
    if !ListingGroup::complete(&mut tx, group.id, property.id).await? {
        // The group left processing_ai while we were merging (stale reclaim
        // plus an operator action). Nothing to settle.
        tx.rollback().await?;
        debug!(group_id = %group.id, "group no longer in processing_ai, skipping");
        return Ok(false);
    }
    tx.commit().await?;

    info!(
        property_id = %property.id,
        group_id = %group.id,
        members = members.len(),
        "property assembled from group"
    );
    Ok(true)
}

async fn resolve_single_listings(deps: &PipelineDeps) -> Result<usize> {
    let listings = Listing::claim_single_resolution_batch(
        deps.config.assembly_batch_size,
        deps.config.single_resolution_minutes,
        &deps.db_pool,
    )
    .await?;
    if listings.is_empty() {
        return Ok(0);
    }

    let mut resolved = 0usize;
    for listing in &listings {
        match resolve_one(listing, deps).await {
            Ok(()) => resolved += 1,
            Err(e) => {
                warn!(
                    listing_id = %listing.id,
                    error = %e,
                    "single-listing resolution failed"
                );
            }
        }
    }
    Ok(resolved)
}

async fn resolve_one(listing: &Listing, deps: &PipelineDeps) -> Result<()> {
    let draft = PropertyDraft::from_listing(listing);

    let mut tx = deps.db_pool.begin().await?;
    let property = Property::create(&mut tx, &draft, None, 1).await?;
    Listing::complete_with_property(&mut tx, listing.id, property.id, true).await?;
    tx.commit().await?;

    debug!(
        property_id = %property.id,
        listing_id = %listing.id,
        "property created from single listing"
    );
    Ok(())
}

/// Member listing projected to the fields the merge model needs.
#[derive(Debug, Clone, Serialize)]
struct ListingForMerge {
    url: String,
    title: Option<String>,
    description: Option<String>,
    price: Option<f64>,
    currency: Option<String>,
    operation_type: Option<String>,
    property_type: Option<String>,
    property_subtype: Option<String>,
    bedrooms: Option<i32>,
    bathrooms: Option<f64>,
    parking_spaces: Option<i32>,
    area_built_m2: Option<f64>,
    area_lot_m2: Option<f64>,
    address: Option<String>,
    neighborhood: Option<String>,
    city: Option<String>,
    state: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    amenities: Vec<String>,
    is_primary: bool,
}

impl From<&Listing> for ListingForMerge {
    fn from(listing: &Listing) -> Self {
        Self {
            url: listing.url.clone(),
            title: listing.title.clone(),
            description: listing.description.clone(),
            price: listing.price,
            currency: listing.currency.clone(),
            operation_type: listing.operation_type.clone(),
            property_type: listing.property_type.clone(),
            property_subtype: listing.property_subtype.clone(),
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            parking_spaces: listing.parking_spaces,
            area_built_m2: listing.area_built_m2,
            area_lot_m2: listing.area_lot_m2,
            address: listing.address.clone(),
            neighborhood: listing.neighborhood.clone(),
            city: listing.city.clone(),
            state: listing.state.clone(),
            latitude: listing.latitude,
            longitude: listing.longitude,
            amenities: listing.amenities.clone(),
            is_primary: listing.is_primary,
        }
    }
}

async fn merge_members(members: &[Listing], deps: &PipelineDeps) -> Result<PropertyDraft> {
    let projections: Vec<ListingForMerge> = members.iter().map(ListingForMerge::from).collect();
    let listings_json =
        serde_json::to_string_pretty(&projections).context("Failed to serialize member listings")?;

    let prompt = format!(
        "{}\n\n## Listings\n\n{}\n\n{}",
        MERGE_PROMPT, listings_json, MERGE_SCHEMA
    );

    let response = deps
        .ai
        .complete_json(&prompt)
        .await
        .context("Merge model call failed")?;

    let draft: PropertyDraft = serde_json::from_str(extract_json(&response))
        .context("Merge response was not valid property JSON")?;
    Ok(draft)
}

/// Strip a markdown code fence if the model wrapped its JSON in one.
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

const MERGE_PROMPT: &str = r#"You are consolidating real-estate listings that describe the same physical property on different portals into one canonical record.

## Rules

- Prefer values from the listing marked is_primary when sources conflict.
- Prefer the most specific value otherwise: a full street address over a neighborhood, a precise area over a rounded one.
- Write ONE clean Spanish description summarizing the property; do not concatenate the source descriptions.
- price: when prices differ in the same currency, use the lowest current asking price.
- amenities: the union of all mentioned amenities, deduplicated.
- Use null for anything no listing states. Never invent data."#;

const MERGE_SCHEMA: &str = r#"## Response Format

Return ONLY a JSON object, no prose:
{
  "title": "string or null",
  "description": "string or null",
  "price": 0.0,
  "currency": "string or null",
  "operation_type": "string or null",
  "property_type": "string or null",
  "property_subtype": "string or null",
  "bedrooms": 0,
  "bathrooms": 0.0,
  "parking_spaces": 0,
  "area_built_m2": 0.0,
  "area_lot_m2": 0.0,
  "address": "string or null",
  "neighborhood": "string or null",
  "city": "string or null",
  "state": "string or null",
  "latitude": 0.0,
  "longitude": 0.0,
  "amenities": ["string"]
}"#;
