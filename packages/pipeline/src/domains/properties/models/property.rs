use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};

use crate::common::{ListingGroupId, PropertyId};
use crate::domains::listings::models::Listing;

/// Property - the canonical record synthesized from one or more listings.
///
/// Created exactly once per approved group (or per individually resolved
/// listing) by the assembler; the source listings point back at it via
/// property_id and are Completed in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Property {
    pub id: PropertyId,
    /// Group this property was merged from; None for single-listing
    /// resolutions.
    pub listing_group_id: Option<ListingGroupId>,
    pub source_listing_count: i32,

    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub operation_type: Option<String>,
    pub property_type: Option<String>,
    pub property_subtype: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<f64>,
    pub parking_spaces: Option<i32>,
    pub area_built_m2: Option<f64>,
    pub area_lot_m2: Option<f64>,
    pub address: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub amenities: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The merge model's output shape. Every field is optional so a sparse
/// response still parses; missing fields simply stay empty on the property.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub operation_type: Option<String>,
    pub property_type: Option<String>,
    pub property_subtype: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<f64>,
    pub parking_spaces: Option<i32>,
    pub area_built_m2: Option<f64>,
    pub area_lot_m2: Option<f64>,
    pub address: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub amenities: Vec<String>,
}

impl PropertyDraft {
    /// Degenerate one-element merge: a listing that never clustered becomes
    /// a property as-is, no model call involved.
    pub fn from_listing(listing: &Listing) -> Self {
        Self {
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
        }
    }
}

impl Property {
    // =========================================================================
    // SQL Queries - ALL queries for properties must be in this file
    // =========================================================================

    /// Insert a property inside the assembly transaction.
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        draft: &PropertyDraft,
        listing_group_id: Option<ListingGroupId>,
        source_listing_count: i32,
    ) -> Result<Self> {
        let property = sqlx::query_as::<_, Property>(
            r#"
            INSERT INTO properties (
                id, listing_group_id, source_listing_count,
                title, description, price, currency,
                operation_type, property_type, property_subtype,
                bedrooms, bathrooms, parking_spaces,
                area_built_m2, area_lot_m2,
                address, neighborhood, city, state,
                latitude, longitude, amenities
            )
            VALUES (
                $1, $2, $3,
                $4, $5, $6, $7,
                $8, $9, $10,
                $11, $12, $13,
                $14, $15,
                $16, $17, $18, $19,
                $20, $21, $22
            )
            RETURNING *
            "#,
        )
        .bind(PropertyId::new())
        .bind(listing_group_id)
        .bind(source_listing_count)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(&draft.currency)
        .bind(&draft.operation_type)
        .bind(&draft.property_type)
        .bind(&draft.property_subtype)
        .bind(draft.bedrooms)
        .bind(draft.bathrooms)
        .bind(draft.parking_spaces)
        .bind(draft.area_built_m2)
        .bind(draft.area_lot_m2)
        .bind(&draft.address)
        .bind(&draft.neighborhood)
        .bind(&draft.city)
        .bind(&draft.state)
        .bind(draft.latitude)
        .bind(draft.longitude)
        .bind(&draft.amenities)
        .fetch_one(&mut **tx)
        .await?;
        Ok(property)
    }

    pub async fn find_by_id(id: PropertyId, pool: &PgPool) -> Result<Option<Self>> {
        let property = sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(property)
    }

    pub async fn find_recent(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let properties = sqlx::query_as::<_, Property>(
            "SELECT * FROM properties ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(properties)
    }

    pub async fn count(pool: &PgPool) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM properties")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}
