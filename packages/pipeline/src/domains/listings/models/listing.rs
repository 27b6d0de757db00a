use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};

use crate::common::{ListingGroupId, ListingId, PlatformId, PropertyId};
use crate::domains::platforms::ParsedListing;

/// Listing - full scraped detail for one (platform, url), unique on that
/// pair just like its DiscoveredListing counterpart.
///
/// The status column tracks the dedup lifecycle, not the scrape: a listing is
/// born Pending, claimed into Processing by a dedup or assembly batch, parked
/// as Grouped while its cluster sits in review, and Completed once a Property
/// consumed it. Failed is reserved for operator intervention.
///
/// A re-scrape always refreshes the content fields; it resets the dedup
/// lifecycle only when the listing has not been grouped or consumed yet and
/// the content hash actually changed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Listing {
    pub id: ListingId,
    pub platform_id: PlatformId,
    pub url: String,
    pub external_id: Option<String>,
    pub status: String, // 'pending', 'processing', 'grouped', 'completed', 'failed'
    pub listing_group_id: Option<ListingGroupId>,
    /// Representative member of its group (or of its single-listing property).
    pub is_primary: bool,
    pub property_id: Option<PropertyId>,

    // Normalized content
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
    pub image_urls: Vec<String>,
    pub publisher_name: Option<String>,
    pub publisher_type: Option<String>,
    /// Raw extracted fields as the page declared them.
    pub raw: serde_json::Value,

    pub content_hash: String,
    /// Set after a geocode attempt, successful or not.
    pub geocoded_at: Option<DateTime<Utc>>,
    /// Set when a dedup pass evaluated this listing, matched or not.
    pub dedup_checked_at: Option<DateTime<Utc>>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub first_scraped_at: DateTime<Utc>,
    pub last_scraped_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Dedup status enum
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DedupStatus {
    Pending,
    Processing,
    Grouped,
    Completed,
    Failed,
}

impl std::fmt::Display for DedupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DedupStatus::Pending => write!(f, "pending"),
            DedupStatus::Processing => write!(f, "processing"),
            DedupStatus::Grouped => write!(f, "grouped"),
            DedupStatus::Completed => write!(f, "completed"),
            DedupStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DedupStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(DedupStatus::Pending),
            "processing" => Ok(DedupStatus::Processing),
            "grouped" => Ok(DedupStatus::Grouped),
            "completed" => Ok(DedupStatus::Completed),
            "failed" => Ok(DedupStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid dedup status: {}", s)),
        }
    }
}

impl Listing {
    /// How many normalized fields carry a value. Used to pick the most
    /// complete member of a cluster as primary.
    pub fn completeness(&self) -> usize {
        let present = [
            self.title.is_some(),
            self.description.is_some(),
            self.price.is_some(),
            self.currency.is_some(),
            self.operation_type.is_some(),
            self.property_type.is_some(),
            self.property_subtype.is_some(),
            self.bedrooms.is_some(),
            self.bathrooms.is_some(),
            self.parking_spaces.is_some(),
            self.area_built_m2.is_some(),
            self.area_lot_m2.is_some(),
            self.address.is_some(),
            self.neighborhood.is_some(),
            self.city.is_some(),
            self.state.is_some(),
            self.latitude.is_some(),
            self.longitude.is_some(),
            self.publisher_name.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count();

        present + usize::from(!self.amenities.is_empty()) + usize::from(!self.image_urls.is_empty())
    }

    // =========================================================================
    // SQL Queries - ALL queries for listings must be in this file
    // =========================================================================

    /// Upsert the scrape result for one (platform, url).
    ///
    /// Content fields take the fresh scrape wholesale; coordinates and the
    /// external id keep their old value when the new scrape lacks one. The
    /// dedup lifecycle resets to Pending only for unconsumed listings whose
    /// content hash changed; Grouped and Completed listings keep their state.
    pub async fn upsert_from_scrape(
        tx: &mut Transaction<'_, Postgres>,
        platform_id: PlatformId,
        url: &str,
        parsed: &ParsedListing,
    ) -> Result<Self> {
        let listing = sqlx::query_as::<_, Listing>(
            r#"
            INSERT INTO listings (
                id, platform_id, url, external_id, status,
                title, description, price, currency, operation_type,
                property_type, property_subtype, bedrooms, bathrooms, parking_spaces,
                area_built_m2, area_lot_m2, address, neighborhood, city, state,
                latitude, longitude, amenities, image_urls,
                publisher_name, publisher_type, raw, content_hash,
                first_scraped_at, last_scraped_at
            )
            VALUES (
                $1, $2, $3, $4, 'pending',
                $5, $6, $7, $8, $9,
                $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20,
                $21, $22, $23, $24,
                $25, $26, $27, $28,
                NOW(), NOW()
            )
            ON CONFLICT (platform_id, url) DO UPDATE SET
                external_id = COALESCE(EXCLUDED.external_id, listings.external_id),
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                currency = EXCLUDED.currency,
                operation_type = EXCLUDED.operation_type,
                property_type = EXCLUDED.property_type,
                property_subtype = EXCLUDED.property_subtype,
                bedrooms = EXCLUDED.bedrooms,
                bathrooms = EXCLUDED.bathrooms,
                parking_spaces = EXCLUDED.parking_spaces,
                area_built_m2 = EXCLUDED.area_built_m2,
                area_lot_m2 = EXCLUDED.area_lot_m2,
                address = EXCLUDED.address,
                neighborhood = EXCLUDED.neighborhood,
                city = EXCLUDED.city,
                state = EXCLUDED.state,
                latitude = COALESCE(EXCLUDED.latitude, listings.latitude),
                longitude = COALESCE(EXCLUDED.longitude, listings.longitude),
                amenities = EXCLUDED.amenities,
                image_urls = EXCLUDED.image_urls,
                publisher_name = EXCLUDED.publisher_name,
                publisher_type = EXCLUDED.publisher_type,
                raw = EXCLUDED.raw,
                status = CASE
                    WHEN listings.status IN ('pending', 'processing', 'failed')
                         AND listings.content_hash IS DISTINCT FROM EXCLUDED.content_hash
                    THEN 'pending'
                    ELSE listings.status
                END,
                dedup_checked_at = CASE
                    WHEN listings.status IN ('pending', 'processing', 'failed')
                         AND listings.content_hash IS DISTINCT FROM EXCLUDED.content_hash
                    THEN NULL
                    ELSE listings.dedup_checked_at
                END,
                content_hash = EXCLUDED.content_hash,
                last_scraped_at = NOW(),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(ListingId::new())
        .bind(platform_id)
        .bind(url)
        .bind(&parsed.external_id)
        .bind(&parsed.title)
        .bind(&parsed.description)
        .bind(parsed.price)
        .bind(&parsed.currency)
        .bind(&parsed.operation_type)
        .bind(&parsed.property_type)
        .bind(&parsed.property_subtype)
        .bind(parsed.bedrooms)
        .bind(parsed.bathrooms)
        .bind(parsed.parking_spaces)
        .bind(parsed.area_built_m2)
        .bind(parsed.area_lot_m2)
        .bind(&parsed.address)
        .bind(&parsed.neighborhood)
        .bind(&parsed.city)
        .bind(&parsed.state)
        .bind(parsed.latitude)
        .bind(parsed.longitude)
        .bind(&parsed.amenities)
        .bind(&parsed.image_urls)
        .bind(&parsed.publisher_name)
        .bind(&parsed.publisher_type)
        .bind(&parsed.raw)
        .bind(parsed.content_digest())
        .fetch_one(&mut **tx)
        .await?;
        Ok(listing)
    }

    pub async fn find_by_id(id: ListingId, pool: &PgPool) -> Result<Self> {
        let listing = sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(listing)
    }

    pub async fn find_by_group(group_id: ListingGroupId, pool: &PgPool) -> Result<Vec<Self>> {
        let listings = sqlx::query_as::<_, Listing>(
            r#"
            SELECT * FROM listings
            WHERE listing_group_id = $1
            ORDER BY is_primary DESC, created_at
            "#,
        )
        .bind(group_id)
        .fetch_all(pool)
        .await?;
        Ok(listings)
    }

    /// Lock and load a group's members for a transactional group mutation.
    pub async fn find_by_group_for_update(
        tx: &mut Transaction<'_, Postgres>,
        group_id: ListingGroupId,
    ) -> Result<Vec<Self>> {
        let listings = sqlx::query_as::<_, Listing>(
            r#"
            SELECT * FROM listings
            WHERE listing_group_id = $1
            ORDER BY is_primary DESC, created_at
            FOR UPDATE
            "#,
        )
        .bind(group_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(listings)
    }

    // -------------------------------------------------------------------------
    // Geocoding stage
    // -------------------------------------------------------------------------

    /// Listings awaiting a geocode attempt. Listings that came with page
    /// coordinates or have no address text at all are never picked.
    pub async fn find_geocode_batch(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let listings = sqlx::query_as::<_, Listing>(
            r#"
            SELECT * FROM listings
            WHERE latitude IS NULL
              AND geocoded_at IS NULL
              AND (address IS NOT NULL OR neighborhood IS NOT NULL)
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(listings)
    }

    pub async fn mark_geocoded(
        id: ListingId,
        latitude: f64,
        longitude: f64,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE listings
            SET latitude = $2, longitude = $3, geocoded_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(latitude)
        .bind(longitude)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failed geocode attempt so the batch never re-picks the row.
    pub async fn mark_geocode_attempted(id: ListingId, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE listings SET geocoded_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Dedup stage
    // -------------------------------------------------------------------------

    /// Claim the next batch of never-checked listings for a dedup pass.
    pub async fn claim_dedup_batch(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let listings = sqlx::query_as::<_, Listing>(
            r#"
            UPDATE listings
            SET status = 'processing', processing_started_at = NOW(), updated_at = NOW()
            WHERE id IN (
                SELECT id FROM listings
                WHERE status = 'pending'
                  AND listing_group_id IS NULL
                  AND property_id IS NULL
                  AND dedup_checked_at IS NULL
                ORDER BY created_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(listings)
    }

    /// Ungrouped, unconsumed listings in the given cities - the comparison
    /// partners for a claimed batch. Cities are matched case-insensitively;
    /// pass them lowercased. Pass `include_missing_city` when the batch
    /// itself contains listings without a city.
    pub async fn find_dedup_pool(
        cities: &[String],
        include_missing_city: bool,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let listings = sqlx::query_as::<_, Listing>(
            r#"
            SELECT * FROM listings
            WHERE listing_group_id IS NULL
              AND property_id IS NULL
              AND status IN ('pending', 'processing')
              AND (LOWER(TRIM(city)) = ANY($1) OR ($2 AND city IS NULL))
            ORDER BY created_at
            "#,
        )
        .bind(cities)
        .bind(include_missing_city)
        .fetch_all(pool)
        .await?;
        Ok(listings)
    }

    /// Lock prospective cluster members and re-check they are still free.
    ///
    /// Between scoring and grouping, a pool partner can be consumed by the
    /// single-listing resolution pass. Grouping only proceeds when every
    /// member survives this check.
    pub async fn lock_for_grouping(
        tx: &mut Transaction<'_, Postgres>,
        ids: &[ListingId],
    ) -> Result<Vec<ListingId>> {
        let ids = sqlx::query_scalar::<_, ListingId>(
            r#"
            SELECT id FROM listings
            WHERE id = ANY($1)
              AND listing_group_id IS NULL
              AND property_id IS NULL
              AND status IN ('pending', 'processing')
            FOR UPDATE
            "#,
        )
        .bind(ids)
        .fetch_all(&mut **tx)
        .await?;
        Ok(ids)
    }

    /// Attach a listing to its cluster.
    pub async fn set_group(
        tx: &mut Transaction<'_, Postgres>,
        id: ListingId,
        group_id: ListingGroupId,
        is_primary: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE listings
            SET listing_group_id = $2,
                is_primary = $3,
                status = 'grouped',
                dedup_checked_at = NOW(),
                processing_started_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(group_id)
        .bind(is_primary)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Return every member of a group to the pool as independent listings.
    ///
    /// dedup_checked_at stays set: members of a rejected or dissolved group
    /// only re-cluster when a newly arrived listing bridges them, which keeps
    /// a rejected pairing from re-forming on the next pass by itself.
    pub async fn ungroup_all_for_group(
        tx: &mut Transaction<'_, Postgres>,
        group_id: ListingGroupId,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET listing_group_id = NULL,
                is_primary = FALSE,
                status = 'pending',
                dedup_checked_at = NOW(),
                updated_at = NOW()
            WHERE listing_group_id = $1
            "#,
        )
        .bind(group_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// Detach one listing from its group. Returns false when the listing was
    /// not a member.
    pub async fn ungroup_one(
        tx: &mut Transaction<'_, Postgres>,
        id: ListingId,
        group_id: ListingGroupId,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET listing_group_id = NULL,
                is_primary = FALSE,
                status = 'pending',
                dedup_checked_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND listing_group_id = $2
            "#,
        )
        .bind(id)
        .bind(group_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_primary(
        tx: &mut Transaction<'_, Postgres>,
        id: ListingId,
        is_primary: bool,
    ) -> Result<()> {
        sqlx::query("UPDATE listings SET is_primary = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(is_primary)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Release claimed listings that found no cluster, stamping the check so
    /// only new content (or a new bridging listing) re-evaluates them.
    pub async fn mark_dedup_checked(ids: &[ListingId], pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET status = 'pending',
                dedup_checked_at = NOW(),
                processing_started_at = NULL,
                updated_at = NOW()
            WHERE id = ANY($1) AND status = 'processing'
            "#,
        )
        .bind(ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    // -------------------------------------------------------------------------
    // Assembly stage
    // -------------------------------------------------------------------------

    /// Claim listings that stayed unmatched past the resolution window; each
    /// becomes its own single-listing property.
    pub async fn claim_single_resolution_batch(
        limit: i64,
        window_minutes: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let listings = sqlx::query_as::<_, Listing>(
            r#"
            UPDATE listings
            SET status = 'processing', processing_started_at = NOW(), updated_at = NOW()
            WHERE id IN (
                SELECT id FROM listings
                WHERE status = 'pending'
                  AND listing_group_id IS NULL
                  AND property_id IS NULL
                  AND dedup_checked_at < NOW() - ($2::TEXT || ' minutes')::INTERVAL
                ORDER BY dedup_checked_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(limit)
        .bind(window_minutes)
        .fetch_all(pool)
        .await?;
        Ok(listings)
    }

    /// Settle one listing against its freshly created property.
    pub async fn complete_with_property(
        tx: &mut Transaction<'_, Postgres>,
        id: ListingId,
        property_id: PropertyId,
        is_primary: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE listings
            SET status = 'completed',
                property_id = $2,
                is_primary = $3,
                processing_started_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(property_id)
        .bind(is_primary)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Settle every member of a merged group against the new property.
    pub async fn complete_group_members(
        tx: &mut Transaction<'_, Postgres>,
        group_id: ListingGroupId,
        property_id: PropertyId,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET status = 'completed',
                property_id = $2,
                processing_started_at = NULL,
                updated_at = NOW()
            WHERE listing_group_id = $1
            "#,
        )
        .bind(group_id)
        .bind(property_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Return listings stuck in Processing past the window to Pending.
    pub async fn reclaim_stale_processing(minutes: i64, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET status = 'pending', processing_started_at = NULL, updated_at = NOW()
            WHERE status = 'processing'
              AND processing_started_at < NOW() - ($1::TEXT || ' minutes')::INTERVAL
            "#,
        )
        .bind(minutes)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Status breakdown across all listings, for operator stats.
    pub async fn count_by_status(pool: &PgPool) -> Result<Vec<(String, i64)>> {
        let counts = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM listings GROUP BY status ORDER BY status",
        )
        .fetch_all(pool)
        .await?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn bare_listing() -> Listing {
        Listing {
            id: ListingId::new(),
            platform_id: PlatformId::new(),
            url: "https://example.com/casa/1".to_string(),
            external_id: None,
            status: "pending".to_string(),
            listing_group_id: None,
            is_primary: false,
            property_id: None,
            title: None,
            description: None,
            price: None,
            currency: None,
            operation_type: None,
            property_type: None,
            property_subtype: None,
            bedrooms: None,
            bathrooms: None,
            parking_spaces: None,
            area_built_m2: None,
            area_lot_m2: None,
            address: None,
            neighborhood: None,
            city: None,
            state: None,
            latitude: None,
            longitude: None,
            amenities: vec![],
            image_urls: vec![],
            publisher_name: None,
            publisher_type: None,
            raw: serde_json::Value::Null,
            content_hash: String::new(),
            geocoded_at: None,
            dedup_checked_at: None,
            processing_started_at: None,
            first_scraped_at: Utc::now(),
            last_scraped_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_dedup_status_roundtrip() {
        for status in [
            DedupStatus::Pending,
            DedupStatus::Processing,
            DedupStatus::Grouped,
            DedupStatus::Completed,
            DedupStatus::Failed,
        ] {
            let s = status.to_string();
            assert_eq!(DedupStatus::from_str(&s).unwrap(), status);
        }
    }

    #[test]
    fn test_completeness_counts_populated_fields() {
        let empty = bare_listing();
        assert_eq!(empty.completeness(), 0);

        let mut richer = bare_listing();
        richer.title = Some("Casa en venta".to_string());
        richer.price = Some(2_500_000.0);
        richer.bedrooms = Some(3);
        richer.amenities = vec!["alberca".to_string()];
        assert_eq!(richer.completeness(), 4);

        assert!(richer.completeness() > empty.completeness());
    }
}
