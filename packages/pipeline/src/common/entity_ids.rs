//! Typed ID definitions for all domain entities.
//!
//! This module defines type aliases for each domain entity, providing
//! compile-time type safety for ID usage throughout the application.
//!
//! # Example
//!
//! ```rust
//! use pipeline_core::common::{ListingId, ScrapeRunId};
//!
//! // These are incompatible types - compiler prevents mixing them up
//! let listing_id: ListingId = ListingId::new();
//! let run_id: ScrapeRunId = ScrapeRunId::new();
//!
//! // This would be a compile error:
//! // let wrong: ScrapeRunId = listing_id;
//! ```

// Re-export the core Id type and version markers
pub use super::id::{Id, V4, V7};

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for Platform entities (configured external sources).
pub struct Platform;

/// Marker type for SearchQuery entities (saved searches).
pub struct SearchQuery;

/// Marker type for ScrapeRun entities (one execution of a search).
pub struct ScrapeRun;

/// Marker type for DiscoveredListing entities (listing pointers found
/// during discovery).
pub struct DiscoveredListing;

/// Marker type for Listing entities (fully scraped listing detail).
pub struct Listing;

/// Marker type for ListingGroup entities (candidate duplicate clusters).
pub struct ListingGroup;

/// Marker type for Property entities (canonical consolidated records).
pub struct Property;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

/// Typed ID for Platform entities.
pub type PlatformId = Id<Platform>;

/// Typed ID for SearchQuery entities.
pub type SearchQueryId = Id<SearchQuery>;

/// Typed ID for ScrapeRun entities.
pub type ScrapeRunId = Id<ScrapeRun>;

/// Typed ID for DiscoveredListing entities.
pub type DiscoveredListingId = Id<DiscoveredListing>;

/// Typed ID for Listing entities.
pub type ListingId = Id<Listing>;

/// Typed ID for ListingGroup entities.
pub type ListingGroupId = Id<ListingGroup>;

/// Typed ID for Property entities.
pub type PropertyId = Id<Property>;
