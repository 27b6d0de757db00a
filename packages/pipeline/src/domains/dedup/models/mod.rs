pub mod listing_group;

pub use listing_group::{GroupStatus, ListingGroup};
