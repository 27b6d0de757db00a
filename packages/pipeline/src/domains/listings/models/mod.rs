pub mod listing;

pub use listing::{DedupStatus, Listing};
