pub mod client;
pub mod parse;
pub mod quota;
pub mod types;

pub use client::AmenityEnrichmentClient;
pub use quota::{QuotaTracker, QuotaUsage};
pub use types::{Amenities, AmenityRecord, Coordinates, VenueId};
