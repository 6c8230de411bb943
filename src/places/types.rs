use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity key of a venue in the places service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VenueId(pub String);

impl VenueId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Amenity flags; `None` means the service did not say.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenities {
    pub outdoor_seating: Option<bool>,
    pub takeout: Option<bool>,
    pub delivery: Option<bool>,
    pub reservations: Option<bool>,
    pub wheelchair_accessible: Option<bool>,
    pub good_for_children: Option<bool>,
    pub serves_alcohol: Option<bool>,
    pub parking: Option<bool>,
}

impl Amenities {
    /// Flags known to be true, by display name
    pub fn available(&self) -> Vec<&'static str> {
        [
            ("outdoor seating", self.outdoor_seating),
            ("takeout", self.takeout),
            ("delivery", self.delivery),
            ("reservations", self.reservations),
            ("wheelchair accessible", self.wheelchair_accessible),
            ("good for children", self.good_for_children),
            ("alcohol", self.serves_alcohol),
            ("parking", self.parking),
        ]
        .into_iter()
        .filter(|(_, flag)| *flag == Some(true))
        .map(|(name, _)| name)
        .collect()
    }
}

/// Venue attributes fetched from the places service.
///
/// Serializes flat: amenity flags and coordinates sit beside the rating
/// fields so a storage layer can map them one column per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmenityRecord {
    pub venue_id: VenueId,
    pub name: Option<String>,
    pub formatted_address: Option<String>,
    /// 1.0 to 5.0
    pub rating: Option<f64>,
    pub review_count: u32,
    /// 0 (free) to 4 (very expensive)
    pub price_level: Option<u8>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(flatten)]
    pub amenities: Amenities,
    pub cuisine: Option<String>,
    pub review_summary: Option<String>,
    /// Lowercase weekday -> hours text, e.g. "monday" -> "11:00AM - 10:00PM"
    pub business_hours: Option<BTreeMap<String, String>>,
    pub fetched_at: DateTime<Utc>,
}

impl AmenityRecord {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates {
            latitude: self.latitude?,
            longitude: self.longitude?,
        })
    }
}
