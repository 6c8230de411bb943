use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::types::{Amenities, AmenityRecord, VenueId};
use crate::error::FetchError;

/// Fields requested from the details endpoint
pub const DETAIL_FIELDS: &str = "place_id,name,formatted_address,geometry,rating,user_ratings_total,\
price_level,types,opening_hours,reviews,serves_beer,serves_wine,takeout,delivery,reservable,\
wheelchair_accessible_entrance,outdoor_seating";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<SearchCandidate>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchCandidate {
    place_id: String,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    result: Option<PlaceResult>,
    error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlaceResult {
    name: Option<String>,
    formatted_address: Option<String>,
    geometry: Option<Geometry>,
    rating: Option<f64>,
    user_ratings_total: Option<u32>,
    price_level: Option<u8>,
    types: Vec<String>,
    opening_hours: Option<OpeningHours>,
    reviews: Vec<Review>,
    serves_beer: Option<bool>,
    serves_wine: Option<bool>,
    takeout: Option<bool>,
    delivery: Option<bool>,
    reservable: Option<bool>,
    wheelchair_accessible_entrance: Option<bool>,
    outdoor_seating: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OpeningHours {
    weekday_text: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Review {
    pub text: String,
    pub rating: Option<f64>,
}

/// Map the service's status field onto the fetch error taxonomy
fn check_status(status: &str, error_message: Option<String>) -> Result<(), FetchError> {
    let message = error_message.unwrap_or_else(|| status.to_string());
    match status {
        "OK" => Ok(()),
        "ZERO_RESULTS" | "NOT_FOUND" => Err(FetchError::NotFound(message)),
        "OVER_QUERY_LIMIT" | "UNKNOWN_ERROR" => Err(FetchError::Transient(message)),
        "REQUEST_DENIED" => Err(FetchError::Rejected { status: 403, message }),
        "INVALID_REQUEST" => Err(FetchError::Rejected { status: 400, message }),
        other => Err(FetchError::Parse(format!("unknown status '{}': {}", other, message))),
    }
}

/// Venue id of the first text-search candidate
pub fn parse_search(body: &str) -> Result<VenueId, FetchError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(format!("search response: {}", e)))?;
    check_status(&response.status, response.error_message)?;

    response
        .results
        .into_iter()
        .next()
        .map(|c| VenueId(c.place_id))
        .ok_or_else(|| FetchError::NotFound("no search candidates".to_string()))
}

/// Amenity record from a details response
pub fn parse_details(body: &str, venue_id: &VenueId, fetched_at: DateTime<Utc>) -> Result<AmenityRecord, FetchError> {
    let response: DetailsResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(format!("details response: {}", e)))?;
    check_status(&response.status, response.error_message)?;

    let place = response
        .result
        .ok_or_else(|| FetchError::NotFound(format!("no details for {}", venue_id)))?;
    let name = place.name.clone().unwrap_or_default();

    Ok(AmenityRecord {
        venue_id: venue_id.clone(),
        rating: place.rating.filter(|r| (1.0..=5.0).contains(r)),
        review_count: place.user_ratings_total.unwrap_or(0),
        price_level: place.price_level.filter(|p| *p <= 4),
        latitude: place.geometry.as_ref().map(|g| g.location.lat),
        longitude: place.geometry.as_ref().map(|g| g.location.lng),
        amenities: Amenities {
            outdoor_seating: place.outdoor_seating,
            takeout: place.takeout,
            delivery: place.delivery,
            reservations: place.reservable,
            wheelchair_accessible: place.wheelchair_accessible_entrance,
            good_for_children: good_for_children(&place.types, &name),
            serves_alcohol: serves_alcohol(place.serves_beer, place.serves_wine),
            parking: None,
        },
        cuisine: cuisine_for(&place.types, &name),
        review_summary: review_summary(&place.reviews),
        business_hours: place
            .opening_hours
            .as_ref()
            .and_then(|h| business_hours(&h.weekday_text)),
        name: place.name,
        formatted_address: place.formatted_address,
        fetched_at,
    })
}

const CUISINE_TYPES: &[(&str, &str)] = &[
    ("chinese_restaurant", "Chinese"),
    ("italian_restaurant", "Italian"),
    ("mexican_restaurant", "Mexican"),
    ("indian_restaurant", "Indian"),
    ("thai_restaurant", "Thai"),
    ("japanese_restaurant", "Japanese"),
    ("korean_restaurant", "Korean"),
    ("french_restaurant", "French"),
    ("mediterranean_restaurant", "Mediterranean"),
    ("greek_restaurant", "Greek"),
    ("vietnamese_restaurant", "Vietnamese"),
    ("pizza_restaurant", "Pizza"),
    ("seafood_restaurant", "Seafood"),
    ("steakhouse", "Steakhouse"),
    ("barbecue_restaurant", "BBQ"),
    ("fast_food_restaurant", "Fast Food"),
    ("cafe", "Cafe"),
    ("bakery", "Bakery"),
];

const CUISINE_KEYWORDS: &[(&str, &str)] = &[
    ("pizza", "Pizza"),
    ("chinese", "Chinese"),
    ("mexican", "Mexican"),
    ("italian", "Italian"),
    ("thai", "Thai"),
    ("indian", "Indian"),
    ("sushi", "Japanese"),
    ("bbq", "BBQ"),
    ("barbecue", "BBQ"),
    ("seafood", "Seafood"),
    ("steakhouse", "Steakhouse"),
    ("cafe", "Cafe"),
    ("bakery", "Bakery"),
];

/// Cuisine from place types in listed order, then name keywords.
///
/// Plain "restaurant" listings with no other signal are classed American.
pub fn cuisine_for(types: &[String], name: &str) -> Option<String> {
    let by_type = types.iter().find_map(|t| {
        CUISINE_TYPES
            .iter()
            .find(|(key, _)| key == t)
            .map(|(_, cuisine)| *cuisine)
    });
    if let Some(cuisine) = by_type {
        return Some(cuisine.to_string());
    }

    let name = name.to_lowercase();
    if let Some((_, cuisine)) = CUISINE_KEYWORDS.iter().find(|(kw, _)| name.contains(kw)) {
        return Some(cuisine.to_string());
    }

    types
        .iter()
        .any(|t| t == "restaurant")
        .then(|| "American".to_string())
}

pub fn good_for_children(types: &[String], name: &str) -> Option<bool> {
    let has_type = |wanted: &str| types.iter().any(|t| t == wanted);
    let name = name.to_lowercase();

    if has_type("family_restaurant")
        || ["family", "kids", "children"].iter().any(|kw| name.contains(kw))
        || has_type("meal_takeaway")
        || has_type("fast_food_restaurant")
    {
        Some(true)
    } else {
        None
    }
}

/// True when either beer or wine is served; unknown only when both are unknown.
pub fn serves_alcohol(beer: Option<bool>, wine: Option<bool>) -> Option<bool> {
    match (beer, wine) {
        (None, None) => None,
        (beer, wine) => Some(beer == Some(true) || wine == Some(true)),
    }
}

fn snippet(text: &str) -> String {
    let first_sentence = text.split('.').next().unwrap_or(text);
    if first_sentence.chars().count() < 100 {
        first_sentence.to_string()
    } else {
        let cut: String = text.chars().take(97).collect();
        format!("{}...", cut)
    }
}

/// "Average rating: 4.3/5. Recent reviews: a | b | c"
pub fn review_summary(reviews: &[Review]) -> Option<String> {
    if reviews.is_empty() {
        return None;
    }

    let ratings: Vec<f64> = reviews
        .iter()
        .filter_map(|r| r.rating)
        .filter(|r| *r > 0.0)
        .collect();
    let average = if ratings.is_empty() {
        0.0
    } else {
        ratings.iter().sum::<f64>() / ratings.len() as f64
    };

    let snippets: Vec<String> = reviews
        .iter()
        .take(3)
        .filter(|r| r.text.chars().count() > 10)
        .map(|r| snippet(&r.text))
        .collect();

    Some(format!(
        "Average rating: {:.1}/5. Recent reviews: {}",
        average,
        snippets.join(" | ")
    ))
}

static MERIDIEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*(AM|PM)").expect("meridiem pattern"));

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Normalise "Monday: 11:00 AM – 10:00 PM" lines into weekday -> "11:00AM - 10:00PM".
pub fn business_hours(weekday_text: &[String]) -> Option<BTreeMap<String, String>> {
    let mut hours = BTreeMap::new();

    for line in weekday_text {
        let Some((day, text)) = line.split_once(':') else {
            continue;
        };
        let day = day.trim().to_lowercase();
        if !WEEKDAYS.contains(&day.as_str()) {
            continue;
        }

        let text = text
            .trim()
            .replace(&['\u{2013}', '\u{2014}'][..], "-")
            .replace(&['\u{202f}', '\u{2009}'][..], " ");
        let text = MERIDIEM.replace_all(&text, "$1").into_owned();
        hours.insert(day, text);
    }

    if hours.is_empty() {
        None
    } else {
        Some(hours)
    }
}
