/// Rating thresholds, highest first. Ratings below the last step are "F".
const RATING_GRADES: [(f64, &str); 10] = [
    (4.6, "A+"),
    (4.4, "A"),
    (4.2, "A-"),
    (4.0, "B+"),
    (3.8, "B"),
    (3.6, "B-"),
    (3.4, "C+"),
    (3.2, "C"),
    (3.0, "C-"),
    (2.5, "D"),
];

/// Letter grade for a 1-5 star rating.
///
/// Out-of-range ratings are clamped to 0-5 first.
pub fn rating_to_grade(rating: f64) -> &'static str {
    let rating = rating.clamp(0.0, 5.0);
    RATING_GRADES
        .iter()
        .find(|(threshold, _)| rating >= *threshold)
        .map(|(_, grade)| *grade)
        .unwrap_or("F")
}
