use owo_colors::OwoColorize;
use std::io::IsTerminal;

use crate::enrich::EnrichmentOutcome;
use crate::inspection::HealthGrade;
use crate::places::{AmenityRecord, QuotaUsage};
use crate::scoring::AdjustedScore;

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Paint a letter grade: A green, B cyan, C yellow, anything lower red
fn paint_grade(grade: &str, use_colors: bool) -> String {
    if !use_colors {
        return grade.to_string();
    }
    match grade.chars().next() {
        Some('A') => grade.green().bold().to_string(),
        Some('B') => grade.cyan().bold().to_string(),
        Some('C') => grade.yellow().bold().to_string(),
        Some('N') => grade.dimmed().to_string(),
        _ => grade.red().bold().to_string(),
    }
}

/// "4.3" style rating, or "-" when unknown
pub fn format_rating(rating: Option<f64>) -> String {
    rating.map_or_else(|| "-".to_string(), |r| format!("{:.1}", r))
}

/// Signed penalty, e.g. "-1.80" or "0.00"
pub fn format_penalty(penalty: f64) -> String {
    if penalty > 0.0 {
        format!("-{:.2}", penalty)
    } else {
        "0.00".to_string()
    }
}

pub fn format_score(score: &AdjustedScore, use_colors: bool) -> String {
    let b = &score.penalty_breakdown;
    format!(
        "{} -> {} ({})  penalty {} = ({:.2} grade + {:.2} critical) x {:.1} recency",
        format_rating(Some(score.base_rating)),
        format_rating(Some(score.final_rating)),
        paint_grade(&score.final_grade, use_colors),
        format_penalty(score.penalty_applied),
        b.grade_component,
        b.critical_surcharge,
        b.recency_weight
    )
}

pub fn format_health(grade: &HealthGrade, use_colors: bool) -> String {
    let last = grade.last_inspection_date.as_deref().unwrap_or("unknown");
    format!(
        "{}  {}  last inspected {}",
        paint_grade(&grade.letter_grade, use_colors),
        grade.explanation(),
        last
    )
}

pub fn format_amenity(record: &AmenityRecord) -> String {
    let price = record
        .price_level
        .map(|p| "$".repeat(p.max(1) as usize))
        .unwrap_or_else(|| "-".to_string());
    let amenities = record.amenities.available();
    let amenities = if amenities.is_empty() {
        "none listed".to_string()
    } else {
        amenities.join(", ")
    };

    format!(
        "{} stars ({} reviews)  {}  {}  amenities: {}",
        format_rating(record.rating),
        record.review_count,
        price,
        record.cuisine.as_deref().unwrap_or("unknown cuisine"),
        amenities
    )
}

/// Multi-line report for one entity
pub fn format_outcome(outcome: &EnrichmentOutcome, use_colors: bool) -> String {
    let title = if use_colors {
        outcome.entity.name.bold().to_string()
    } else {
        outcome.entity.name.clone()
    };

    let amenity = match (&outcome.amenity, outcome.amenity_timed_out) {
        (Some(record), _) => format_amenity(record),
        (None, true) => "timed out".to_string(),
        (None, false) => "no data".to_string(),
    };
    let health = match (&outcome.health, outcome.health_timed_out) {
        (Some(grade), _) => format_health(grade, use_colors),
        (None, true) => "timed out".to_string(),
        (None, false) => "no inspection data".to_string(),
    };

    let mut lines = vec![
        title,
        format!("  Address: {}", outcome.entity.address),
        format!("  Venue:   {}", amenity),
        format!("  Health:  {}", health),
        format!("  Score:   {}", format_score(&outcome.score, use_colors)),
    ];
    if let Some(summary) = outcome.amenity.as_ref().and_then(|a| a.review_summary.as_deref()) {
        lines.push(format!("  Reviews: {}", summary));
    }
    lines.join("\n")
}

/// Tab-separated values for scripting
/// Columns: name, address, base rating, final rating, final grade, health grade, penalty
pub fn format_tsv(outcomes: &[EnrichmentOutcome]) -> String {
    outcomes
        .iter()
        .map(|o| {
            format!(
                "{}\t{}\t{:.2}\t{:.2}\t{}\t{}\t{:.3}",
                o.entity.name,
                o.entity.address,
                o.score.base_rating,
                o.score.final_rating,
                o.score.final_grade,
                o.health
                    .as_ref()
                    .map(|h| h.letter_grade.as_str())
                    .unwrap_or(HealthGrade::NOT_AVAILABLE),
                o.score.penalty_applied
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_quota(usage: &QuotaUsage) -> String {
    format!(
        "Places API: {} calls ({} search, {} details), est. ${:.4}",
        usage.total_calls, usage.text_search_calls, usage.details_calls, usage.estimated_cost_usd
    )
}
