use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::types::HealthGrade;

/// Weight applied when the last inspection date is unknown
pub const DEFAULT_UNKNOWN_RECENCY_WEIGHT: f64 = 0.5;

/// Rating penalty derived from a health grade, split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthPenalty {
    pub grade_component: f64,
    pub critical_surcharge: f64,
    pub recency_weight: f64,
}

impl HealthPenalty {
    pub const NONE: HealthPenalty = HealthPenalty {
        grade_component: 0.0,
        critical_surcharge: 0.0,
        recency_weight: 1.0,
    };

    /// Stars removed from the base rating
    pub fn total(&self) -> f64 {
        (self.grade_component + self.critical_surcharge) * self.recency_weight
    }
}

/// Base penalty in stars for a health letter grade.
///
/// Covers both the inspection letters (A+, B+, C+, ..., P, F-n) and the
/// rating-scale letters (A-, B, B-, C-), so either vocabulary can be fed in.
pub fn grade_penalty(letter: &str) -> f64 {
    match letter {
        "A+" | "A" | "A-" | "B+" => 0.0,
        "B" | "B-" => 0.1,
        "C+" => 0.2,
        "C" | "C-" => 0.5,
        "N/A" | "" => 0.0,
        d if d.starts_with('D') => 1.0,
        _ => 1.5,
    }
}

pub fn critical_surcharge(avg_critical: f64) -> f64 {
    if avg_critical >= 2.0 {
        0.3
    } else if avg_critical >= 1.0 {
        0.15
    } else {
        0.0
    }
}

/// Decay factor for an inspection `age_days` old; `None` uses `unknown_weight`.
pub fn recency_weight(age_days: Option<i64>, unknown_weight: f64) -> f64 {
    match age_days {
        None => unknown_weight,
        Some(days) if days < 180 => 1.0,
        Some(days) if days <= 365 => 0.8,
        Some(days) if days <= 730 => 0.5,
        Some(_) => 0.3,
    }
}

/// Penalty for `grade` as of `today`.
pub fn compute_penalty(grade: &HealthGrade, today: NaiveDate, unknown_weight: f64) -> HealthPenalty {
    if !grade.is_available() {
        return HealthPenalty::NONE;
    }

    let age_days = grade
        .last_inspection()
        .map(|date| (today - date).num_days());

    HealthPenalty {
        grade_component: grade_penalty(&grade.letter_grade),
        critical_surcharge: critical_surcharge(grade.average_critical),
        recency_weight: recency_weight(age_days, unknown_weight),
    }
}
