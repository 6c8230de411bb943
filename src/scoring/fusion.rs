use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::config::ScoringConfig;
use super::grading::rating_to_grade;
use crate::inspection::{compute_penalty, HealthGrade, HealthPenalty};

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

/// Output of the external rating model. Treated as opaque input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasePrediction {
    /// 1.0 to 5.0
    pub predicted_rating: f64,
    /// 0.0 to 1.0
    pub confidence: f64,
    pub model_version: String,
}

impl BasePrediction {
    pub fn new(predicted_rating: f64, confidence: f64, model_version: impl Into<String>) -> Self {
        Self {
            predicted_rating,
            confidence,
            model_version: model_version.into(),
        }
    }
}

/// Base prediction adjusted by the health penalty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedScore {
    pub base_rating: f64,
    pub final_rating: f64,
    pub final_grade: String,
    pub penalty_applied: f64,
    pub penalty_breakdown: HealthPenalty,
}

impl AdjustedScore {
    pub fn base_grade(&self) -> &'static str {
        rating_to_grade(self.base_rating)
    }
}

/// Combines a base prediction with a health grade.
///
/// Carries the evaluation date so recency weighting is reproducible.
#[derive(Debug, Clone)]
pub struct ScoreFusionEngine {
    as_of: NaiveDate,
    unknown_recency_weight: f64,
}

impl ScoreFusionEngine {
    pub fn new(as_of: NaiveDate, config: &ScoringConfig) -> Self {
        Self {
            as_of,
            unknown_recency_weight: config.unknown_recency_weight,
        }
    }

    /// Engine evaluating as of today (local date)
    pub fn today(config: &ScoringConfig) -> Self {
        Self::new(chrono::Local::now().date_naive(), config)
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Adjusted score for `base`. A missing or "N/A" grade leaves the base untouched.
    pub fn fuse(&self, base: &BasePrediction, health: Option<&HealthGrade>) -> AdjustedScore {
        let breakdown = match health {
            Some(grade) => compute_penalty(grade, self.as_of, self.unknown_recency_weight),
            None => HealthPenalty::NONE,
        };
        let penalty = breakdown.total();
        let final_rating = (base.predicted_rating - penalty).clamp(MIN_RATING, MAX_RATING);

        AdjustedScore {
            base_rating: base.predicted_rating,
            final_rating,
            final_grade: rating_to_grade(final_rating).to_string(),
            penalty_applied: penalty,
            penalty_breakdown: breakdown,
        }
    }
}
