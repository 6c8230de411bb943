pub mod config;
pub mod fusion;
pub mod grading;

pub use config::ScoringConfig;
pub use fusion::{AdjustedScore, BasePrediction, ScoreFusionEngine};
pub use grading::rating_to_grade;
