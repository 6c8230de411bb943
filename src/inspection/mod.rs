pub mod extractor;
pub mod grade;
pub mod jurisdiction;
pub mod markup;
pub mod penalty;
pub mod strategies;
pub mod types;

pub use extractor::InspectionRecordExtractor;
pub use grade::calculate_grade;
pub use jurisdiction::JurisdictionRouter;
pub use penalty::{compute_penalty, HealthPenalty, DEFAULT_UNKNOWN_RECENCY_WEIGHT};
pub use strategies::{DetailPageStrategy, Extraction, ExtractionStrategy, StrategyContext, TableStrategy};
pub use types::{parse_inspection_date, HealthGrade, InspectionRecord};
