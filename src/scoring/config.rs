use serde::{Deserialize, Serialize};

use crate::inspection::DEFAULT_UNKNOWN_RECENCY_WEIGHT;

/// Score fusion settings.
///
/// Example YAML:
/// ```yaml
/// scoring:
///   unknown_recency_weight: 0.5
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    /// Recency weight used when a grade has no readable inspection date (0.0-1.0)
    pub unknown_recency_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            unknown_recency_weight: DEFAULT_UNKNOWN_RECENCY_WEIGHT,
        }
    }
}
