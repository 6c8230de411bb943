use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One inspection found on a portal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionRecord {
    /// Date as shown by the portal (usually "MM/DD/YYYY")
    pub date: String,
    pub critical_violations: u32,
    pub noncritical_violations: u32,
    /// Portal the record came from
    pub jurisdiction: String,
    pub inspection_type: Option<String>,
    pub score: Option<u32>,
}

impl InspectionRecord {
    pub fn new(date: impl Into<String>, critical: u32, noncritical: u32) -> Self {
        Self {
            date: date.into(),
            critical_violations: critical,
            noncritical_violations: noncritical,
            jurisdiction: String::new(),
            inspection_type: None,
            score: None,
        }
    }

    pub fn with_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = jurisdiction.into();
        self
    }

    /// Parsed inspection date, if the portal's text is in a known format
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_inspection_date(&self.date)
    }
}

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];

/// Parse the date formats inspection portals use
pub fn parse_inspection_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();

    // %Y happily reads "24" as the year 24, so two-digit years are routed explicitly
    let two_digit_year = text.split('/').count() == 3
        && text.rsplit('/').next().is_some_and(|year| year.len() == 2);
    if two_digit_year {
        return NaiveDate::parse_from_str(text, "%m/%d/%y").ok();
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Letter grade derived from a facility's inspection history.
///
/// Recomputed from the records on every fetch; never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthGrade {
    /// "A+", "A", "B+", ... "P", "F-12", or "N/A" when there are no inspections
    pub letter_grade: String,
    pub average_critical: f64,
    pub average_noncritical: f64,
    pub total_inspections: usize,
    pub inspections: Vec<InspectionRecord>,
    pub jurisdiction: String,
    /// Raw date text of the most recent inspection
    pub last_inspection_date: Option<String>,
}

impl HealthGrade {
    pub const NOT_AVAILABLE: &'static str = "N/A";

    pub fn is_available(&self) -> bool {
        self.total_inspections > 0 && self.letter_grade != Self::NOT_AVAILABLE
    }

    pub fn last_inspection(&self) -> Option<NaiveDate> {
        self.last_inspection_date
            .as_deref()
            .and_then(parse_inspection_date)
    }

    /// Human-readable summary of how the grade was reached
    pub fn explanation(&self) -> String {
        if self.total_inspections == 0 {
            return "No inspection data available".to_string();
        }
        let mut text = format!(
            "Avg: {:.1} critical, {:.1} non-critical ({} inspections",
            self.average_critical, self.average_noncritical, self.total_inspections
        );
        if !self.jurisdiction.is_empty() {
            text.push_str(", ");
            text.push_str(&self.jurisdiction);
        }
        text.push(')');
        text
    }
}
