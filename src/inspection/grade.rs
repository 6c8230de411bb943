use super::types::{HealthGrade, InspectionRecord};
use crate::config::DateFallback;

/// Letters for grade values 0..=16. Values past the end become "F-<n>".
const GRADE_LETTERS: [&str; 17] = [
    "A+", "A", "B+", "C+", "C", "D", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P",
];

/// Map average critical violations to a starting grade value.
///
/// Steps are not contiguous: an average of 1 lands on B+ (2), 3 lands on D (5).
pub fn critical_step(avg_critical: f64) -> u32 {
    if avg_critical < 1.0 {
        0
    } else if avg_critical < 2.0 {
        2
    } else if avg_critical < 3.0 {
        3
    } else if avg_critical < 4.0 {
        5
    } else {
        // Float-to-int casts saturate, and so does the sum
        5u32.saturating_add((avg_critical - 3.0).floor() as u32)
    }
}

/// Combined grade value: critical step plus one step per 3 average non-critical violations
pub fn grade_value(avg_critical: f64, avg_noncritical: f64) -> u32 {
    critical_step(avg_critical).saturating_add((avg_noncritical / 3.0).floor() as u32)
}

pub fn letter_for(value: u32) -> String {
    match GRADE_LETTERS.get(value as usize) {
        Some(letter) => letter.to_string(),
        None => format!("F-{}", value - 5),
    }
}

/// Pick the most recent inspection date.
///
/// When every date parses, the latest one wins regardless of listing order.
/// If any date is unreadable the records cannot be ordered reliably, and
/// `fallback` decides what to report.
fn last_inspection_date(records: &[InspectionRecord], fallback: DateFallback) -> Option<String> {
    let parsed: Option<Vec<_>> = records
        .iter()
        .map(|r| r.parsed_date().map(|d| (d, r)))
        .collect();

    match parsed {
        Some(dated) => dated
            .into_iter()
            .max_by_key(|(date, _)| *date)
            .map(|(_, record)| record.date.clone()),
        None => match fallback {
            DateFallback::FirstRecord => records.first().map(|r| r.date.clone()),
            DateFallback::None => None,
        },
    }
}

/// Grade a facility from its inspection history.
///
/// An empty history yields "N/A" with zeroed averages; it is not an error.
pub fn calculate_grade(records: Vec<InspectionRecord>, fallback: DateFallback) -> HealthGrade {
    let jurisdiction = records
        .first()
        .map(|r| r.jurisdiction.clone())
        .unwrap_or_default();

    if records.is_empty() {
        return HealthGrade {
            letter_grade: HealthGrade::NOT_AVAILABLE.to_string(),
            average_critical: 0.0,
            average_noncritical: 0.0,
            total_inspections: 0,
            inspections: records,
            jurisdiction,
            last_inspection_date: None,
        };
    }

    let n = records.len() as f64;
    let total_critical: u64 = records.iter().map(|r| r.critical_violations as u64).sum();
    let total_noncritical: u64 = records.iter().map(|r| r.noncritical_violations as u64).sum();
    let avg_critical = total_critical as f64 / n;
    let avg_noncritical = total_noncritical as f64 / n;

    let letter_grade = letter_for(grade_value(avg_critical, avg_noncritical));
    let last_inspection_date = last_inspection_date(&records, fallback);

    HealthGrade {
        letter_grade,
        average_critical: avg_critical,
        average_noncritical: avg_noncritical,
        total_inspections: records.len(),
        inspections: records,
        jurisdiction,
        last_inspection_date,
    }
}
