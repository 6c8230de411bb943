use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// USD per 1000 text-search calls
pub const TEXT_SEARCH_COST_PER_1K: f64 = 32.0;
/// USD per 1000 details calls
pub const DETAILS_COST_PER_1K: f64 = 17.0;

/// Counts billable places-service calls.
///
/// Every attempt the service answered is counted, retries included.
/// Network failures and cache hits are free.
#[derive(Debug, Default)]
pub struct QuotaTracker {
    text_search: AtomicU64,
    details: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuotaUsage {
    pub text_search_calls: u64,
    pub details_calls: u64,
    pub total_calls: u64,
    pub estimated_cost_usd: f64,
}

impl QuotaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_text_search(&self) {
        self.text_search.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_details(&self) {
        self.details.fetch_add(1, Ordering::Relaxed);
    }

    pub fn usage(&self) -> QuotaUsage {
        let text_search_calls = self.text_search.load(Ordering::Relaxed);
        let details_calls = self.details.load(Ordering::Relaxed);
        let cost = text_search_calls as f64 / 1000.0 * TEXT_SEARCH_COST_PER_1K
            + details_calls as f64 / 1000.0 * DETAILS_COST_PER_1K;

        QuotaUsage {
            text_search_calls,
            details_calls,
            total_calls: text_search_calls + details_calls,
            estimated_cost_usd: (cost * 10_000.0).round() / 10_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tracker() {
        let usage = QuotaTracker::new().usage();
        assert_eq!(usage.total_calls, 0);
        assert_eq!(usage.estimated_cost_usd, 0.0);
    }

    #[test]
    fn test_cost_estimate() {
        let tracker = QuotaTracker::new();
        for _ in 0..10 {
            tracker.record_text_search();
        }
        tracker.record_details();
        tracker.record_details();

        let usage = tracker.usage();
        assert_eq!(usage.text_search_calls, 10);
        assert_eq!(usage.details_calls, 2);
        assert_eq!(usage.total_calls, 12);
        // 10 * 0.032 + 2 * 0.017
        assert!((usage.estimated_cost_usd - 0.354).abs() < 1e-9);
    }
}
