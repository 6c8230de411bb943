use regex::Regex;

use super::schema::{Config, RetryConfig};

/// Validate configuration at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_config(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    // Durations
    let durations = [
        ("places.rate_limit", &config.places.rate_limit),
        ("places.timeout", &config.places.timeout),
        ("inspections.rate_limit", &config.inspections.rate_limit),
        ("inspections.timeout", &config.inspections.timeout),
        ("cache.freshness", &config.cache.freshness),
        ("orchestrator.entity_timeout", &config.orchestrator.entity_timeout),
        ("orchestrator.amenity_timeout", &config.orchestrator.amenity_timeout),
        ("orchestrator.health_timeout", &config.orchestrator.health_timeout),
    ];
    for (field, value) in durations {
        check_duration(field, value, &mut errors);
    }

    validate_retry("places.retry", &config.places.retry, &mut errors);
    validate_retry("inspections.retry", &config.inspections.retry, &mut errors);

    if config.places.endpoint.trim().is_empty() {
        errors.push("places.endpoint: must not be empty".to_string());
    }

    // Jurisdictions
    if config.inspections.jurisdictions.is_empty() {
        errors.push("inspections.jurisdictions: at least one portal is required".to_string());
    }
    for (i, j) in config.inspections.jurisdictions.iter().enumerate() {
        if j.name.trim().is_empty() {
            errors.push(format!("inspections.jurisdictions[{}].name: must not be empty", i));
        }
        if !j.search_url.starts_with("http") {
            errors.push(format!(
                "inspections.jurisdictions[{}].search_url: invalid '{}' - must be an http(s) URL",
                i, j.search_url
            ));
        }
        if !j.base_url.starts_with("http") {
            errors.push(format!(
                "inspections.jurisdictions[{}].base_url: invalid '{}' - must be an http(s) URL",
                i, j.base_url
            ));
        }
        for (field, pattern) in [("facility_link", &j.facility_link), ("inspection_link", &j.inspection_link)] {
            if let Err(e) = Regex::new(pattern) {
                errors.push(format!(
                    "inspections.jurisdictions[{}].{}: invalid pattern '{}' - {}",
                    i, field, pattern, e
                ));
            }
        }
    }

    if config.inspections.max_detail_pages == 0 {
        errors.push("inspections.max_detail_pages: must be at least 1".to_string());
    }

    if config.cache.capacity == Some(0) {
        errors.push("cache.capacity: must be at least 1".to_string());
    }

    let weight = config.scoring.unknown_recency_weight;
    if !(0.0..=1.0).contains(&weight) {
        errors.push(format!(
            "scoring.unknown_recency_weight: {} is outside 0.0-1.0",
            weight
        ));
    }

    if config.orchestrator.workers == 0 {
        errors.push("orchestrator.workers: must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_duration(field: &str, value: &str, errors: &mut Vec<String>) {
    if let Err(e) = humantime::parse_duration(value.trim()) {
        errors.push(format!("{}: invalid duration '{}' - {}", field, value, e));
    }
}

fn validate_retry(prefix: &str, retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.attempts == 0 {
        errors.push(format!("{}.attempts: must be at least 1", prefix));
    }
    check_duration(&format!("{}.base_delay", prefix), &retry.base_delay, errors);
    check_duration(&format!("{}.max_delay", prefix), &retry.max_delay, errors);
}
