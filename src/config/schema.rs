use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::scoring::ScoringConfig;
use crate::transport::RetryPolicy;

/// Top-level configuration file.
///
/// Every section has defaults, so an empty file is a valid configuration.
///
/// Example YAML:
/// ```yaml
/// log_level: info
/// places:
///   rate_limit: 125ms
///   retry: { attempts: 3, base_delay: 500ms }
/// inspections:
///   tie_break: closest-address
/// cache:
///   freshness: 24h
///   persist: true
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Default tracing filter when RUST_LOG is unset (e.g. "info", "plate_score=debug")
    pub log_level: Option<String>,
    pub places: PlacesConfig,
    pub inspections: InspectionsConfig,
    pub cache: CacheConfig,
    pub scoring: ScoringConfig,
    pub orchestrator: OrchestratorConfig,
}

/// Parse a humantime duration, falling back to `default` when it is malformed.
///
/// Configs are validated at startup, so the fallback only matters for
/// callers that skip validation.
pub(crate) fn duration_or(value: &str, default: Duration) -> Duration {
    humantime::parse_duration(value.trim()).unwrap_or(default)
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub attempts: usize,
    /// Delay before the first retry; doubles on each subsequent retry
    pub base_delay: String,
    pub max_delay: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: "500ms".to_string(),
            max_delay: "10s".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            attempts: self.attempts.max(1),
            base_delay: duration_or(&self.base_delay, defaults.base_delay),
            max_delay: duration_or(&self.max_delay, defaults.max_delay),
        }
    }
}

/// Places (venue amenity/rating) service settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PlacesConfig {
    /// Base URL; "/textsearch/json" and "/details/json" are appended
    pub endpoint: String,
    /// API key. Prefer the PLATE_SCORE_PLACES_KEY environment variable.
    pub api_key: Option<String>,
    pub region: String,
    /// Minimum spacing between calls (default ~8 req/s)
    pub rate_limit: String,
    pub timeout: String,
    pub retry: RetryConfig,
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://maps.googleapis.com/maps/api/place".to_string(),
            api_key: None,
            region: "us".to_string(),
            rate_limit: "125ms".to_string(),
            timeout: "10s".to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl PlacesConfig {
    pub fn rate_limit_interval(&self) -> Duration {
        duration_or(&self.rate_limit, Duration::from_millis(125))
    }

    pub fn request_timeout(&self) -> Duration {
        duration_or(&self.timeout, Duration::from_secs(10))
    }
}

/// How to pick one facility when a portal search returns several.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Take the first listed result
    #[default]
    First,
    /// Take the result whose listing text is most similar to the street address
    ClosestAddress,
}

/// What `last_inspection_date` becomes when some inspection dates cannot be parsed.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DateFallback {
    /// Use the first record's raw date as listed, without reordering
    #[default]
    FirstRecord,
    /// Leave the date unknown
    None,
}

/// An inspection portal and the cities it covers
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct JurisdictionConfig {
    pub name: String,
    /// Prefix for relative links found on portal pages
    pub base_url: String,
    /// Form endpoint accepting the facility query
    pub search_url: String,
    /// Lowercase substrings of an address that place it in this jurisdiction
    #[serde(default)]
    pub city_patterns: Vec<String>,
    /// Higher is searched earlier; portals with priority 0 are only used when the address matches
    #[serde(default)]
    pub priority: u32,
    /// Regex matching facility links in search results
    #[serde(default = "default_facility_link")]
    pub facility_link: String,
    /// Regex matching individual inspection links on a facility page
    #[serde(default = "default_inspection_link")]
    pub inspection_link: String,
}

fn default_facility_link() -> String {
    r"Facility\?OpenDocument".to_string()
}

fn default_inspection_link() -> String {
    r"Inspection\?OpenDocument".to_string()
}

impl JurisdictionConfig {
    pub fn new(name: &str, portal: &str, city_patterns: &[&str]) -> Self {
        let base_url = format!("https://www.inspectionsonline.us/{}/inspect.nsf", portal);
        Self {
            name: name.to_string(),
            search_url: format!("{}/Search?OpenForm", base_url),
            base_url,
            city_patterns: city_patterns.iter().map(|p| p.to_string()).collect(),
            priority: 0,
            facility_link: default_facility_link(),
            inspection_link: default_inspection_link(),
        }
    }

    fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

fn default_jurisdictions() -> Vec<JurisdictionConfig> {
    vec![
        JurisdictionConfig::new("Kansas City MO", "mo/usakansascity", &["kansas city mo", "kcmo", "kc mo"])
            .with_priority(10),
        JurisdictionConfig::new(
            "Kansas City KS (Wyandotte County)",
            "ks/wyandotte",
            &["kansas city ks", "kck", "kc ks", "wyandotte"],
        ),
        JurisdictionConfig::new(
            "Johnson County KS",
            "ks/joco",
            &["overland park", "olathe", "lenexa", "shawnee", "leawood"],
        ),
        JurisdictionConfig::new("Independence MO", "mo/independence", &["independence"]),
        JurisdictionConfig::new(
            "Lee's Summit MO",
            "mo/leessummit",
            &["lee's summit", "lees summit"],
        ),
        JurisdictionConfig::new("Blue Springs MO", "mo/bluesprings", &["blue springs"]),
    ]
}

/// Health inspection portal settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct InspectionsConfig {
    pub jurisdictions: Vec<JurisdictionConfig>,
    pub rate_limit: String,
    pub timeout: String,
    pub retry: RetryConfig,
    pub tie_break: TieBreak,
    /// Inspection detail pages visited when the facility table yields nothing
    pub max_detail_pages: usize,
    pub date_fallback: DateFallback,
}

impl Default for InspectionsConfig {
    fn default() -> Self {
        Self {
            jurisdictions: default_jurisdictions(),
            rate_limit: "1s".to_string(),
            timeout: "15s".to_string(),
            retry: RetryConfig::default(),
            tie_break: TieBreak::First,
            max_detail_pages: 5,
            date_fallback: DateFallback::FirstRecord,
        }
    }
}

impl InspectionsConfig {
    pub fn rate_limit_interval(&self) -> Duration {
        duration_or(&self.rate_limit, Duration::from_secs(1))
    }

    pub fn request_timeout(&self) -> Duration {
        duration_or(&self.timeout, Duration::from_secs(15))
    }
}

/// Result cache settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum age of a cached lookup before it is fetched again
    pub freshness: String,
    /// Maximum in-memory entries (unbounded when absent)
    pub capacity: Option<usize>,
    /// Mirror entries to disk so they survive restarts
    pub persist: bool,
    /// Cache directory (defaults to the platform cache dir)
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness: "24h".to_string(),
            capacity: None,
            persist: false,
            path: None,
        }
    }
}

impl CacheConfig {
    pub fn freshness_window(&self) -> Duration {
        duration_or(&self.freshness, Duration::from_secs(24 * 3600))
    }
}

/// Per-entity scheduling settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Overall budget per entity; unfinished lookups are treated as absent
    pub entity_timeout: String,
    pub amenity_timeout: String,
    pub health_timeout: String,
    /// Entities processed concurrently in a batch
    pub workers: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            entity_timeout: "60s".to_string(),
            amenity_timeout: "30s".to_string(),
            health_timeout: "45s".to_string(),
            workers: 4,
        }
    }
}

impl OrchestratorConfig {
    pub fn entity_budget(&self) -> Duration {
        duration_or(&self.entity_timeout, Duration::from_secs(60))
    }

    pub fn amenity_budget(&self) -> Duration {
        duration_or(&self.amenity_timeout, Duration::from_secs(30))
    }

    pub fn health_budget(&self) -> Duration {
        duration_or(&self.health_timeout, Duration::from_secs(45))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: Config = serde_saphyr::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.places.rate_limit_interval(), Duration::from_millis(125));
        assert_eq!(config.cache.freshness_window(), Duration::from_secs(86_400));
        assert_eq!(config.inspections.max_detail_pages, 5);
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let yaml = r#"
places:
  rate_limit: 250ms
  retry:
    attempts: 5
inspections:
  tie_break: closest-address
  date_fallback: none
cache:
  freshness: 12h
"#;
        let config: Config = serde_saphyr::from_str(yaml).unwrap();
        assert_eq!(config.places.rate_limit_interval(), Duration::from_millis(250));
        assert_eq!(config.places.retry.policy().attempts, 5);
        assert_eq!(config.places.retry.policy().base_delay, Duration::from_millis(500));
        assert_eq!(config.inspections.tie_break, TieBreak::ClosestAddress);
        assert_eq!(config.inspections.date_fallback, DateFallback::None);
        assert_eq!(config.cache.freshness_window(), Duration::from_secs(12 * 3600));
    }

    #[test]
    fn test_custom_jurisdiction_gets_default_link_patterns() {
        let yaml = r#"
inspections:
  jurisdictions:
    - name: Springfield
      base_url: https://portal.example/inspect.nsf
      search_url: https://portal.example/inspect.nsf/Search?OpenForm
      city_patterns: [springfield]
"#;
        let config: Config = serde_saphyr::from_str(yaml).unwrap();
        let j = &config.inspections.jurisdictions[0];
        assert_eq!(config.inspections.jurisdictions.len(), 1);
        assert_eq!(j.priority, 0);
        assert_eq!(j.facility_link, r"Facility\?OpenDocument");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<Config, _> = serde_saphyr::from_str("places:\n  rate: 1s\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = Config::default();
        let yaml = serde_saphyr::to_string(&config).unwrap();
        let parsed: Config = serde_saphyr::from_str(&yaml).unwrap();
        assert_eq!(config, parsed);
    }
}
