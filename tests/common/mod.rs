#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use plate_score::cache::ResultCache;
use plate_score::config::{Config, JurisdictionConfig};
use plate_score::enrich::EnrichmentOrchestrator;
use plate_score::error::FetchError;
use plate_score::scoring::{ScoreFusionEngine, ScoringConfig};
use plate_score::transport::{Request, Transport};

pub const KC_BASE: &str = "http://kc.test/inspect.nsf";
pub const JOCO_BASE: &str = "http://joco.test/inspect.nsf";

pub const PLACES_SEARCH: &str = r#"{"status":"OK","results":[{"place_id":"p1"}]}"#;
pub const PLACES_DETAILS: &str = r#"{"status":"OK","result":{"place_id":"p1","name":"Joe's BBQ","rating":4.6,"user_ratings_total":120,"types":["restaurant"],"takeout":true}}"#;
pub const PLACES_NONE: &str = r#"{"status":"ZERO_RESULTS","results":[]}"#;

pub const SEARCH_RESULTS: &str = r#"
<table>
<tr><td><a href="/inspect.nsf/f1/Facility?OpenDocument">Joe's BBQ</a></td><td>3002 W 47th Ave</td></tr>
</table>
"#;

pub const NO_RESULTS: &str = "<p>No documents found</p>";

/// Facility page with one recent inspection: 4 critical violations
pub const FACILITY_TABLE: &str = r#"
<table>
<tr><td>Date</td><td>Type</td><td>Violations</td></tr>
<tr><td><a href="i1/Inspection?OpenDocument">02/01/2025</a></td><td>Routine</td><td>4 Critical, 0 Non-Critical</td></tr>
</table>
"#;

/// Facility page that only links to detail pages
pub const FACILITY_LINKS_ONLY: &str = r#"
<div>Inspections:
<a href="d1/Inspection?OpenDocument">View</a>
</div>
"#;

pub const DETAIL_PAGE: &str = r#"
<html><body>
<p>Inspection Date: 01/15/2025</p>
<p>Inspection Type: Routine</p>
<ul><li>Critical: Handwashing sink blocked</li><li>Non-Critical: Floor tiles cracked</li></ul>
</body></html>
"#;

struct Route {
    pattern: String,
    response: Result<String, FetchError>,
    delay: Duration,
}

/// In-memory transport that answers by URL substring and records every request.
///
/// Routes are tried in insertion order; unknown URLs are answered with NotFound.
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn route(self: Arc<Self>, pattern: &str, body: &str) -> Arc<Self> {
        self.route_result(pattern, Ok(body.to_string()), Duration::ZERO)
    }

    pub fn route_slow(self: Arc<Self>, pattern: &str, body: &str, delay: Duration) -> Arc<Self> {
        self.route_result(pattern, Ok(body.to_string()), delay)
    }

    pub fn fail(self: Arc<Self>, pattern: &str, error: FetchError) -> Arc<Self> {
        self.route_result(pattern, Err(error), Duration::ZERO)
    }

    fn route_result(self: Arc<Self>, pattern: &str, response: Result<String, FetchError>, delay: Duration) -> Arc<Self> {
        self.routes.lock().unwrap().push(Route {
            pattern: pattern.to_string(),
            response,
            delay,
        });
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn calls_to(&self, pattern: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.contains(pattern))
            .count()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &Request) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(request.clone());

        let (response, delay) = {
            let routes = self.routes.lock().unwrap();
            match routes.iter().find(|r| request.url.contains(&r.pattern)) {
                Some(route) => (route.response.clone(), route.delay),
                None => (Err(FetchError::NotFound(request.url.clone())), Duration::ZERO),
            }
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        response
    }
}

fn jurisdiction(name: &str, base: &str, cities: &[&str], priority: u32) -> JurisdictionConfig {
    JurisdictionConfig {
        name: name.to_string(),
        base_url: base.to_string(),
        search_url: format!("{}/Search?OpenForm", base),
        city_patterns: cities.iter().map(|c| c.to_string()).collect(),
        priority,
        facility_link: r"Facility\?OpenDocument".to_string(),
        inspection_link: r"Inspection\?OpenDocument".to_string(),
    }
}

/// Config with fast limits, short retries and two test portals
pub fn test_config() -> Config {
    let mut config = Config::default();

    config.places.endpoint = "http://places.test/api".to_string();
    config.places.api_key = Some("test-key".to_string());
    config.places.rate_limit = "1ms".to_string();
    config.places.retry.base_delay = "1ms".to_string();

    config.inspections.jurisdictions = vec![
        jurisdiction("Kansas City MO", KC_BASE, &["kansas city"], 10),
        jurisdiction("Johnson County KS", JOCO_BASE, &["olathe"], 0),
    ];
    config.inspections.rate_limit = "1ms".to_string();
    config.inspections.retry.base_delay = "1ms".to_string();

    config
}

pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

pub fn orchestrator(
    config: &Config,
    places: Arc<ScriptedTransport>,
    portals: Arc<ScriptedTransport>,
) -> EnrichmentOrchestrator {
    let fusion = ScoreFusionEngine::new(as_of(), &ScoringConfig::default());
    EnrichmentOrchestrator::from_config(config, places, portals, ResultCache::in_memory(), fusion).unwrap()
}

/// Places transport that knows Joe's BBQ
pub fn places_transport() -> Arc<ScriptedTransport> {
    ScriptedTransport::new()
        .route("/textsearch/json", PLACES_SEARCH)
        .route("/details/json", PLACES_DETAILS)
}

/// Portal transport where Kansas City lists Joe's BBQ with a failing inspection
pub fn portal_transport() -> Arc<ScriptedTransport> {
    ScriptedTransport::new()
        .route("kc.test/inspect.nsf/Search", SEARCH_RESULTS)
        .route("f1/Facility", FACILITY_TABLE)
        .route("joco.test/inspect.nsf/Search", NO_RESULTS)
}
