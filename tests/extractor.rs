mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use plate_score::cache::ResultCache;
use plate_score::config::{InspectionsConfig, TieBreak};
use plate_score::enrich::{facility_grade, inspection_extractor};
use plate_score::error::FetchError;
use plate_score::inspection::InspectionRecordExtractor;
use plate_score::ratelimit::RateLimiter;
use plate_score::transport::Method;

fn extractor(config: &InspectionsConfig, portals: Arc<ScriptedTransport>) -> InspectionRecordExtractor {
    InspectionRecordExtractor::new(
        config,
        portals,
        Arc::new(RateLimiter::new("inspections", Duration::from_millis(1))),
        ResultCache::in_memory(),
        Duration::from_secs(3600),
    )
    .unwrap()
}

const KC_ADDRESS: &str = "3002 W 47th Ave, Kansas City, MO 64111";

#[tokio::test]
async fn test_table_history_is_extracted() {
    let config = test_config().inspections;
    let portals = portal_transport();
    let records = extractor(&config, portals.clone())
        .extract("Joe's BBQ", KC_ADDRESS)
        .await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].date, "02/01/2025");
    assert_eq!(records[0].critical_violations, 4);
    assert_eq!(records[0].noncritical_violations, 0);
    assert_eq!(records[0].jurisdiction, "Kansas City MO");

    let requests = portals.requests();
    assert_eq!(requests[0].method, Method::PostForm);
    assert_eq!(
        requests[0].param_value("Query"),
        Some(r#"[Facility_Name] contains "Joe's BBQ" AND [Street_Name] contains "W 47th Ave""#)
    );
    assert_eq!(requests[1].url, "http://kc.test/inspect.nsf/f1/Facility?OpenDocument");
}

#[tokio::test]
async fn test_detail_pages_are_used_when_no_table() {
    let config = test_config().inspections;
    let portals = ScriptedTransport::new()
        .route("kc.test/inspect.nsf/Search", SEARCH_RESULTS)
        .route("f1/Facility", FACILITY_LINKS_ONLY)
        .route("d1/Inspection", DETAIL_PAGE);

    let records = extractor(&config, portals.clone())
        .extract("Joe's BBQ", KC_ADDRESS)
        .await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].date, "01/15/2025");
    assert_eq!(records[0].critical_violations, 1);
    assert_eq!(records[0].noncritical_violations, 1);
    assert_eq!(records[0].inspection_type.as_deref(), Some("Routine"));
    assert_eq!(portals.calls_to("http://kc.test/inspect.nsf/d1/Inspection?OpenDocument"), 1);
}

#[tokio::test]
async fn test_matching_city_portal_is_searched_first() {
    let config = test_config().inspections;
    let portals = ScriptedTransport::new()
        .route("joco.test/inspect.nsf/Search", NO_RESULTS)
        .route("kc.test/inspect.nsf/Search", SEARCH_RESULTS)
        .route("f1/Facility", FACILITY_TABLE);

    let records = extractor(&config, portals.clone())
        .extract("Joe's BBQ", "12 Elm St, Olathe, KS")
        .await;

    // Olathe's portal has nothing; the prioritised Kansas City portal is tried next
    assert_eq!(records.len(), 1);
    let urls: Vec<String> = portals.requests().into_iter().map(|r| r.url).collect();
    assert!(urls[0].starts_with(JOCO_BASE));
    assert!(urls[1].starts_with(KC_BASE));
}

#[tokio::test]
async fn test_closest_address_tie_break_picks_matching_street() {
    let mut config = test_config().inspections;
    config.tie_break = TieBreak::ClosestAddress;
    let results = r#"
<table>
<tr><td><a href="/inspect.nsf/f9/Facility?OpenDocument">Joe's BBQ</a></td><td>800 Oak St</td></tr>
<tr><td><a href="/inspect.nsf/f1/Facility?OpenDocument">Joe's BBQ</a></td><td>3002 W 47th Ave</td></tr>
</table>
"#;
    let portals = ScriptedTransport::new()
        .route("kc.test/inspect.nsf/Search", results)
        .route("f1/Facility", FACILITY_TABLE);

    let records = extractor(&config, portals.clone())
        .extract("Joe's BBQ", KC_ADDRESS)
        .await;

    assert_eq!(records.len(), 1);
    assert_eq!(portals.calls_to("f9/Facility"), 0);
}

#[tokio::test]
async fn test_first_tie_break_takes_first_listing() {
    let config = test_config().inspections;
    let results = r#"
<table>
<tr><td><a href="/inspect.nsf/f9/Facility?OpenDocument">Joe's BBQ</a></td><td>800 Oak St</td></tr>
<tr><td><a href="/inspect.nsf/f1/Facility?OpenDocument">Joe's BBQ</a></td><td>3002 W 47th Ave</td></tr>
</table>
"#;
    let portals = ScriptedTransport::new().route("kc.test/inspect.nsf/Search", results);

    let records = extractor(&config, portals.clone())
        .extract("Joe's BBQ", KC_ADDRESS)
        .await;

    assert!(records.is_empty());
    assert_eq!(portals.calls_to("f9/Facility"), 1);
}

#[tokio::test]
async fn test_conclusive_empty_result_is_cached() {
    let config = test_config().inspections;
    let portals = ScriptedTransport::new().route("/Search", NO_RESULTS);
    let extractor = extractor(&config, portals.clone());

    assert!(extractor.extract("Nowhere Diner", KC_ADDRESS).await.is_empty());
    let calls = portals.calls();
    assert!(extractor.extract("Nowhere Diner", KC_ADDRESS).await.is_empty());
    assert_eq!(portals.calls(), calls);
}

#[tokio::test]
async fn test_failed_detail_page_is_not_cached_as_empty_history() {
    let config = test_config().inspections;
    let portals = ScriptedTransport::new()
        .route("kc.test/inspect.nsf/Search", SEARCH_RESULTS)
        .route("f1/Facility", FACILITY_LINKS_ONLY)
        .fail("d1/Inspection", FetchError::Transient("503".to_string()));
    let extractor = extractor(&config, portals.clone());

    assert!(extractor.extract("Joe's BBQ", KC_ADDRESS).await.is_empty());
    // search, facility page, three attempts at the detail page
    assert_eq!(portals.calls(), 5);

    assert!(extractor.extract("Joe's BBQ", KC_ADDRESS).await.is_empty());
    assert_eq!(portals.calls(), 10);
}

#[tokio::test]
async fn test_missing_detail_page_is_conclusive() {
    let config = test_config().inspections;
    let portals = ScriptedTransport::new()
        .route("kc.test/inspect.nsf/Search", SEARCH_RESULTS)
        .route("f1/Facility", FACILITY_LINKS_ONLY);
    let extractor = extractor(&config, portals.clone());

    assert!(extractor.extract("Joe's BBQ", KC_ADDRESS).await.is_empty());
    let calls = portals.calls();
    assert!(extractor.extract("Joe's BBQ", KC_ADDRESS).await.is_empty());
    assert_eq!(portals.calls(), calls);
}

#[tokio::test]
async fn test_health_grade_needs_no_places_key() {
    let mut config = test_config();
    config.places.api_key = None;
    let extractor = inspection_extractor(&config, portal_transport(), ResultCache::in_memory()).unwrap();

    let grade = facility_grade(&extractor, "Joe's BBQ", KC_ADDRESS, config.inspections.date_fallback)
        .await
        .expect("health grade");
    assert_eq!(grade.letter_grade, "F");
    assert_eq!(grade.jurisdiction, "Kansas City MO");
}
