mod common;

use std::time::Duration;

use common::*;
use plate_score::enrich::BusinessEntity;
use plate_score::error::FetchError;
use plate_score::scoring::BasePrediction;

fn joes() -> BusinessEntity {
    BusinessEntity::new("Joe's BBQ", "3002 W 47th Ave, Kansas City, MO 64111")
}

#[tokio::test]
async fn test_enrich_combines_amenity_and_health() {
    let config = test_config();
    let orchestrator = orchestrator(&config, places_transport(), portal_transport());

    let outcome = orchestrator
        .enrich(&joes(), &BasePrediction::new(4.8, 0.9, "v1"))
        .await;

    let amenity = outcome.amenity.as_ref().expect("amenity record");
    assert_eq!(amenity.rating, Some(4.6));
    assert_eq!(amenity.amenities.takeout, Some(true));

    let health = outcome.health.as_ref().expect("health grade");
    assert_eq!(health.letter_grade, "F");
    assert_eq!(health.total_inspections, 1);
    assert_eq!(health.jurisdiction, "Kansas City MO");
    assert_eq!(health.last_inspection_date.as_deref(), Some("02/01/2025"));

    // 1.5 for the grade plus 0.3 for average critical >= 2, full weight for a 28 day old inspection
    assert!((outcome.score.penalty_applied - 1.8).abs() < 1e-9);
    assert!((outcome.score.final_rating - 3.0).abs() < 1e-9);
    assert_eq!(outcome.score.final_grade, "C-");
    assert!(!outcome.amenity_timed_out);
    assert!(!outcome.health_timed_out);
}

#[tokio::test]
async fn test_second_enrich_makes_no_outbound_calls() {
    let config = test_config();
    let places = places_transport();
    let portals = portal_transport();
    let orchestrator = orchestrator(&config, places.clone(), portals.clone());
    let base = BasePrediction::new(4.8, 0.9, "v1");

    let first = orchestrator.enrich(&joes(), &base).await;
    let calls = (places.calls(), portals.calls());
    assert_eq!(calls, (2, 2));

    let second = orchestrator.enrich(&joes(), &base).await;
    assert_eq!((places.calls(), portals.calls()), calls);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_portal_failure_leaves_amenity_and_base_rating() {
    let config = test_config();
    let portals = ScriptedTransport::new().fail(
        "kc.test",
        FetchError::Transient("connection reset".to_string()),
    );
    let orchestrator = orchestrator(&config, places_transport(), portals.clone());

    let outcome = orchestrator
        .enrich(&joes(), &BasePrediction::new(4.2, 0.8, "v1"))
        .await;

    assert!(outcome.amenity.is_some());
    assert!(outcome.health.is_none());
    assert!(!outcome.health_timed_out);
    assert_eq!(outcome.score.final_rating, 4.2);
    assert_eq!(outcome.score.penalty_applied, 0.0);
    // Retried up to the configured attempts
    assert_eq!(portals.calls(), 3);
}

#[tokio::test]
async fn test_degraded_health_lookup_is_not_cached() {
    let config = test_config();
    let portals = ScriptedTransport::new().fail(
        "kc.test",
        FetchError::Transient("503".to_string()),
    );
    let orchestrator = orchestrator(&config, places_transport(), portals.clone());
    let base = BasePrediction::new(4.2, 0.8, "v1");

    orchestrator.enrich(&joes(), &base).await;
    let after_first = portals.calls();
    orchestrator.enrich(&joes(), &base).await;
    assert_eq!(portals.calls(), after_first * 2);
}

#[tokio::test]
async fn test_slow_amenity_lookup_times_out_alone() {
    let mut config = test_config();
    config.orchestrator.amenity_timeout = "50ms".to_string();
    let places = ScriptedTransport::new()
        .route_slow("/textsearch/json", PLACES_SEARCH, Duration::from_millis(500))
        .route("/details/json", PLACES_DETAILS);
    let orchestrator = orchestrator(&config, places, portal_transport());

    let outcome = orchestrator
        .enrich(&joes(), &BasePrediction::new(4.8, 0.9, "v1"))
        .await;

    assert!(outcome.amenity_timed_out);
    assert!(outcome.amenity.is_none());
    assert!(!outcome.health_timed_out);
    assert_eq!(outcome.health.as_ref().map(|h| h.letter_grade.as_str()), Some("F"));
    assert_eq!(outcome.score.final_grade, "C-");
}

#[tokio::test]
async fn test_unknown_business_keeps_base_prediction() {
    let config = test_config();
    let places = ScriptedTransport::new().route("/textsearch/json", PLACES_NONE);
    let portals = ScriptedTransport::new().route("/Search", NO_RESULTS);
    let orchestrator = orchestrator(&config, places, portals);

    let entity = BusinessEntity::new("Nowhere Diner", "1 Main St, Kansas City, MO");
    let outcome = orchestrator
        .enrich(&entity, &BasePrediction::new(4.5, 0.7, "v1"))
        .await;

    assert!(outcome.amenity.is_none());
    assert!(outcome.health.is_none());
    assert_eq!(outcome.score.final_rating, 4.5);
    assert_eq!(outcome.score.final_grade, "A");
}

#[tokio::test]
async fn test_batch_preserves_input_order() {
    let mut config = test_config();
    config.orchestrator.workers = 2;
    let orchestrator = orchestrator(&config, places_transport(), portal_transport());

    let entities = vec![
        (joes(), BasePrediction::new(4.8, 0.9, "v1")),
        (
            BusinessEntity::new("Cafe Uno", "9 Elm St, Olathe, KS"),
            BasePrediction::new(3.9, 0.6, "v1"),
        ),
        (
            BusinessEntity::new("Taco Stand", "44 Oak St, Kansas City, MO"),
            BasePrediction::new(2.6, 0.5, "v1"),
        ),
    ];

    let outcomes = orchestrator.enrich_batch(entities).await;
    let names: Vec<&str> = outcomes.iter().map(|o| o.entity.name.as_str()).collect();
    assert_eq!(names, vec!["Joe's BBQ", "Cafe Uno", "Taco Stand"]);
    assert_eq!(outcomes[0].score.final_grade, "C-");
}

#[tokio::test]
async fn test_health_grade_absent_without_records() {
    let config = test_config();
    let portals = ScriptedTransport::new().route("/Search", NO_RESULTS);
    let orchestrator = orchestrator(&config, places_transport(), portals);

    assert!(orchestrator
        .health_grade("Joe's BBQ", "3002 W 47th Ave, Kansas City, MO")
        .await
        .is_none());
}

#[tokio::test]
async fn test_quota_counts_places_calls() {
    let config = test_config();
    let orchestrator = orchestrator(&config, places_transport(), portal_transport());

    orchestrator
        .enrich(&joes(), &BasePrediction::new(4.0, 0.5, "v1"))
        .await;

    let usage = orchestrator.quota();
    assert_eq!(usage.text_search_calls, 1);
    assert_eq!(usage.details_calls, 1);
    assert_eq!(usage.total_calls, 2);
}

#[tokio::test]
async fn test_entity_budget_cuts_off_slow_portal() {
    let mut config = test_config();
    config.orchestrator.entity_timeout = "100ms".to_string();
    let portals = ScriptedTransport::new()
        .route_slow("kc.test/inspect.nsf/Search", SEARCH_RESULTS, Duration::from_secs(5))
        .route("f1/Facility", FACILITY_TABLE);
    let orchestrator = orchestrator(&config, places_transport(), portals.clone());

    let started = std::time::Instant::now();
    let outcome = orchestrator
        .enrich(&joes(), &BasePrediction::new(4.0, 0.7, "v1"))
        .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(outcome.amenity.is_some());
    assert!(!outcome.amenity_timed_out);
    assert!(outcome.health_timed_out);
    assert!(outcome.health.is_none());
    assert_eq!(outcome.score.final_rating, 4.0);
    // The facility page was never requested
    assert_eq!(portals.calls_to("f1/Facility"), 0);
}
