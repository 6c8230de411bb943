use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

use crate::cache::ResultCache;
use crate::config::{Config, DateFallback, OrchestratorConfig};
use crate::error::ConfigError;
use crate::inspection::{calculate_grade, HealthGrade, InspectionRecordExtractor};
use crate::places::{AmenityEnrichmentClient, AmenityRecord, QuotaUsage};
use crate::ratelimit::RateLimiter;
use crate::scoring::{AdjustedScore, BasePrediction, ScoreFusionEngine};
use crate::transport::Transport;

/// A food business to enrich
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessEntity {
    pub name: String,
    pub address: String,
}

impl BusinessEntity {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Everything learned about one entity.
///
/// Missing sub-results are `None`; the timeout flags tell a slow source
/// apart from one that had no data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentOutcome {
    pub entity: BusinessEntity,
    pub amenity: Option<AmenityRecord>,
    pub health: Option<HealthGrade>,
    pub score: AdjustedScore,
    pub amenity_timed_out: bool,
    pub health_timed_out: bool,
}

/// Time budgets for one entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Budgets {
    pub entity: Duration,
    pub amenity: Duration,
    pub health: Duration,
}

impl From<&OrchestratorConfig> for Budgets {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            entity: config.entity_budget(),
            amenity: config.amenity_budget(),
            health: config.health_budget(),
        }
    }
}

/// Extractor for the configured inspection portals, with its own rate limiter.
///
/// Needs no places credentials.
pub fn inspection_extractor(
    config: &Config,
    portals: Arc<dyn Transport>,
    cache: ResultCache,
) -> Result<InspectionRecordExtractor, ConfigError> {
    let limiter = Arc::new(RateLimiter::new(
        "inspections",
        config.inspections.rate_limit_interval(),
    ));
    InspectionRecordExtractor::new(
        &config.inspections,
        portals,
        limiter,
        cache,
        config.cache.freshness_window(),
    )
}

/// Health grade for a facility; `None` when no inspections were found.
pub async fn facility_grade(
    extractor: &InspectionRecordExtractor,
    name: &str,
    address: &str,
    date_fallback: DateFallback,
) -> Option<HealthGrade> {
    let records = extractor.extract(name, address).await;
    if records.is_empty() {
        return None;
    }

    let grade = calculate_grade(records, date_fallback);
    tracing::info!(
        facility = name,
        grade = %grade.letter_grade,
        jurisdiction = %grade.jurisdiction,
        "Calculated health grade"
    );
    Some(grade)
}

/// Runs amenity and health lookups for each entity and fuses the results.
///
/// The two lookups run concurrently and never affect each other: a failing
/// or slow source only leaves its own field empty.
pub struct EnrichmentOrchestrator {
    amenities: AmenityEnrichmentClient,
    inspections: InspectionRecordExtractor,
    fusion: ScoreFusionEngine,
    date_fallback: DateFallback,
    budgets: Budgets,
    workers: usize,
}

impl EnrichmentOrchestrator {
    pub fn new(
        amenities: AmenityEnrichmentClient,
        inspections: InspectionRecordExtractor,
        fusion: ScoreFusionEngine,
        date_fallback: DateFallback,
        budgets: Budgets,
        workers: usize,
    ) -> Self {
        Self {
            amenities,
            inspections,
            fusion,
            date_fallback,
            budgets,
            workers: workers.max(1),
        }
    }

    /// Wire up every component from configuration.
    ///
    /// `places` and `portals` carry requests to the places service and the
    /// inspection portals; each service gets its own rate limiter.
    pub fn from_config(
        config: &Config,
        places: Arc<dyn Transport>,
        portals: Arc<dyn Transport>,
        cache: ResultCache,
        fusion: ScoreFusionEngine,
    ) -> Result<Self, ConfigError> {
        let freshness = config.cache.freshness_window();

        let places_limiter = Arc::new(RateLimiter::new("places", config.places.rate_limit_interval()));
        let amenities =
            AmenityEnrichmentClient::new(&config.places, places, places_limiter, cache.clone(), freshness)?;

        let inspections = inspection_extractor(config, portals, cache)?;

        Ok(Self::new(
            amenities,
            inspections,
            fusion,
            config.inspections.date_fallback,
            Budgets::from(&config.orchestrator),
            config.orchestrator.workers,
        ))
    }

    pub fn quota(&self) -> QuotaUsage {
        self.amenities.quota()
    }

    /// Health grade for a facility; `None` when no inspections were found.
    pub async fn health_grade(&self, name: &str, address: &str) -> Option<HealthGrade> {
        facility_grade(&self.inspections, name, address, self.date_fallback).await
    }

    /// Enrich one entity within its time budget.
    pub async fn enrich(&self, entity: &BusinessEntity, base: &BasePrediction) -> EnrichmentOutcome {
        let start = Instant::now();
        let entity_deadline = start + self.budgets.entity;
        let amenity_deadline = entity_deadline.min(start + self.budgets.amenity);
        let health_deadline = entity_deadline.min(start + self.budgets.health);

        let (amenity, health) = tokio::join!(
            timeout_at(amenity_deadline, self.amenities.enrich(&entity.name, &entity.address)),
            timeout_at(health_deadline, self.health_grade(&entity.name, &entity.address)),
        );

        let amenity_timed_out = amenity.is_err();
        let health_timed_out = health.is_err();
        if amenity_timed_out {
            tracing::warn!(business = %entity.name, "Amenity lookup timed out");
        }
        if health_timed_out {
            tracing::warn!(business = %entity.name, "Health lookup timed out");
        }

        let amenity = amenity.ok().flatten();
        let health = health.ok().flatten();
        let score = self.fusion.fuse(base, health.as_ref());

        EnrichmentOutcome {
            entity: entity.clone(),
            amenity,
            health,
            score,
            amenity_timed_out,
            health_timed_out,
        }
    }

    /// Enrich many entities with at most `workers` in flight. Results keep input order.
    pub async fn enrich_batch(&self, entities: Vec<(BusinessEntity, BasePrediction)>) -> Vec<EnrichmentOutcome> {
        let total = entities.len();
        let mut pending = entities.into_iter().enumerate();
        let mut futures = FuturesUnordered::new();
        let mut outcomes: Vec<Option<EnrichmentOutcome>> = vec![None; total];

        let enrich_indexed = |index: usize, entity: BusinessEntity, base: BasePrediction| async move {
            let outcome = self.enrich(&entity, &base).await;
            (index, outcome)
        };

        for (index, (entity, base)) in pending.by_ref().take(self.workers) {
            futures.push(enrich_indexed(index, entity, base));
        }

        while let Some((index, outcome)) = futures.next().await {
            outcomes[index] = Some(outcome);
            if let Some((index, (entity, base))) = pending.next() {
                futures.push(enrich_indexed(index, entity, base));
            }
        }

        tracing::info!(entities = total, "Batch enrichment complete");
        outcomes.into_iter().flatten().collect()
    }
}
