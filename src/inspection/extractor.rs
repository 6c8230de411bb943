use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::jurisdiction::JurisdictionRouter;
use super::markup::{self, Link};
use super::strategies::{DetailPageStrategy, Extraction, ExtractionStrategy, StrategyContext, TableStrategy};
use super::types::InspectionRecord;
use crate::cache::ResultCache;
use crate::config::{InspectionsConfig, JurisdictionConfig, TieBreak};
use crate::error::{ConfigError, FetchError};
use crate::ratelimit::RateLimiter;
use crate::transport::{send_with_retry, Request, RetryPolicy, Transport};

static STREET: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\s+[^,]+").expect("street pattern"));
static HOUSE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\s+").expect("house number pattern"));

/// Street portion of an address with the house number removed.
///
/// "3002 W 47th Ave, Kansas City, MO" becomes "W 47th Ave". Addresses with
/// no numbered street yield `None`.
pub fn street_name(address: &str) -> Option<String> {
    let street = STREET.find(address)?.as_str();
    let street = HOUSE_NUMBER.replace(street, "").trim().to_string();
    if street.is_empty() {
        None
    } else {
        Some(street)
    }
}

/// Portal search expression for a facility.
pub fn search_query(facility_name: &str, street: Option<&str>) -> String {
    let mut query = format!(
        r#"[Facility_Name] contains "{}""#,
        facility_name.replace('"', "").trim()
    );
    if let Some(street) = street {
        query.push_str(&format!(
            r#" AND [Street_Name] contains "{}""#,
            street.replace('"', "").trim()
        ));
    }
    query
}

pub fn cache_key(facility_name: &str, address: &str) -> String {
    format!(
        "inspections:{}|{}",
        facility_name.trim().to_lowercase(),
        address.trim().to_lowercase()
    )
}

struct PortalLinks {
    facility: Regex,
    inspection: Regex,
}

/// Result of searching every routed portal
struct Lookup {
    records: Vec<InspectionRecord>,
    /// A portal or page could not be fetched, so the result is not conclusive
    degraded: bool,
}

/// Finds a facility on the inspection portals and extracts its history.
///
/// Never fails: unreachable portals and unreadable pages are logged and
/// produce an empty history. Conclusive results, including "no records",
/// are cached per (name, address); results touched by a failed fetch are not.
pub struct InspectionRecordExtractor {
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    cache: ResultCache,
    freshness: Duration,
    router: JurisdictionRouter,
    links: HashMap<String, PortalLinks>,
    retry: RetryPolicy,
    tie_break: TieBreak,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl InspectionRecordExtractor {
    pub fn new(
        config: &InspectionsConfig,
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
        cache: ResultCache,
        freshness: Duration,
    ) -> Result<Self, ConfigError> {
        let mut links = HashMap::new();
        for j in &config.jurisdictions {
            links.insert(j.name.clone(), compile_links(j)?);
        }

        Ok(Self {
            transport,
            limiter,
            cache,
            freshness,
            router: JurisdictionRouter::new(config.jurisdictions.clone()),
            links,
            retry: config.retry.policy(),
            tie_break: config.tie_break,
            strategies: vec![
                Box::new(TableStrategy),
                Box::new(DetailPageStrategy::new(config.max_detail_pages)),
            ],
        })
    }

    pub fn router(&self) -> &JurisdictionRouter {
        &self.router
    }

    /// Inspection history for a facility, most recent first as the portal lists it.
    pub async fn extract(&self, facility_name: &str, address: &str) -> Vec<InspectionRecord> {
        let key = cache_key(facility_name, address);
        if let Some(records) = self.cache.get::<Vec<InspectionRecord>>(&key, self.freshness) {
            tracing::debug!(facility = facility_name, records = records.len(), "Inspection cache hit");
            return records;
        }

        let lookup = self.lookup(facility_name, address).await;
        if !lookup.degraded {
            self.cache.put(&key, &lookup.records);
        } else if lookup.records.is_empty() {
            tracing::warn!(
                facility = facility_name,
                "Inspection portals unavailable; treating health data as absent"
            );
        } else {
            tracing::debug!(facility = facility_name, "Inspection history may be incomplete; not caching");
        }
        lookup.records
    }

    async fn lookup(&self, facility_name: &str, address: &str) -> Lookup {
        let street = street_name(address);
        let mut degraded = false;

        for jurisdiction in self.router.route(address) {
            let Some(links) = self.links.get(&jurisdiction.name) else {
                continue;
            };

            match self
                .search_portal(jurisdiction, links, facility_name, street.as_deref())
                .await
            {
                Ok(extraction) if !extraction.records.is_empty() => {
                    tracing::info!(
                        facility = facility_name,
                        jurisdiction = %jurisdiction.name,
                        records = extraction.records.len(),
                        "Found inspection history"
                    );
                    return Lookup {
                        records: extraction.records,
                        degraded: degraded || extraction.degraded,
                    };
                }
                Ok(extraction) => degraded |= extraction.degraded,
                Err(FetchError::NotFound(_)) => {}
                Err(e) => {
                    tracing::debug!(jurisdiction = %jurisdiction.name, error = %e, "Portal lookup failed");
                    degraded = true;
                }
            }
        }

        tracing::debug!(facility = facility_name, "No inspection data found in any jurisdiction");
        Lookup {
            records: Vec::new(),
            degraded,
        }
    }

    async fn search_portal(
        &self,
        jurisdiction: &JurisdictionConfig,
        links: &PortalLinks,
        facility_name: &str,
        street: Option<&str>,
    ) -> Result<Extraction, FetchError> {
        let request = Request::post_form(&jurisdiction.search_url)
            .param("SearchView", "")
            .param("Query", search_query(facility_name, street));
        tracing::debug!(jurisdiction = %jurisdiction.name, facility = facility_name, "Searching portal");

        let results = send_with_retry(self.transport.as_ref(), &self.limiter, &request, &self.retry).await?;
        let Some(href) = self.pick_facility(&results, &links.facility, street) else {
            return Ok(Extraction::default());
        };

        let facility_url = markup::absolute_url(&jurisdiction.base_url, &href);
        tracing::debug!(url = %facility_url, "Fetching facility page");
        let page = send_with_retry(
            self.transport.as_ref(),
            &self.limiter,
            &Request::get(&facility_url),
            &self.retry,
        )
        .await?;

        let ctx = StrategyContext {
            transport: self.transport.as_ref(),
            limiter: &self.limiter,
            retry: &self.retry,
            jurisdiction,
            inspection_link: &links.inspection,
        };
        let mut degraded = false;
        for strategy in &self.strategies {
            let extraction = strategy.extract(&page, &ctx).await;
            degraded |= extraction.degraded;
            if !extraction.records.is_empty() {
                tracing::debug!(
                    strategy = strategy.name(),
                    records = extraction.records.len(),
                    "Extracted inspections"
                );
                return Ok(Extraction {
                    records: extraction.records,
                    degraded,
                });
            }
        }

        Ok(Extraction {
            records: Vec::new(),
            degraded,
        })
    }

    /// Choose one facility link from a search results page.
    fn pick_facility(&self, results: &str, facility_link: &Regex, street: Option<&str>) -> Option<String> {
        let candidates = facility_candidates(results, facility_link);
        if candidates.len() > 1 {
            tracing::debug!(matches = candidates.len(), tie_break = ?self.tie_break, "Ambiguous facility search");
        }

        match (self.tie_break, street) {
            (TieBreak::ClosestAddress, Some(street)) => closest_to_street(&candidates, street),
            _ => candidates.into_iter().next().map(|c| c.link.href),
        }
    }
}

fn compile_links(j: &JurisdictionConfig) -> Result<PortalLinks, ConfigError> {
    let compile = |pattern: &str| {
        Regex::new(pattern).map_err(|e| {
            ConfigError::Invalid(format!("{}: bad link pattern '{}': {}", j.name, pattern, e))
        })
    };
    Ok(PortalLinks {
        facility: compile(&j.facility_link)?,
        inspection: compile(&j.inspection_link)?,
    })
}

/// A facility link plus the listing text around it
struct Candidate {
    link: Link,
    texts: Vec<String>,
}

fn facility_candidates(results: &str, facility_link: &Regex) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for row in markup::table_rows(results) {
        let cells = markup::row_cells(&row);
        for link in markup::links_matching(&row, facility_link) {
            let mut texts = vec![link.text.clone()];
            texts.extend(cells.iter().cloned());
            candidates.push(Candidate { link, texts });
        }
    }

    // Results that are not laid out as a table
    if candidates.is_empty() {
        candidates = markup::links_matching(results, facility_link)
            .into_iter()
            .map(|link| Candidate {
                texts: vec![link.text.clone()],
                link,
            })
            .collect();
    }

    candidates
}

fn closest_to_street(candidates: &[Candidate], street: &str) -> Option<String> {
    let street = street.to_lowercase();
    let mut best: Option<(&Candidate, f64)> = None;

    for candidate in candidates {
        let score = candidate
            .texts
            .iter()
            .map(|text| {
                let text = HOUSE_NUMBER.replace(text.trim(), "").to_lowercase();
                strsim::jaro_winkler(&text, &street)
            })
            .fold(0.0, f64::max);

        // Strictly greater keeps the earlier listing on ties
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }

    best.map(|(c, _)| c.link.href.clone())
}
