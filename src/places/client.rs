use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::parse::{self, DETAIL_FIELDS};
use super::quota::{QuotaTracker, QuotaUsage};
use super::types::{AmenityRecord, VenueId};
use crate::cache::ResultCache;
use crate::config::PlacesConfig;
use crate::credentials::resolve_places_key;
use crate::error::{ConfigError, FetchError};
use crate::ratelimit::RateLimiter;
use crate::transport::{send_with_retry, Request, RetryPolicy, Transport};

/// Resolves venues and fetches their amenity data from the places service.
///
/// Lookups consult the shared cache first. Conclusive answers (a record, or
/// "no such venue") are cached; transient failures are retried with backoff
/// and then reported as "no data" without being cached.
pub struct AmenityEnrichmentClient {
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    cache: ResultCache,
    freshness: Duration,
    endpoint: String,
    api_key: String,
    region: String,
    retry: RetryPolicy,
    quota: QuotaTracker,
}

impl AmenityEnrichmentClient {
    /// Build a client; fails when no API key is configured.
    pub fn new(
        config: &PlacesConfig,
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
        cache: ResultCache,
        freshness: Duration,
    ) -> Result<Self, ConfigError> {
        let api_key = resolve_places_key(config)?;
        Ok(Self {
            transport,
            limiter,
            cache,
            freshness,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            region: config.region.clone(),
            retry: config.retry.policy(),
            quota: QuotaTracker::new(),
        })
    }

    pub fn quota(&self) -> QuotaUsage {
        self.quota.usage()
    }

    /// Find the venue id for a business, if the service knows it.
    pub async fn resolve(&self, name: &str, address: &str) -> Option<VenueId> {
        if name.trim().is_empty() || address.trim().is_empty() {
            tracing::warn!("Empty business name or address provided for venue search");
            return None;
        }

        let key = format!(
            "places:resolve:{}|{}",
            name.trim().to_lowercase(),
            address.trim().to_lowercase()
        );
        let query = format!("{} {}", name.trim(), address.trim());
        let request = Request::get(format!("{}/textsearch/json", self.endpoint))
            .param("query", &query)
            .param("type", "restaurant")
            .param("region", &self.region)
            .param("key", &self.api_key);

        self.cached_lookup(&key, request, QuotaTracker::record_text_search, |body| {
            parse::parse_search(body)
        })
        .await
    }

    /// Amenity record for a resolved venue.
    pub async fn fetch(&self, venue_id: &VenueId) -> Option<AmenityRecord> {
        let key = format!("places:details:{}", venue_id);
        let request = Request::get(format!("{}/details/json", self.endpoint))
            .param("place_id", venue_id.as_str())
            .param("fields", DETAIL_FIELDS)
            .param("key", &self.api_key);

        self.cached_lookup(&key, request, QuotaTracker::record_details, |body| {
            parse::parse_details(body, venue_id, Utc::now())
        })
        .await
    }

    /// Resolve then fetch.
    pub async fn enrich(&self, name: &str, address: &str) -> Option<AmenityRecord> {
        let Some(venue_id) = self.resolve(name, address).await else {
            tracing::info!(business = name, "No venue found");
            return None;
        };

        let record = self.fetch(&venue_id).await;
        if record.is_some() {
            tracing::info!(business = name, venue = %venue_id, "Enriched venue data");
        }
        record
    }

    async fn cached_lookup<T, F>(
        &self,
        key: &str,
        request: Request,
        record_call: fn(&QuotaTracker),
        parse: F,
    ) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&str) -> Result<T, FetchError>,
    {
        if let Some(cached) = self.cache.get::<Option<T>>(key, self.freshness) {
            tracing::debug!(key, "Places cache hit");
            return cached;
        }

        let metered = Metered {
            inner: self.transport.as_ref(),
            quota: &self.quota,
            record_call,
        };
        let result = send_with_retry(&metered, &self.limiter, &request, &self.retry).await;

        match result.and_then(|body| parse(&body)) {
            Ok(value) => {
                let value = Some(value);
                self.cache.put(key, &value);
                value
            }
            Err(FetchError::NotFound(reason)) => {
                tracing::debug!(key, reason = %reason, "Not found in places service");
                self.cache.put(key, &None::<T>);
                None
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Places lookup failed; continuing without amenity data");
                None
            }
        }
    }
}

/// Counts every attempt the places service answered, retries included
struct Metered<'a> {
    inner: &'a dyn Transport,
    quota: &'a QuotaTracker,
    record_call: fn(&QuotaTracker),
}

#[async_trait]
impl<'a> Transport for Metered<'a> {
    async fn send(&self, request: &Request) -> Result<String, FetchError> {
        let result = self.inner.send(request).await;
        if !matches!(result, Err(FetchError::Transient(_))) {
            (self.record_call)(self.quota);
        }
        result
    }
}
