use async_trait::async_trait;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;

use crate::error::{ConfigError, FetchError};
use crate::ratelimit::RateLimiter;

const USER_AGENT: &str = concat!("plate-score/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    PostForm,
}

/// An outbound request to a configured endpoint.
///
/// `params` become the query string for GET and the urlencoded body for POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            params: Vec::new(),
        }
    }

    pub fn post_form(url: impl Into<String>) -> Self {
        Self {
            method: Method::PostForm,
            url: url.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Value of the first parameter named `key`
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Issues a request and returns the textual response body.
///
/// Implementations classify failures into [`FetchError`] so callers can decide
/// whether a retry is worthwhile.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<String, FetchError>;
}

/// Production transport backed by reqwest
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &Request) -> Result<String, FetchError> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url).query(&request.params),
            Method::PostForm => self.client.post(&request.url).form(&request.params),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), body));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Transient(format!("Failed to read response body: {}", e)))
    }
}

/// Bounded retry schedule: `attempts` total tries, delay doubling from `base_delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delays between attempts: base, 2*base, 4*base, ...
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        // tokio-retry yields factor * 2^n, so half the base gives base on the first retry
        let factor = (self.base_delay.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .take(self.attempts.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Send `request` through `limiter`, retrying transient failures per `policy`.
///
/// Every attempt, including retries, waits for its own rate-limit grant.
pub async fn send_with_retry(
    transport: &dyn Transport,
    limiter: &RateLimiter,
    request: &Request,
    policy: &RetryPolicy,
) -> Result<String, FetchError> {
    RetryIf::spawn(
        policy.delays(),
        move || async move {
            limiter.acquire().await;
            let result = transport.send(request).await;
            if let Err(e) = &result {
                tracing::debug!(service = limiter.service(), url = %request.url, error = %e, "Request failed");
            }
            result
        },
        |e: &FetchError| e.is_retryable(),
    )
    .await
}
