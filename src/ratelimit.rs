use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces out grants to a single external service.
///
/// One instance per service, shared across every worker that talks to it.
/// There is no burst allowance: consecutive grants are always at least
/// `interval` apart, and the lock is held across the wait so concurrent
/// callers queue up behind each other.
#[derive(Debug)]
pub struct RateLimiter {
    service: String,
    interval: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(service: impl Into<String>, interval: Duration) -> Self {
        Self {
            service: service.into(),
            interval,
            last_grant: Mutex::new(None),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the service may be called again, then record the grant.
    pub async fn acquire(&self) {
        let mut last = self.last_grant.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                let wait = self.interval - elapsed;
                tracing::debug!(service = %self.service, ?wait, "Rate limiting");
                tokio::time::sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_acquire_does_not_wait() {
        let limiter = RateLimiter::new("test", Duration::from_millis(500));
        let start = std::time::Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_consecutive_acquires_are_spaced() {
        let interval = Duration::from_millis(40);
        let limiter = RateLimiter::new("test", interval);

        let start = std::time::Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }

        // N grants need at least (N - 1) intervals
        assert!(start.elapsed() >= interval * 4);
    }

    #[tokio::test]
    async fn test_concurrent_callers_are_serialized() {
        let interval = Duration::from_millis(30);
        let limiter = Arc::new(RateLimiter::new("shared", interval));

        let start = std::time::Instant::now();
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert!(start.elapsed() >= interval * 3);
    }

    #[tokio::test]
    async fn test_no_wait_after_interval_has_passed() {
        let interval = Duration::from_millis(200);
        let limiter = RateLimiter::new("test", interval);
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_millis(250)).await;

        let start = std::time::Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(150));
    }
}
