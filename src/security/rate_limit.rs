//! Per-caller rate limiting.
//!
//! Each caller key owns a token bucket of `capacity` tokens. Once a full
//! refill period has passed since the last refill the bucket is topped back up
//! to capacity in one step; there is no proportional trickle. A burst that
//! straddles a period boundary can therefore be admitted up to `2 * capacity`
//! times within just under two periods. That approximation is accepted.
//!
//! Buckets live in a sharded map: the refill-then-consume step for one key runs
//! under that key's shard lock, so concurrent requests for the same caller can
//! never over-consume, while unrelated callers rarely contend.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::security::identity::CallerIdentity;

/// Result of asking the limiter to admit a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Request admitted; `remaining` tokens are left in the current period.
    Allowed { remaining: u32 },
    /// Bucket is empty until the next refill.
    Limited { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

impl Bucket {
    fn full(capacity: u32) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: u32, period: Duration) -> Admission {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);

        if elapsed >= period {
            self.tokens = capacity;
            self.last_refill = now;
        }

        if self.tokens > 0 {
            self.tokens -= 1;
            Admission::Allowed {
                remaining: self.tokens,
            }
        } else {
            Admission::Limited {
                retry_after: period.saturating_sub(elapsed),
            }
        }
    }
}

/// Token bucket admission control keyed by caller identity.
pub struct TokenBucketLimiter {
    buckets: DashMap<String, Bucket>,
    capacity: u32,
    refill_period: Duration,
}

impl TokenBucketLimiter {
    pub fn new(capacity: u32, refill_period: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            capacity,
            refill_period,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.capacity, config.refill_period())
    }

    /// Admit or deny one request for `key`, creating its bucket on first use.
    pub fn check(&self, key: &str) -> Admission {
        if let Some(mut bucket) = self.buckets.get_mut(key) {
            return bucket.try_acquire(self.capacity, self.refill_period);
        }

        self.buckets
            .entry(key.to_owned())
            .or_insert_with(|| Bucket::full(self.capacity))
            .try_acquire(self.capacity, self.refill_period)
    }

    /// Boolean form of [`check`](Self::check).
    pub fn allow(&self, key: &str) -> bool {
        self.check(key).is_allowed()
    }

    /// Tokens currently left for `key`, if it has a bucket.
    pub fn tokens(&self, key: &str) -> Option<u32> {
        self.buckets.get(key).map(|b| b.tokens)
    }

    /// Number of callers seen so far.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_period(&self) -> Duration {
        self.refill_period
    }
}

/// Whole seconds for a `Retry-After` header, never zero.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

/// Middleware gating a route group on the caller's bucket.
///
/// Must run after the identity middleware has attached a [`CallerIdentity`].
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<TokenBucketLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(caller) = request.extensions().get::<CallerIdentity>().cloned() else {
        tracing::error!("Rate limiter reached without a caller identity");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    match limiter.check(caller.as_str()) {
        Admission::Allowed { remaining } => {
            tracing::trace!(caller = %caller, remaining, "Request admitted");
            next.run(request).await
        }
        Admission::Limited { retry_after } => {
            let secs = retry_after_secs(retry_after);
            tracing::warn!(caller = %caller, retry_after_secs = secs, "Rate limit exceeded");
            metrics::record_rate_limited();

            let mut response = (StatusCode::TOO_MANY_REQUESTS, "Too many requests").into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_admits_exactly_capacity_per_period() {
        let limiter = TokenBucketLimiter::new(5, PERIOD);

        for expected_remaining in (0..5).rev() {
            assert_eq!(
                limiter.check("alice"),
                Admission::Allowed { remaining: expected_remaining }
            );
        }
        assert!(!limiter.allow("alice"));
        assert!(!limiter.allow("alice"));
        assert_eq!(limiter.tokens("alice"), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_refill_after_period() {
        let limiter = TokenBucketLimiter::new(3, PERIOD);
        for _ in 0..3 {
            assert!(limiter.allow("bob"));
        }
        assert!(!limiter.allow("bob"));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!limiter.allow("bob"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(limiter.check("bob"), Admission::Allowed { remaining: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_capacity_two() {
        let limiter = TokenBucketLimiter::new(2, PERIOD);

        assert!(limiter.allow("u"));
        assert!(limiter.allow("u"));
        assert!(!limiter.allow("u"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.allow("u"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_boundary_burst_is_bounded_by_twice_capacity() {
        let limiter = TokenBucketLimiter::new(2, PERIOD);

        // Drain right before the boundary, then again right after it.
        assert!(limiter.allow("k"));
        assert!(limiter.allow("k"));

        tokio::time::advance(PERIOD).await;
        assert!(limiter.allow("k"));
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = TokenBucketLimiter::new(1, PERIOD);
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        assert!(limiter.allow("b"));
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_counts_down() {
        let limiter = TokenBucketLimiter::new(1, PERIOD);
        assert!(limiter.allow("c"));

        tokio::time::advance(Duration::from_millis(20_500)).await;
        match limiter.check("c") {
            Admission::Limited { retry_after } => {
                assert_eq!(retry_after, Duration::from_millis(39_500));
                assert_eq!(retry_after_secs(retry_after), 40);
            }
            other => panic!("expected Limited, got {:?}", other),
        }
    }

    #[test]
    fn test_retry_after_is_never_zero() {
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
        assert_eq!(retry_after_secs(Duration::from_secs(60)), 60);
    }

    #[test]
    fn test_concurrent_callers_never_over_consume() {
        let limiter = Arc::new(TokenBucketLimiter::new(50, Duration::from_secs(3600)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..20).filter(|_| limiter.allow("shared")).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
        assert_eq!(limiter.tokens("shared"), Some(0));
    }
}
