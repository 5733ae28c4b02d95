use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::error::GatewayError;
use crate::models::{Balance, OrderResult, OrderSide, OrderStatus, PriceBar};

// Type alias for the rate limiter to simplify signatures
type GatewayRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Exchange capabilities the agent consumes
///
/// Every call can fail with [`GatewayError::Connectivity`] (retry with
/// backoff) or [`GatewayError::Auth`] (fatal).
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Most recent `count` bars, oldest first. The last one may still be
    /// forming.
    async fn fetch_recent_bars(
        &self,
        pair: &str,
        timeframe: &str,
        count: usize,
    ) -> Result<Vec<PriceBar>, GatewayError>;

    async fn fetch_balance(&self) -> Result<Balance, GatewayError>;

    /// Market order tagged with a caller-chosen id, so that an ambiguous
    /// failure can be resolved with [`ExchangeGateway::order_status`]
    async fn place_market_order(
        &self,
        side: OrderSide,
        quantity: f64,
        client_order_id: &str,
    ) -> Result<OrderResult, GatewayError>;

    /// Cancel an order that has not filled yet, by the id it was placed with
    async fn cancel_order(&self, client_order_id: &str) -> Result<(), GatewayError>;

    async fn order_status(&self, client_order_id: &str) -> Result<OrderStatus, GatewayError>;
}

#[async_trait]
impl<G: ExchangeGateway + ?Sized> ExchangeGateway for Arc<G> {
    async fn fetch_recent_bars(
        &self,
        pair: &str,
        timeframe: &str,
        count: usize,
    ) -> Result<Vec<PriceBar>, GatewayError> {
        (**self).fetch_recent_bars(pair, timeframe, count).await
    }

    async fn fetch_balance(&self) -> Result<Balance, GatewayError> {
        (**self).fetch_balance().await
    }

    async fn place_market_order(
        &self,
        side: OrderSide,
        quantity: f64,
        client_order_id: &str,
    ) -> Result<OrderResult, GatewayError> {
        (**self)
            .place_market_order(side, quantity, client_order_id)
            .await
    }

    async fn cancel_order(&self, client_order_id: &str) -> Result<(), GatewayError> {
        (**self).cancel_order(client_order_id).await
    }

    async fn order_status(&self, client_order_id: &str) -> Result<OrderStatus, GatewayError> {
        (**self).order_status(client_order_id).await
    }
}

/// Wraps a gateway so every call waits for a slot in a per-minute quota
pub struct RateLimitedGateway<G> {
    inner: G,
    rate_limiter: Arc<GatewayRateLimiter>,
}

impl<G: ExchangeGateway> RateLimitedGateway<G> {
    pub fn new(inner: G, requests_per_minute: u32) -> Self {
        let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(rpm);
        Self {
            inner,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: ExchangeGateway> ExchangeGateway for RateLimitedGateway<G> {
    async fn fetch_recent_bars(
        &self,
        pair: &str,
        timeframe: &str,
        count: usize,
    ) -> Result<Vec<PriceBar>, GatewayError> {
        self.rate_limiter.until_ready().await;
        self.inner.fetch_recent_bars(pair, timeframe, count).await
    }

    async fn fetch_balance(&self) -> Result<Balance, GatewayError> {
        self.rate_limiter.until_ready().await;
        self.inner.fetch_balance().await
    }

    async fn place_market_order(
        &self,
        side: OrderSide,
        quantity: f64,
        client_order_id: &str,
    ) -> Result<OrderResult, GatewayError> {
        self.rate_limiter.until_ready().await;
        self.inner
            .place_market_order(side, quantity, client_order_id)
            .await
    }

    async fn cancel_order(&self, client_order_id: &str) -> Result<(), GatewayError> {
        self.rate_limiter.until_ready().await;
        self.inner.cancel_order(client_order_id).await
    }

    async fn order_status(&self, client_order_id: &str) -> Result<OrderStatus, GatewayError> {
        self.rate_limiter.until_ready().await;
        self.inner.order_status(client_order_id).await
    }
}

/// Bounded exponential backoff for connectivity failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based): base, 2x base, 4x base...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `op` until it succeeds, fails with a non-retriable error, or the
/// policy's attempts are spent
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retriable() && attempt < max_attempts => {
                let backoff = policy.backoff(attempt);
                tracing::warn!(
                    "{} failed: {}, retrying in {:?} (attempt {}/{})",
                    what,
                    e,
                    backoff,
                    attempt,
                    max_attempts
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retriable() {
                    tracing::warn!("{} failed after {} attempts: {}", what, attempt, e);
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_connectivity() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "fetch", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(GatewayError::Connectivity("timeout".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        let value = tokio_test::assert_ok!(result);
        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(3), "fetch", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::Connectivity("down".into())) }
        })
        .await;

        assert_eq!(result, Err(GatewayError::Connectivity("down".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(5), "balance", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::Auth("bad key".into())) }
        })
        .await;

        assert!(result.unwrap_err().is_fatal());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
