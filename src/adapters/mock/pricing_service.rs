use crate::domain::BookId;
use crate::ports::price_lookup::{PriceLookup, RemotePrice, Result};
use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Currency reported by the pricing service
pub const CURRENCY: &str = "EUR";

/// Failure raised by the chaos pricing service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChaosError {
    #[error("Forced failure triggered by fail=true parameter")]
    Forced,
    #[error("Scripted failure ({remaining} left)")]
    Scripted { remaining: u32 },
    #[error("Random failure occurred ({percent}% chaos simulation)")]
    Random { percent: u32 },
}

/// A failure rate outside `0.0..=1.0` (or NaN)
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("failure rate must be between 0 and 1, got {0}")]
pub struct InvalidFailureRate(pub f64);

/// Deterministic price of a book: 50.0 + (id mod 10) * 5.0
pub fn price_for(book_id: BookId) -> f64 {
    50.0 + book_id.value().rem_euclid(10) as f64 * 5.0
}

/// Chaos-injecting pricing service
///
/// Stands in for the remote pricing dependency. It fails on demand
/// (`set_force_failure`, `fail_next`) and at a background random rate, and
/// counts every call so tests can tell whether the dependency was contacted.
/// The standalone `pricing-service` binary serves the same logic over HTTP.
pub struct PricingService {
    failure_rate: f64,
    latency: Option<Duration>,
    force_failure: AtomicBool,
    scripted_failures: AtomicU32,
    calls: AtomicU32,
}

impl PricingService {
    /// A service that never fails unless told to
    pub fn new() -> Self {
        Self {
            failure_rate: 0.0,
            latency: None,
            force_failure: AtomicBool::new(false),
            scripted_failures: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    /// Fail randomly with the given probability
    pub fn with_failure_rate(mut self, rate: f64) -> std::result::Result<Self, InvalidFailureRate> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(InvalidFailureRate(rate));
        }
        self.failure_rate = rate;
        Ok(self)
    }

    /// Delay every lookup, e.g. to exceed a caller's timeout
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail every call while set
    pub fn set_force_failure(&self, fail: bool) {
        self.force_failure.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `count` calls, then recover
    pub fn fail_next(&self, count: u32) {
        self.scripted_failures.store(count, Ordering::SeqCst);
    }

    /// Number of lookups that reached this service
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Price a book, applying the configured chaos
    ///
    /// `fail` mirrors the `?fail=true` request parameter.
    pub fn quote(
        &self,
        book_id: BookId,
        fail: bool,
    ) -> std::result::Result<RemotePrice, ChaosError> {
        if fail || self.force_failure.load(Ordering::SeqCst) {
            return Err(ChaosError::Forced);
        }

        if let Ok(before) = self
            .scripted_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            return Err(ChaosError::Scripted {
                remaining: before - 1,
            });
        }

        if self.failure_rate > 0.0 && rand::thread_rng().r#gen::<f64>() < self.failure_rate {
            return Err(ChaosError::Random {
                percent: (self.failure_rate * 100.0).round() as u32,
            });
        }

        Ok(RemotePrice {
            price: price_for(book_id),
            currency: CURRENCY.to_string(),
        })
    }
}

impl Default for PricingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceLookup for PricingService {
    async fn fetch_price(&self, book_id: BookId) -> Result<RemotePrice> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        Ok(self.quote(book_id, false)?)
    }
}
