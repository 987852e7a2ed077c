//! Per-provider request spacing with backoff and a per-search budget.
//!
//! The only shared mutable state is the "next allowed request" instant of
//! each provider. Each provider has its own slot; the map of slots is only
//! locked long enough to look one up, and no lock is held across an await.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

use super::{IndexerConfig, IndexerError};

/// Limits applied to one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub min_interval: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub request_budget: u32,
}

impl RateLimitPolicy {
    pub fn from_config(config: &IndexerConfig) -> Self {
        Self {
            min_interval: Duration::from_millis(config.min_interval_ms),
            max_retries: config.max_retries,
            base_backoff: Duration::from_millis(config.backoff_ms),
            max_backoff: Duration::from_secs(60),
            request_budget: config.request_budget,
        }
    }

    /// Exponential backoff for the given zero-based retry attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(2),
            max_retries: 2,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            request_budget: 4,
        }
    }
}

/// Counts requests issued during one search call.
#[derive(Debug)]
pub struct RequestBudget {
    limit: u32,
    used: AtomicU32,
}

impl RequestBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            used: AtomicU32::new(0),
        }
    }

    /// Reserve one request. Returns false once the budget is spent.
    pub fn try_take(&self) -> bool {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < self.limit).then_some(used + 1)
            })
            .is_ok()
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[derive(Debug, Default)]
struct ProviderSlot {
    next_allowed: Mutex<Option<Instant>>,
}

/// Shared limiter keyed on provider identity.
#[derive(Debug, Default)]
pub struct RateLimiterPool {
    slots: RwLock<HashMap<String, Arc<ProviderSlot>>>,
}

impl RateLimiterPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, provider: &str) -> Arc<ProviderSlot> {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider)
        {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(provider.to_string()).or_default())
    }

    /// Reserve the next request slot for `provider` and return how long the
    /// caller has to wait before sending.
    fn reserve(&self, provider: &str, min_interval: Duration) -> Duration {
        let slot = self.slot(provider);
        let mut next = slot
            .next_allowed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let start = match *next {
            Some(at) if at > now => at,
            _ => now,
        };
        *next = Some(start + min_interval);
        start - now
    }

    /// Wait until a request to `provider` is allowed.
    pub async fn acquire(&self, provider: &str, min_interval: Duration) {
        let wait = self.reserve(provider, min_interval);
        if !wait.is_zero() {
            debug!(indexer = provider, wait_ms = wait.as_millis() as u64, "Throttling request");
            sleep(wait).await;
        }
    }

    /// Push the provider's next slot out, e.g. after a Retry-After.
    pub fn defer(&self, provider: &str, delay: Duration) {
        let slot = self.slot(provider);
        let mut next = slot
            .next_allowed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let candidate = Instant::now() + delay;
        if next.map(|at| at < candidate).unwrap_or(true) {
            *next = Some(candidate);
        }
    }

    /// Run one logical request against `provider`, spacing it from other
    /// requests, retrying transient failures with exponential backoff and
    /// charging every attempt to `budget`.
    pub async fn run<T, F, Fut>(
        &self,
        provider: &str,
        policy: &RateLimitPolicy,
        budget: &RequestBudget,
        mut op: F,
    ) -> Result<T, IndexerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexerError>>,
    {
        let mut attempt = 0u32;
        loop {
            if !budget.try_take() {
                return Err(IndexerError::BudgetExhausted {
                    indexer: provider.to_string(),
                    budget: budget.limit(),
                });
            }
            self.acquire(provider, policy.min_interval).await;

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < policy.max_retries => {
                    let mut delay = policy.backoff(attempt);
                    if let IndexerError::RateLimited {
                        retry_after_ms: Some(ms),
                        ..
                    } = &e
                    {
                        delay = delay.max(Duration::from_millis(*ms));
                        self.defer(provider, delay);
                    }
                    debug!(
                        indexer = provider,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after transient failure"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
