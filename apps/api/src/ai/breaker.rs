//! Circuit breaker guarding calls to one vendor dependency.
//!
//! ```text
//! CLOSED    -> OPEN       consecutive_failures >= failure_threshold
//! OPEN      -> HALF_OPEN  first execute() at least `timeout` after opening
//! HALF_OPEN -> CLOSED     consecutive_successes >= success_threshold
//! HALF_OPEN -> OPEN       any failure
//! ```
//!
//! The OPEN -> HALF_OPEN flip is lazy: there is no background timer.
//! Consecutive counters restart from zero on every state change.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    /// How long the breaker stays OPEN before admitting a probe.
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerStats {
    pub failures: u64,
    pub successes: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_requests: u64,
    pub rejected_requests: u64,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
}

/// Point-in-time view of a breaker for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    #[serde(flatten)]
    pub stats: CircuitBreakerStats,
}

#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit '{name}' is open")]
    Open { name: String },

    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    opened_at: Option<Instant>,
    stats: CircuitBreakerStats,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            opened_at: None,
            stats: CircuitBreakerStats::default(),
        }
    }

    fn transition(&mut self, name: &str, to: CircuitState) {
        let from = self.state;
        self.state = to;
        self.stats.consecutive_failures = 0;
        self.stats.consecutive_successes = 0;
        self.opened_at = match to {
            CircuitState::Open => Some(Instant::now()),
            _ => None,
        };
        match to {
            CircuitState::Open => warn!(breaker = name, ?from, "circuit opened"),
            _ => info!(breaker = name, ?from, ?to, "circuit state changed"),
        }
    }

    fn open_elapsed(&self, timeout: Duration) -> bool {
        self.opened_at
            .map(|t| t.elapsed() >= timeout)
            .unwrap_or(true)
    }
}

pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner::new()),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Whether the next `execute()` would actually run its unit of work.
    pub fn is_available(&self) -> bool {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => inner.open_elapsed(self.config.timeout),
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            stats: inner.stats.clone(),
        }
    }

    /// Forces CLOSED and zeroes every counter. Never called automatically.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        *inner = Inner::new();
        info!(breaker = %self.name, "circuit reset");
    }

    /// Runs `f` unless the circuit is open. The wrapped error is returned
    /// untouched; only outright rejection produces `BreakerError::Open`.
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.admit()?;

        // lock is not held across the call
        match f().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    fn admit<E>(&self) -> Result<(), BreakerError<E>> {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::Open {
            if inner.open_elapsed(self.config.timeout) {
                inner.transition(&self.name, CircuitState::HalfOpen);
            } else {
                inner.stats.rejected_requests += 1;
                return Err(BreakerError::Open {
                    name: self.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        let stats = &mut inner.stats;
        stats.successes += 1;
        stats.total_requests += 1;
        stats.consecutive_successes += 1;
        stats.consecutive_failures = 0;
        stats.last_success_time = Some(Utc::now());

        if inner.state == CircuitState::HalfOpen
            && inner.stats.consecutive_successes >= self.config.success_threshold
        {
            inner.transition(&self.name, CircuitState::Closed);
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        let stats = &mut inner.stats;
        stats.failures += 1;
        stats.total_requests += 1;
        stats.consecutive_failures += 1;
        stats.consecutive_successes = 0;
        stats.last_failure_time = Some(Utc::now());

        let state = inner.state;
        match state {
            CircuitState::HalfOpen => inner.transition(&self.name, CircuitState::Open),
            CircuitState::Closed
                if inner.stats.consecutive_failures >= self.config.failure_threshold =>
            {
                inner.transition(&self.name, CircuitState::Open)
            }
            // a late failure from a call admitted before the circuit opened
            // does not extend the open window
            _ => {}
        }
    }
}

/// Aggregate health across every breaker in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// One breaker per named dependency. Constructed once and injected; there is
/// no global instance.
pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return Arc::clone(existing.value());
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config)))
            .value()
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|b| Arc::clone(b.value()))
    }

    /// Snapshots of every breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<BreakerSnapshot> =
            self.breakers.iter().map(|b| b.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// `Degraded` if any breaker is OPEN.
    pub fn health(&self) -> HealthStatus {
        let any_open = self
            .breakers
            .iter()
            .any(|b| b.value().state() == CircuitState::Open);
        if any_open {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Operator escape hatch; nothing in the request path calls it.
    #[allow(dead_code)]
    pub fn reset_all(&self) {
        for breaker in self.breakers.iter() {
            breaker.value().reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::advance;

    fn config(failure_threshold: u32, success_threshold: u32, timeout_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            success_threshold,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    async fn fail(b: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        b.execute(|| async { Err::<(), _>("boom") }).await
    }

    async fn succeed(b: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        b.execute(|| async { Ok::<(), &'static str>(()) }).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_exactly_at_threshold() {
        let b = CircuitBreaker::new("mock", config(3, 2, 1000));
        fail(&b).await.unwrap_err();
        fail(&b).await.unwrap_err();
        assert_eq!(b.state(), CircuitState::Closed);
        fail(&b).await.unwrap_err();
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_consecutive_failures_do_not_open() {
        let b = CircuitBreaker::new("mock", config(3, 2, 1000));
        for _ in 0..5 {
            fail(&b).await.unwrap_err();
            fail(&b).await.unwrap_err();
            succeed(&b).await.unwrap();
        }
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.snapshot().stats.failures, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inner_error_is_passed_through() {
        let b = CircuitBreaker::new("mock", config(3, 2, 1000));
        match fail(&b).await {
            Err(BreakerError::Inner(e)) => assert_eq!(e, "boom"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_without_calling() {
        let b = CircuitBreaker::new("mock", config(1, 1, 1000));
        fail(&b).await.unwrap_err();

        let calls = AtomicUsize::new(0);
        let result = b
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), &'static str>(())
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Open { ref name }) if name == "mock"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let stats = b.snapshot().stats;
        assert_eq!(stats.rejected_requests, 1);
        assert_eq!(stats.total_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_recover_scenario() {
        let b = CircuitBreaker::new("anthropic", config(3, 2, 1000));
        for _ in 0..3 {
            fail(&b).await.unwrap_err();
        }
        assert_eq!(b.state(), CircuitState::Open);

        advance(Duration::from_millis(500)).await;
        assert!(!b.is_available());
        assert!(matches!(succeed(&b).await, Err(BreakerError::Open { .. })));

        advance(Duration::from_millis(600)).await;
        assert!(b.is_available());
        succeed(&b).await.unwrap();
        assert_eq!(b.state(), CircuitState::HalfOpen);
        succeed(&b).await.unwrap();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let b = CircuitBreaker::new("anthropic", config(3, 2, 1000));
        for _ in 0..3 {
            fail(&b).await.unwrap_err();
        }
        advance(Duration::from_millis(1100)).await;
        succeed(&b).await.unwrap();
        assert_eq!(b.state(), CircuitState::HalfOpen);
        fail(&b).await.unwrap_err();
        assert_eq!(b.state(), CircuitState::Open);

        // fresh open window starts at the reopening
        advance(Duration::from_millis(999)).await;
        assert!(!b.is_available());
        advance(Duration::from_millis(1)).await;
        assert!(b.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_requires_exact_success_threshold() {
        let b = CircuitBreaker::new("openai", config(1, 3, 100));
        // successes before opening must not count towards closing
        for _ in 0..5 {
            succeed(&b).await.unwrap();
        }
        fail(&b).await.unwrap_err();
        advance(Duration::from_millis(100)).await;

        succeed(&b).await.unwrap();
        succeed(&b).await.unwrap();
        assert_eq!(b.state(), CircuitState::HalfOpen);
        succeed(&b).await.unwrap();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_track_outcomes() {
        let b = CircuitBreaker::new("mock", config(5, 2, 1000));
        succeed(&b).await.unwrap();
        succeed(&b).await.unwrap();
        fail(&b).await.unwrap_err();

        let stats = b.snapshot().stats;
        assert_eq!(stats.successes, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.consecutive_failures, 1);
        assert_eq!(stats.consecutive_successes, 0);
        assert!(stats.last_success_time.is_some());
        assert!(stats.last_failure_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_from_any_state() {
        let b = CircuitBreaker::new("mock", config(1, 1, 10_000));
        fail(&b).await.unwrap_err();
        let _ = succeed(&b).await;
        assert_eq!(b.state(), CircuitState::Open);

        b.reset();
        let snap = b.snapshot();
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.stats, CircuitBreakerStats::default());
        assert!(b.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_failures_all_counted() {
        let b = Arc::new(CircuitBreaker::new("mock", config(100, 1, 1000)));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let b = Arc::clone(&b);
            handles.push(tokio::spawn(async move {
                let _ = b
                    .execute(|| async {
                        tokio::task::yield_now().await;
                        Err::<(), &'static str>("boom")
                    })
                    .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let stats = b.snapshot().stats;
        assert_eq!(stats.failures, 20);
        assert_eq!(stats.consecutive_failures, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_reuses_breakers_and_reports_health() {
        let registry = BreakerRegistry::new(config(1, 1, 1000));
        let a = registry.get_or_create("mock");
        let again = registry.get_or_create("mock");
        assert!(Arc::ptr_eq(&a, &again));
        registry.get_or_create("anthropic");
        assert_eq!(registry.health(), HealthStatus::Healthy);

        fail(&a).await.unwrap_err();
        assert_eq!(registry.health(), HealthStatus::Degraded);

        let names: Vec<String> = registry.snapshots().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["anthropic".to_string(), "mock".to_string()]);

        registry.reset_all();
        assert_eq!(registry.health(), HealthStatus::Healthy);
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_snapshot_serializes_flat_camel_case() {
        let b = CircuitBreaker::new("mock", CircuitBreakerConfig::default());
        let value = serde_json::to_value(b.snapshot()).unwrap();
        assert_eq!(value["state"], "CLOSED");
        assert_eq!(value["consecutiveFailures"], 0);
        assert_eq!(value["rejectedRequests"], 0);
        assert!(value["lastFailureTime"].is_null());
    }
}
