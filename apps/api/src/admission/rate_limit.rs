//! Token bucket rate limiter keyed by `clientIdentity:routeKey`.
//!
//! Refill is lazy and happens in whole windows only: a bucket untouched for 3.5
//! windows gains three windows' worth of tokens and keeps the half window as
//! credit towards the next one. Refill-then-consume runs under the map's shard
//! lock, so two concurrent requests never both spend the last token. New keys
//! are inserted under a single lock so the key cap is never exceeded.
//!
//! Idle buckets are evicted by `sweep()` and a hard key cap keeps the map bounded
//! even between sweeps.

use std::time::Duration;

use axum::http::HeaderMap;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::{codes, NormalizedError};

/// Identity used when no forwarding header is present.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Forwarding headers consulted for the client identity, in precedence order.
const IDENTITY_HEADERS: &[&str] = &["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Tokens granted per window; also the bucket capacity.
    pub capacity: u32,
    pub window: Duration,
    /// Buckets unseen for this many windows are evicted by `sweep()`.
    pub idle_windows: u32,
    /// Upper bound on tracked keys.
    pub max_keys: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            window: Duration::from_secs(60),
            idle_windows: 10,
            max_keys: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    tokens: u32,
    last_refill: Instant,
    last_seen: Instant,
}

impl TokenBucket {
    fn full(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    fn refill(&mut self, config: &RateLimitConfig, now: Instant) {
        let window_ms = config.window.as_millis().max(1);
        let elapsed_ms = now.saturating_duration_since(self.last_refill).as_millis();
        let windows = elapsed_ms / window_ms;
        if windows == 0 {
            return;
        }
        let gained = (windows as u64).saturating_mul(u64::from(config.capacity));
        self.tokens = (u64::from(self.tokens) + gained).min(u64::from(config.capacity)) as u32;
        // advance by whole windows only so the remainder carries over
        self.last_refill += Duration::from_millis((windows * window_ms) as u64);
    }

    fn take(&mut self) -> bool {
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<String, TokenBucket>,
    new_keys: Mutex<()>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
            new_keys: Mutex::new(()),
        }
    }

    /// Admits the request (consuming one token) or fails with `RATE_LIMIT`.
    pub fn rate_limit(&self, headers: &HeaderMap, route_key: &str) -> Result<(), NormalizedError> {
        let key = format!("{}:{}", client_identity(headers), route_key);
        self.check_key(&key)
    }

    /// Admission check for a precomputed bucket key.
    pub fn check_key(&self, key: &str) -> Result<(), NormalizedError> {
        let admitted = match self.consume_existing(key) {
            Some(admitted) => admitted,
            None => self.consume_new(key),
        };

        if admitted {
            Ok(())
        } else {
            debug!(key, "rate limit exceeded");
            Err(NormalizedError::new(
                codes::RATE_LIMIT,
                format!(
                    "Too many requests: limit is {} per {}s",
                    self.config.capacity,
                    self.config.window.as_secs_f64()
                ),
            ))
        }
    }

    /// Refill-then-consume under the key's shard lock. `None` if the key is untracked.
    fn consume_existing(&self, key: &str) -> Option<bool> {
        let mut bucket = self.buckets.get_mut(key)?;
        let now = Instant::now();
        bucket.refill(&self.config, now);
        bucket.last_seen = now;
        Some(bucket.take())
    }

    /// New keys are admitted one at a time so the key cap holds under concurrency.
    fn consume_new(&self, key: &str) -> bool {
        let _guard = self.new_keys.lock();
        if let Some(admitted) = self.consume_existing(key) {
            return admitted;
        }
        let now = Instant::now();
        if self.buckets.len() >= self.config.max_keys {
            self.make_room(now);
        }
        let mut bucket = TokenBucket::full(self.config.capacity, now);
        let admitted = bucket.take();
        self.buckets.insert(key.to_string(), bucket);
        admitted
    }

    /// Tokens left for `key` after a lazy refill, without consuming one.
    #[allow(dead_code)] // inspection hook; admission itself never needs it
    pub fn remaining(&self, key: &str) -> u32 {
        let now = Instant::now();
        match self.buckets.get_mut(key) {
            Some(mut bucket) => {
                bucket.refill(&self.config, now);
                bucket.tokens
            }
            None => self.config.capacity,
        }
    }

    /// Drops buckets unseen for more than `idle_windows` windows. Returns how many.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let max_idle = self.config.window * self.config.idle_windows;
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) <= max_idle);
        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.buckets.len(), "rate limit buckets swept");
        }
        evicted
    }

    fn make_room(&self, now: Instant) {
        if self.sweep_at(now) > 0 && self.buckets.len() < self.config.max_keys {
            return;
        }
        let oldest = self
            .buckets
            .iter()
            .min_by_key(|entry| entry.value().last_seen)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            warn!(key = %key, max_keys = self.config.max_keys, "rate limit key cap reached, evicting");
            self.buckets.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }
}

/// Derives the caller identity from forwarding headers, first match wins.
/// For `x-forwarded-for` only the left-most (originating) address counts.
pub fn client_identity(headers: &HeaderMap) -> String {
    IDENTITY_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(',').next())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}
