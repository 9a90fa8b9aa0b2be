//! Duplicate-submission guard.
//!
//! A key may be claimed once per TTL. The first claim wins; any repeat inside the
//! TTL is rejected with `DUPLICATE_SUBMISSION`, even if the first request failed.
//! Claims are recorded with an atomic insert so concurrent repeats cannot both win.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::errors::{codes, NormalizedError};

/// Header carrying the client-chosen submission key.
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

const MAX_KEY_LEN: usize = 200;

pub struct IdempotencyCache {
    ttl: Duration,
    claims: DashMap<String, Instant>,
}

impl IdempotencyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            claims: DashMap::new(),
        }
    }

    /// Claims `key` within `scope` (client and route) for this TTL window.
    /// Expired claims are replaced.
    pub fn claim(&self, scope: &str, key: &str) -> Result<(), NormalizedError> {
        let key = key.trim();
        let len = key.chars().count();
        if len == 0 || len > MAX_KEY_LEN {
            return Err(NormalizedError::new(
                codes::INVALID_PAYLOAD,
                format!("Idempotency-Key must be 1-{MAX_KEY_LEN} characters"),
            ));
        }

        let now = Instant::now();
        match self.claims.entry(format!("{scope}|{key}")) {
            Entry::Occupied(mut existing) => {
                if now.saturating_duration_since(*existing.get()) < self.ttl {
                    debug!(scope, key, "duplicate submission rejected");
                    return Err(NormalizedError::new(
                        codes::DUPLICATE_SUBMISSION,
                        "This submission was already received",
                    ));
                }
                existing.insert(now);
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
            }
        }
        Ok(())
    }

    /// Drops expired claims. Returns how many.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.claims.len();
        self.claims
            .retain(|_, claimed_at| now.saturating_duration_since(*claimed_at) < self.ttl);
        before.saturating_sub(self.claims.len())
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }
}
