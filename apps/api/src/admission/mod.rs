//! Request admission: per-client rate limiting and duplicate-submission guard.

pub mod idempotency;
pub mod rate_limit;
