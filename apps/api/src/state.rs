use std::sync::Arc;

use crate::admission::idempotency::IdempotencyCache;
use crate::admission::rate_limit::RateLimiter;
use crate::ai::gateway::TaskGateway;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<TaskGateway>,
    pub rate_limiter: Arc<RateLimiter>,
    /// Submission keys seen within the idempotency TTL.
    pub idempotency: Arc<IdempotencyCache>,
    pub config: Config,
}
