mod admission;
mod ai;
mod config;
mod errors;
mod routes;
mod state;

use anyhow::{bail, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::admission::idempotency::IdempotencyCache;
use crate::admission::rate_limit::RateLimiter;
use crate::ai::breaker::BreakerRegistry;
use crate::ai::gateway::TaskGateway;
use crate::ai::vendors::{build_adapter, is_vendor_available};
use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting interview gateway v{}", env!("CARGO_PKG_VERSION"));

    if !is_vendor_available(config.vendor, &config.credentials) {
        bail!(
            "AI_VENDOR={} but no API key is configured for it",
            config.vendor
        );
    }
    let adapter = build_adapter(
        config.vendor,
        &config.credentials,
        config.vendor_call_timeout,
    )?;
    info!(
        "Vendor adapter initialized ({}, call timeout {:?})",
        adapter.vendor(),
        config.vendor_call_timeout
    );

    let breakers = Arc::new(BreakerRegistry::new(config.breaker));
    let gateway = Arc::new(TaskGateway::new(
        adapter,
        breakers,
        config.vendor_call_timeout,
    ));

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit));
    let idempotency = Arc::new(IdempotencyCache::new(config.idempotency_ttl));
    spawn_sweeper(
        Arc::clone(&rate_limiter),
        Arc::clone(&idempotency),
        config.rate_limit.window,
    );

    let state = AppState {
        gateway,
        rate_limiter,
        idempotency,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Evicts idle rate-limit buckets and expired idempotency claims once per window.
fn spawn_sweeper(limiter: Arc<RateLimiter>, idempotency: Arc<IdempotencyCache>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let buckets = limiter.sweep();
            let claims = idempotency.sweep();
            if buckets + claims > 0 {
                debug!(
                    buckets,
                    claims,
                    tracked_buckets = limiter.len(),
                    live_claims = idempotency.len(),
                    "admission state swept"
                );
            }
        }
    });
}
