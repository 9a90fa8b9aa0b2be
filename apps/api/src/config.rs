use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::admission::rate_limit::RateLimitConfig;
use crate::ai::breaker::CircuitBreakerConfig;
use crate::ai::vendors::{VendorCredentials, VendorId};

/// Application configuration loaded from environment variables.
/// Everything except the vendor credentials has a default.
#[derive(Debug, Clone)]
pub struct Config {
    pub vendor: VendorId,
    pub credentials: VendorCredentials,
    pub vendor_call_timeout: Duration,
    pub breaker: CircuitBreakerConfig,
    pub rate_limit: RateLimitConfig,
    pub idempotency_ttl: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let vendor = std::env::var("AI_VENDOR").unwrap_or_else(|_| "mock".to_string());
        let vendor = VendorId::from_str(&vendor)
            .map_err(anyhow::Error::msg)
            .context("AI_VENDOR must be one of: mock, anthropic, openai")?;

        Ok(Config {
            vendor,
            credentials: VendorCredentials {
                anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
                openai_api_key: optional_env("OPENAI_API_KEY"),
            },
            vendor_call_timeout: Duration::from_millis(parse_env("VENDOR_CALL_TIMEOUT_MS", 30_000)?),
            breaker: CircuitBreakerConfig {
                failure_threshold: parse_env("BREAKER_FAILURE_THRESHOLD", 5)?,
                success_threshold: parse_env("BREAKER_SUCCESS_THRESHOLD", 2)?,
                timeout: Duration::from_millis(parse_env("BREAKER_TIMEOUT_MS", 60_000)?),
            },
            rate_limit: RateLimitConfig {
                capacity: parse_env("RATE_LIMIT_CAPACITY", 100)?,
                window: Duration::from_millis(parse_env("RATE_LIMIT_WINDOW_MS", 60_000)?),
                idle_windows: parse_env("RATE_LIMIT_IDLE_WINDOWS", 10)?,
                max_keys: parse_env("RATE_LIMIT_MAX_KEYS", 10_000)?,
            },
            idempotency_ttl: Duration::from_millis(parse_env("IDEMPOTENCY_TTL_MS", 300_000)?),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
