use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::ai::breaker::{BreakerSnapshot, HealthStatus};
use crate::ai::vendors::{is_vendor_available, VendorId};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiHealthResponse {
    pub status: HealthStatus,
    pub vendor: VendorId,
    pub vendor_available: bool,
    /// False while the vendor's circuit is open and still cooling down.
    pub accepting_requests: bool,
    pub breakers: Vec<BreakerSnapshot>,
}

/// GET /health
/// Returns a simple status object with service version.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": env!("CARGO_PKG_NAME"),
        "vendor": state.gateway.current_vendor(),
    }))
}

/// GET /api/v1/ai/health
/// Degraded whenever any breaker is open.
pub async fn ai_health_handler(State(state): State<AppState>) -> Json<AiHealthResponse> {
    let vendor = state.gateway.current_vendor();
    Json(AiHealthResponse {
        status: state.gateway.health(),
        vendor,
        vendor_available: is_vendor_available(vendor, &state.config.credentials),
        accepting_requests: state.gateway.accepting_requests(),
        breakers: state.gateway.breaker_snapshots(),
    })
}
