use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    Json,
};
use tracing::debug;

use crate::admission::idempotency::IDEMPOTENCY_HEADER;
use crate::admission::rate_limit::client_identity;
use crate::ai::task::{Task, TaskResult};
use crate::errors::AppError;
use crate::state::AppState;

/// Shared bucket for every unrecognised task name.
const UNSUPPORTED_ROUTE_KEY: &str = "ai:unsupported";

/// POST /api/v1/ai/:task
/// Rate limit first. The idempotency key is only claimed once the request is
/// known to be well formed, so a rejected submission can be retried with it.
pub async fn handle_task(
    State(state): State<AppState>,
    Path(task): Path<String>,
    headers: HeaderMap,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<TaskResult>, AppError> {
    let route_key = match task.parse::<Task>() {
        Ok(parsed) => format!("ai:{parsed}"),
        Err(_) => UNSUPPORTED_ROUTE_KEY.to_string(),
    };
    state.rate_limiter.rate_limit(&headers, &route_key)?;

    let Json(payload) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    let request = state.gateway.prepare(&task, payload)?;

    if request.task() == Task::Score {
        if let Some(key) = headers.get(IDEMPOTENCY_HEADER) {
            let key = key.to_str().map_err(|_| {
                AppError::Validation("Idempotency-Key must be visible ASCII".into())
            })?;
            let scope = format!("{}:{route_key}", client_identity(&headers));
            state.idempotency.claim(&scope, key)?;
            debug!(task = %task, "idempotency key claimed");
        }
    }

    let result = state.gateway.ask_request(&request).await?;
    Ok(Json(result))
}
