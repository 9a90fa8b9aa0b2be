pub mod ai;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/ai/health", get(health::ai_health_handler))
        .route("/api/v1/ai/:task", post(ai::handle_task))
        .with_state(state)
}
