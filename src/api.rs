//! Webhook HTTP surface.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::config::ExecutionMode;
use crate::pipeline::{Outcome, Pipeline};
use crate::report::Reporter;

/// Shared application state
pub struct AppState {
    pub mode: ExecutionMode,
    pub pipeline: Arc<Pipeline>,
    pub reporter: Reporter,
}

/// POST /webhook - trade-signal intake
pub async fn webhook(State(state): State<Arc<AppState>>, body: String) -> impl IntoResponse {
    let pipeline = state.pipeline.clone();
    let received = Utc::now();

    // The pipeline blocks on gateway I/O; keep it off the async workers.
    let outcome = match tokio::task::spawn_blocking(move || pipeline.handle(&body, received)).await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("pipeline task failed: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": "internal error"})),
            );
        }
    };

    state.reporter.report(&outcome);
    outcome_response(&outcome)
}

/// GET / - debug surface
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({"service": "tradehook", "mode": state.mode.to_string()})),
    )
}

/// Catch-all for unmatched routes.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({"error": "not found"})))
}

fn outcome_response(outcome: &Outcome) -> (StatusCode, Json<serde_json::Value>) {
    match outcome {
        Outcome::Executed { record } => (
            StatusCode::OK,
            Json(json!({
                "status": "executed",
                "message": format!(
                    "{} {} {} @ {}",
                    record.side, record.quantity, record.symbol, record.entry
                ),
            })),
        ),
        Outcome::Test { signal, quantity } => (
            StatusCode::OK,
            Json(json!({
                "status": "test",
                "message": format!(
                    "simulation mode: would execute {} {} {} @ {}",
                    signal.side, quantity, signal.symbol, signal.entry
                ),
            })),
        ),
        Outcome::Blocked { .. } => (StatusCode::FORBIDDEN, Json(json!({"status": "blocked"}))),
        Outcome::Unauthorized => (
            StatusCode::FORBIDDEN,
            Json(json!({"status": "unauthorized"})),
        ),
        Outcome::Error { error } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "error", "message": error.to_string()})),
        ),
    }
}
