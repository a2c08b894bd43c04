use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "convert-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Ready when the working directory accepts new files.
pub async fn readiness_check(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    if !state.workspace.is_writable().await {
        return Err(AppError::ServiceUnavailable(
            "Working directory is not writable".to_string(),
        ));
    }

    let gate = state.conversions.gate();
    Ok(Json(json!({
        "status": "ready",
        "conversion_slots": gate.capacity(),
        "conversion_slots_available": gate.available(),
    })))
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
