use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use super::AppState;
use crate::middleware::ApiResponse;

pub async fn root(State(state): State<AppState>) -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": "campus-dues",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Recurring payment-due, payroll and holiday materialization",
        "store": state.store.name(),
        "jobs": state.scheduler.job_names(),
        "endpoints": {
            "health": "GET /health",
            "jobs": "GET /api/jobs",
            "run": "POST /api/jobs/:name/run[?date=YYYY-MM-DD]",
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": state.store.name(),
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string(),
                }
            })),
        ),
    }
}
