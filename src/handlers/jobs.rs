use axum::extract::{Path, Query, State};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use super::AppState;
use crate::error::ApiError;
use crate::jobs::JobReport;
use crate::middleware::{ApiResponse, ApiResult};
use crate::scheduler::JobInfo;

#[derive(Debug, Deserialize)]
pub struct RunParams {
    /// Simulated local date; defaults to now
    pub date: Option<NaiveDate>,
}

pub async fn jobs_list(State(state): State<AppState>) -> ApiResult<Vec<JobInfo>> {
    Ok(ApiResponse::success(state.scheduler.jobs().await))
}

pub async fn job_run(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<RunParams>,
) -> ApiResult<JobReport> {
    if !state.manual_triggers {
        return Err(ApiError::forbidden("Manual job triggers are disabled"));
    }

    let now = match params.date {
        None => state.scheduler.now(),
        Some(date) => date
            .and_hms_opt(0, 0, 0)
            .and_then(|dt| dt.and_local_timezone(state.scheduler.offset()).single())
            .ok_or_else(|| ApiError::bad_request(format!("Invalid date {}", date)))?,
    };

    info!("Manual trigger of '{}' at {}", name, now);
    let report = state.scheduler.run_now(&name, now).await?;
    Ok(ApiResponse::success(report))
}
