mod common;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use campus_dues::database::{DatabaseError, DocumentStore, Session};
use campus_dues::handlers::{app, AppState};
use campus_dues::testing::{fee_structure, TestContext};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

fn router(ctx: &TestContext, manual_triggers: bool) -> Router {
    app(AppState {
        store: ctx.dyn_store(),
        scheduler: Arc::new(ctx.scheduler()),
        manual_triggers,
    })
}

async fn call(router: Router, method: Method, uri: &str) -> Result<(StatusCode, Value)> {
    let response = router
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Ok((status, body))
}

/// Store whose every operation fails as if the database were down
struct DownStore;

#[async_trait]
impl DocumentStore for DownStore {
    fn name(&self) -> &'static str {
        "down"
    }

    async fn supports_transactions(&self) -> bool {
        false
    }

    async fn session(&self, _transactional: bool) -> Result<Box<dyn Session>, DatabaseError> {
        Err(DatabaseError::Unavailable("connection refused".to_string()))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Err(DatabaseError::Unavailable("connection refused".to_string()))
    }

    async fn migrate(&self) -> Result<(), DatabaseError> {
        Err(DatabaseError::Unavailable("connection refused".to_string()))
    }
}

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let ctx = common::context();
    let (status, body) = call(router(&ctx, true), Method::GET, "/").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "campus-dues");
    assert_eq!(body["data"]["store"], "memory");
    assert_eq!(body["data"]["jobs"].as_array().map(Vec::len), Some(3));
    Ok(())
}

#[tokio::test]
async fn health_reports_store_status() -> Result<()> {
    let ctx = common::context();
    let (status, body) = call(router(&ctx, true), Method::GET, "/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");

    let down = app(AppState {
        store: Arc::new(DownStore),
        scheduler: Arc::new(ctx.scheduler()),
        manual_triggers: true,
    });
    let (status, body) = call(down, Method::GET, "/health").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["status"], "degraded");
    Ok(())
}

#[tokio::test]
async fn lists_jobs_with_schedules() -> Result<()> {
    let ctx = common::context();
    let (status, body) = call(router(&ctx, true), Method::GET, "/api/jobs").await?;

    assert_eq!(status, StatusCode::OK);
    let jobs = body["data"].as_array().cloned().unwrap_or_default();
    let names: Vec<&str> = jobs.iter().filter_map(|j| j["name"].as_str()).collect();
    assert_eq!(names, vec!["payment-dues", "weekly-holidays", "payroll"]);
    assert_eq!(jobs[0]["schedule"]["kind"], "daily");
    assert_eq!(jobs[0]["running"], false);
    Ok(())
}

#[tokio::test]
async fn manual_trigger_runs_the_job_for_a_date() -> Result<()> {
    let ctx = common::context();
    let students = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    ctx.seed(&[fee_structure(Uuid::new_v4(), "monthly", 5, &[(100, 1)], students)]).await?;
    let router = router(&ctx, true);

    let (status, body) = call(router.clone(), Method::POST, "/api/jobs/payment-dues/run?date=2026-10-05").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["job"], "payment-dues");
    assert_eq!(body["data"]["created"], 3);

    let (_, body) = call(router, Method::POST, "/api/jobs/payment-dues/run?date=2026-10-05").await?;
    assert_eq!(body["data"]["created"], 0);
    assert_eq!(body["data"]["skipped"], 3);
    Ok(())
}

#[tokio::test]
async fn manual_trigger_errors() -> Result<()> {
    let ctx = common::context();

    let (status, body) = call(router(&ctx, true), Method::POST, "/api/jobs/attendance/run").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = call(router(&ctx, true), Method::POST, "/api/jobs/payroll/run?date=2026-13-40").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(router(&ctx, false), Method::POST, "/api/jobs/payroll/run").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    Ok(())
}
