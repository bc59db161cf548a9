// handlers/mod.rs - operational HTTP surface
//
// Public (service info, health) and job endpoints (status, manual trigger).
// There is no auth tier; deployments keep this port private.

pub mod jobs;
pub mod public;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::database::DocumentStore;
use crate::scheduler::Scheduler;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub scheduler: Arc<Scheduler>,
    pub manual_triggers: bool,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/api/jobs", get(jobs::jobs_list))
        .route("/api/jobs/:name/run", post(jobs::job_run))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
