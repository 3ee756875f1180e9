use crate::coordinator::{RunCoordinator, RunError};
use crate::models::{ErrorResponse, HealthResponse};
use crate::services::HealthProbe;
use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RunCoordinator>,
    pub database: Arc<dyn HealthProbe>,
}

/// Configure run and health routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/runs", web::post().to(trigger_run))
        .route("/runs/last", web::get().to(last_run));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let db_healthy = state.database.is_healthy().await;

    let status = if db_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        database: if db_healthy { "up" } else { "down" }.to_string(),
        run_in_progress: state.coordinator.is_running(),
    })
}

/// Trigger a matching run immediately
///
/// POST /api/v1/runs
///
/// Responds with the run summary once every group has been finalized. The run
/// itself is detached, so a client that disconnects does not cut it short.
async fn trigger_run(state: web::Data<AppState>) -> impl Responder {
    tracing::info!("Match run requested over HTTP");

    match state.coordinator.clone().trigger().await {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(e) => run_error_response(&e),
    }
}

/// Most recent completed run
///
/// GET /api/v1/runs/last
async fn last_run(state: web::Data<AppState>) -> impl Responder {
    match state.coordinator.last_summary().await {
        Some(summary) => HttpResponse::Ok().json(summary),
        None => HttpResponse::NotFound().json(ErrorResponse {
            error: "not_found".to_string(),
            message: "No run has completed yet".to_string(),
            status_code: 404,
        }),
    }
}

pub fn run_error_response(err: &RunError) -> HttpResponse {
    match err {
        RunError::AlreadyRunning { .. } => HttpResponse::Conflict().json(ErrorResponse {
            error: "run_in_progress".to_string(),
            message: err.to_string(),
            status_code: 409,
        }),
        RunError::QueueSource(_) => HttpResponse::BadGateway().json(ErrorResponse {
            error: "queue_unavailable".to_string(),
            message: err.to_string(),
            status_code: 502,
        }),
        RunError::Interrupted(_) => HttpResponse::InternalServerError().json(ErrorResponse {
            error: "run_interrupted".to_string(),
            message: err.to_string(),
            status_code: 500,
        }),
    }
}
