use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{get, web, HttpResponse, Responder};
use serde::Serialize;
use tracing::error;

use crate::registry::JobRegistry;

/// Shared context for the probe endpoints.
pub struct HealthState {
    pub registry: Arc<JobRegistry>,
    pub upload_dir: PathBuf,
    pub results_dir: PathBuf,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    storage: String,
    jobs: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn storage_available(state: &HealthState) -> bool {
    state.upload_dir.is_dir() && state.results_dir.is_dir()
}

/// Health check endpoint
///
/// General health including the data directories the engine depends on.
/// Use for load balancers and uptime monitors.
#[get("/health")]
async fn health_check(state: web::Data<HealthState>) -> impl Responder {
    if storage_available(&state) {
        HttpResponse::Ok().json(HealthResponse {
            status: "healthy".to_string(),
            storage: "available".to_string(),
            jobs: state.registry.len(),
            error: None,
        })
    } else {
        error!("Health check failed: data directories unavailable");
        HttpResponse::ServiceUnavailable().json(HealthResponse {
            status: "unhealthy".to_string(),
            storage: "missing".to_string(),
            jobs: state.registry.len(),
            error: Some("Upload or results directory is missing".to_string()),
        })
    }
}

/// Readiness check endpoint
///
/// Ready once the data directories exist; uploads and downloads fail
/// without them. Use for readiness probes.
#[get("/ready")]
async fn readiness_check(state: web::Data<HealthState>) -> impl Responder {
    if storage_available(&state) {
        HttpResponse::Ok().json(HealthResponse {
            status: "ready".to_string(),
            storage: "available".to_string(),
            jobs: state.registry.len(),
            error: None,
        })
    } else {
        error!("Readiness check failed: data directories unavailable");
        HttpResponse::ServiceUnavailable().json(HealthResponse {
            status: "not_ready".to_string(),
            storage: "missing".to_string(),
            jobs: state.registry.len(),
            error: Some("Upload or results directory is missing".to_string()),
        })
    }
}

/// Liveness check endpoint
///
/// Process-is-alive only, no dependency checks.
#[get("/live")]
async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "alive".to_string(),
        storage: "not_checked".to_string(),
        jobs: 0,
        error: None,
    })
}

pub fn health_config(config: &mut web::ServiceConfig) {
    config
        .service(health_check)
        .service(readiness_check)
        .service(liveness_check);
}
