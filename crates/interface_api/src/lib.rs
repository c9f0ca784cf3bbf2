//! Interface layer for the accumulation pipeline
//!
//! Hosts the two binaries and what they share:
//!
//! - `accumulation-jobs`: runs the data sourcer or the response processor
//!   for one payer, wired by [`jobs::JobRunner`]
//! - `accumulation-api`: read-only status surface over reports and mappings
//!
//! # Architecture
//!
//! - **Handlers**: health and accumulation status endpoints
//! - **Middleware**: JWT authentication and audit logging
//! - **DTOs**: response bodies
//! - **Config / Telemetry**: layered configuration and tracing setup

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod telemetry;

use std::sync::Arc;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use core_kernel::HealthCheckable;
use domain_accumulation::AccumulationStore;

use crate::config::ApiConfig;
use crate::handlers::{accumulation, health};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AccumulationStore>,
    pub health: Arc<dyn HealthCheckable>,
    pub config: ApiConfig,
}

/// Creates the status API router
///
/// `health` backs `/health/ready`; it is normally the same adapter as `store`.
pub fn create_router(
    store: Arc<dyn AccumulationStore>,
    health: Arc<dyn HealthCheckable>,
    config: ApiConfig,
) -> Router {
    let state = AppState { store, health, config };

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let api_routes = Router::new()
        .route("/payers/:code/reports/:date", get(accumulation::payer_reports))
        .route("/claims/:id/accumulation", get(accumulation::claim_accumulation))
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
