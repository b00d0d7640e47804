//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: ledger, snapshot store, semantic index, cluster reports and model client wiring
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and JSON response mapping
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use relief_infra::{AppConfig, Embedder, LlmClient};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::ServiceError;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: &AppConfig) -> Result<Router, ServiceError> {
    let services = services::build_services(config)?;
    Ok(router_with(services))
}

/// Build the router around an injected model client and embedder (tests, offline runs).
pub fn build_app_with(
    config: &AppConfig,
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn Embedder>,
) -> Result<Router, ServiceError> {
    let services = services::build_services_with(config, llm, embedder)?;
    Ok(router_with(services))
}

fn router_with(services: services::AppServices) -> Router {
    routes::router().layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(Extension(Arc::new(services))),
    )
}
