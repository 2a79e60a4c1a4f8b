//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (event store/bus, ledger service, projections)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Fails only if the projection worker thread cannot be spawned.
pub fn build_app(config: &AppConfig) -> std::io::Result<Router> {
    let services = Arc::new(services::build_services(config.posting.clone())?);

    // Tenant-scoped routes: require X-Tenant-Id.
    let scoped = routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(middleware::tenant_middleware))
            .layer(Extension(services)),
    );

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(scoped))
}
