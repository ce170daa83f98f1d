//! API route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Build all API routes.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .nest("/api/health", health_routes())
        .nest("/api/events", event_routes())
        .with_state(state)
}

/// Health check routes (Kubernetes probes).
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/live", get(handlers::health::liveness))
        .route("/ready", get(handlers::health::readiness))
}

/// Event ingestion and lookup routes.
fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::events::ingest))
        .route("/{id}", get(handlers::events::show))
}
