//! Durable webhook dispatcher — library root

use std::sync::Arc;

pub mod backoff;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod sender;
pub mod signing;
pub mod store;
pub mod worker;

pub use errors::{AppError, HandlerResult};
pub use store::EventStore;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool, also used directly by the readiness probe.
    pub db: sqlx::PgPool,
    /// Durable event store built on the same pool.
    pub store: EventStore,
    /// Application configuration.
    pub config: Arc<config::AppConfig>,
}
