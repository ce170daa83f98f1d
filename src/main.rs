//! Durable webhook dispatcher
//!
//! # Architecture
//! - Axum web framework for ingestion/lookup/health
//! - SQLx against PostgreSQL — the event queue's single source of truth
//! - A background worker polling the same pool for due deliveries

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, Router};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use webhook_dispatcher::{config::AppConfig, routes, store::EventStore, worker::Worker, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("starting webhook dispatcher");

    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "configuration loaded"
    );

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(900))
        .test_before_acquire(true)
        .connect(&config.database.url)
        .await?;

    tracing::info!("database connection pool established");

    sqlx::migrate!("./migrations").run(&db_pool).await?;
    tracing::info!("database migrations complete");

    let store = EventStore::new(db_pool.clone());
    let worker = Worker::new(
        store.clone(),
        config.webhook.secret.as_bytes().to_vec(),
        config.worker.clone(),
    )?;

    let shutdown = CancellationToken::new();
    let worker_shutdown = shutdown.clone();
    let worker_handle = tokio::spawn(async move { worker.run(worker_shutdown).await });

    let state = AppState {
        db: db_pool,
        store,
        config: Arc::new(config),
    };

    let app = Router::new()
        .merge(routes::api_routes(state.clone()))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from((
        state.config.server.host.parse::<std::net::IpAddr>()?,
        state.config.server.port,
    ));

    tracing::info!(%addr, "listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    tracing::info!("http server stopped, waiting for worker to drain");
    worker_handle.await?;
    tracing::info!("shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C/SIGTERM, then cancel the shared shutdown token so the
/// worker stops claiming new batches at the same moment axum stops
/// accepting new connections.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, starting graceful shutdown"),
        _ = terminate => tracing::info!("received SIGTERM, starting graceful shutdown"),
    }

    shutdown.cancel();
}
