//! Health check integration tests

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use tower::ServiceExt;

use webhook_dispatcher::handlers::health::liveness;

#[tokio::test]
async fn liveness_returns_200_with_ok_status() {
    let app = Router::new().route("/api/health/live", get(liveness));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health/live")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

/// Readiness probes a real database connection; run with
/// `DATABASE_URL` set and `cargo test -- --ignored`.
#[tokio::test]
#[ignore]
async fn readiness_reports_connected_against_live_database() {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("failed to connect to database");

    let config = webhook_dispatcher::config::AppConfig {
        server: webhook_dispatcher::config::ServerSettings {
            host: "0.0.0.0".to_string(),
            port: 8080,
        },
        database: webhook_dispatcher::config::DatabaseSettings {
            url: database_url,
            max_connections: 2,
            min_connections: 1,
        },
        webhook: webhook_dispatcher::config::WebhookSettings {
            secret: "test-secret".to_string(),
            default_target_url: None,
        },
        worker: webhook_dispatcher::config::WorkerSettings {
            poll_interval_ms: 1500,
            batch_size: 10,
            concurrency: 1,
            shutdown_grace_ms: 5000,
            http_timeout_secs: 15,
            max_attempts: 20,
            backoff_base_secs: 2,
            backoff_cap_secs: 3600,
        },
    };

    let state = webhook_dispatcher::AppState {
        db: pool.clone(),
        store: webhook_dispatcher::EventStore::new(pool),
        config: std::sync::Arc::new(config),
    };

    let app = Router::new()
        .route(
            "/api/health/ready",
            get(webhook_dispatcher::handlers::health::readiness),
        )
        .with_state(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
