//! Application configuration
//!
//! Environment-based configuration: nested settings structs populated by
//! `AppConfig::from_env`, with sane defaults for everything except the
//! values an operator must supply.

use std::env;
use std::time::Duration;

use serde::Deserialize;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub webhook: WebhookSettings,
    pub worker: WorkerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// HMAC signing key and default routing for outbound deliveries.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSettings {
    pub secret: String,
    pub default_target_url: Option<String>,
}

/// Tuning for the delivery worker's poll loop, scheduler, and sender.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    pub poll_interval_ms: u64,
    pub batch_size: i64,
    pub concurrency: usize,
    pub shutdown_grace_ms: u64,
    pub http_timeout_secs: u64,
    pub max_attempts: i32,
    pub backoff_base_secs: u64,
    pub backoff_cap_secs: u64,
}

impl WorkerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap_secs)
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let secret = env::var("WEBHOOK_SECRET").expect("WEBHOOK_SECRET must be set");
        if secret.is_empty() {
            anyhow::bail!("WEBHOOK_SECRET must not be empty");
        }

        Ok(Self {
            server: ServerSettings {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
            },
            database: DatabaseSettings {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(20),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2),
            },
            webhook: WebhookSettings {
                secret,
                default_target_url: env::var("DEFAULT_TARGET_URL").ok(),
            },
            worker: WorkerSettings {
                poll_interval_ms: env::var("WORKER_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1500),
                batch_size: env::var("WORKER_BATCH_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
                concurrency: env::var("WORKER_CONCURRENCY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1),
                shutdown_grace_ms: env::var("WORKER_SHUTDOWN_GRACE_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5000),
                http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(15),
                max_attempts: env::var("MAX_ATTEMPTS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(20),
                backoff_base_secs: env::var("BACKOFF_BASE_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2),
                backoff_cap_secs: env::var("BACKOFF_CAP_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3600),
            },
        })
    }
}
