//! Event model
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle state of a queued event.
///
/// Represented as a sum type rather than a free-form string; converted
/// to/from its `TEXT` column at the SQL boundary via `sqlx::Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Awaiting (or between) delivery attempts.
    Pending,
    /// Received a 2xx response. Terminal.
    Delivered,
    /// Exhausted `MAX_ATTEMPTS`. Terminal.
    Dead,
}

/// A queued webhook event. The single source of truth for its delivery
/// state; never cached in-process.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub payload: serde_json::Value,
    pub target_url: String,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub last_error: Option<String>,
}

/// Fields required to insert a new event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub payload: serde_json::Value,
    pub target_url: String,
}
