//! Attempt model
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// An append-only audit row: one completed (or transport-errored) HTTP
/// POST to a target URL for a given event.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Attempt {
    pub id: Uuid,
    pub event_id: Uuid,
    pub attempt_number: i32,
    pub status_code: Option<i32>,
    pub response_body: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The normalized outcome of a single delivery attempt, as recorded by
/// the Store. Mirrors `crate::sender::Outcome` but carries the fields
/// `record_failure` needs to decide pending-vs-dead.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Response {
        status_code: i32,
        body: Option<String>,
    },
    TransportError {
        message: String,
    },
}
