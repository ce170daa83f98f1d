//! Event and attempt persistence
//!
//! `EventStore` owns all SQL for the durable queue. It is the only
//! component allowed to mutate `events`/`attempts`; every decision a
//! caller makes is based on what this module returns, never on an
//! in-process cache.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{AttemptOutcome, Event, EventStatus, NewEvent};

#[derive(Clone)]
pub struct EventStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct EventRow {
    id: Uuid,
    payload: serde_json::Value,
    target_url: String,
    status: EventStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    next_retry_at: Option<DateTime<Utc>>,
    attempt_count: i32,
    last_error: Option<String>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            payload: row.payload,
            target_url: row.target_url,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            next_retry_at: row.next_retry_at,
            attempt_count: row.attempt_count,
            last_error: row.last_error,
        }
    }
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a `pending` row, due immediately.
    pub async fn insert_event(&self, new_event: NewEvent) -> Result<Uuid, sqlx::Error> {
        let now = Utc::now();
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO events (payload, target_url, status, created_at, updated_at, next_retry_at, attempt_count)
            VALUES ($1, $2, 'pending', $3, $3, $3, 0)
            RETURNING id
            "#,
        )
        .bind(&new_event.payload)
        .bind(&new_event.target_url)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Point read for the lookup endpoint.
    pub async fn get_event(&self, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
        let row: Option<EventRow> = sqlx::query_as(
            r#"
            SELECT id, payload, target_url, status, created_at, updated_at, next_retry_at, attempt_count, last_error
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Event::from))
    }

    /// Atomically claim up to `batch_size` due `pending` rows.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so two callers polling at the same
    /// instant never claim the same row, then advances `next_retry_at`
    /// by `lease` before committing — a visibility lease standing in
    /// for the row lock once the transaction closes, so the claiming
    /// worker can make its HTTP call without holding a DB connection.
    pub async fn claim_batch(
        &self,
        batch_size: i64,
        now: DateTime<Utc>,
        lease: std::time::Duration,
    ) -> Result<Vec<Event>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let candidates: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, payload, target_url, status, created_at, updated_at, next_retry_at, attempt_count, last_error
            FROM events
            WHERE status = 'pending' AND next_retry_at <= $1
            ORDER BY next_retry_at ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .bind(batch_size)
        .fetch_all(&mut *tx)
        .await?;

        if candidates.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let leased_until = now + ChronoDuration::from_std(lease).unwrap_or(ChronoDuration::zero());
        let ids: Vec<Uuid> = candidates.iter().map(|e| e.id).collect();

        sqlx::query(
            r#"
            UPDATE events
            SET next_retry_at = $1, updated_at = $2
            WHERE id = ANY($3)
            "#,
        )
        .bind(leased_until)
        .bind(now)
        .bind(&ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(candidates
            .into_iter()
            .map(|row| {
                let mut event: Event = row.into();
                event.next_retry_at = Some(leased_until);
                event
            })
            .collect())
    }

    /// Record a successful delivery: insert the attempt, mark the event
    /// `delivered`, clear `last_error`.
    pub async fn record_success(
        &self,
        event_id: Uuid,
        attempt_number: i32,
        status_code: i32,
        response_body: Option<String>,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO attempts (event_id, attempt_number, status_code, response_body, error, created_at)
            VALUES ($1, $2, $3, $4, NULL, $5)
            "#,
        )
        .bind(event_id)
        .bind(attempt_number)
        .bind(status_code)
        .bind(&response_body)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE events
            SET status = 'delivered', attempt_count = $2, last_error = NULL, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .bind(attempt_number)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    /// Record a failed delivery: insert the attempt, bump
    /// `attempt_count`, and either reschedule (`pending`) or retire
    /// (`dead`) the event depending on `max_attempts`.
    pub async fn record_failure(
        &self,
        event_id: Uuid,
        attempt_number: i32,
        outcome: &AttemptOutcome,
        max_attempts: i32,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        let (status_code, body, error) = match outcome {
            AttemptOutcome::Response { status_code, body } => (Some(*status_code), body.clone(), None),
            AttemptOutcome::TransportError { message } => (None, None, Some(message.clone())),
        };

        let last_error = error
            .clone()
            .unwrap_or_else(|| format!("non-2xx response: {}", status_code.unwrap_or(0)));

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO attempts (event_id, attempt_number, status_code, response_body, error, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event_id)
        .bind(attempt_number)
        .bind(status_code)
        .bind(&body)
        .bind(&error)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if attempt_number >= max_attempts {
            sqlx::query(
                r#"
                UPDATE events
                SET status = 'dead', attempt_count = $2, last_error = $3, updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(event_id)
            .bind(attempt_number)
            .bind(&last_error)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE events
                SET status = 'pending', attempt_count = $2, last_error = $3, next_retry_at = $4, updated_at = $5
                WHERE id = $1
                "#,
            )
            .bind(event_id)
            .bind(attempt_number)
            .bind(&last_error)
            .bind(next_retry_at)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}
