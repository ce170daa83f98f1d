//! Delivery worker
//!
//! Drives the event state machine: sleep, claim a batch, dispatch each
//! claimed row (bounded concurrency), write the outcome, reschedule or
//! retire. Stateless across iterations — every decision is made from
//! what the Store returns, never from anything cached in this struct.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::backoff::BackoffPolicy;
use crate::config::WorkerSettings;
use crate::models::{AttemptOutcome, Event};
use crate::sender::{Outcome, Sender};
use crate::signing::{sign, SIGNATURE_HEADER};
use crate::store::EventStore;

#[derive(Clone)]
pub struct Worker {
    store: EventStore,
    sender: Arc<Sender>,
    backoff: Arc<BackoffPolicy>,
    rng: Arc<Mutex<StdRng>>,
    secret: Arc<Vec<u8>>,
    config: Arc<WorkerSettings>,
}

impl Worker {
    pub fn new(store: EventStore, secret: Vec<u8>, config: WorkerSettings) -> anyhow::Result<Self> {
        let sender = Sender::new(config.http_timeout())?;
        let backoff = BackoffPolicy::new(config.backoff_base(), config.backoff_cap());
        Ok(Self {
            store,
            sender: Arc::new(sender),
            backoff: Arc::new(backoff),
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
            secret: Arc::new(secret),
            config: Arc::new(config),
        })
    }

    /// Run the poll loop until `shutdown` is cancelled. Stops claiming
    /// new batches as soon as shutdown is requested; attempts already
    /// in flight are given `shutdown_grace` to finish before being
    /// abandoned (their rows stay `pending`, untouched).
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("worker shutdown requested; no longer claiming new batches");
                    return;
                }
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
            }

            let now = Utc::now();
            let lease = self.config.http_timeout() + Duration::from_secs(5);

            let claimed = match self.store.claim_batch(self.config.batch_size, now, lease).await {
                Ok(events) => events,
                Err(e) => {
                    tracing::error!("claim_batch failed, will retry next poll: {e}");
                    continue;
                }
            };

            if claimed.is_empty() {
                continue;
            }

            tracing::debug!(count = claimed.len(), "claimed batch");

            let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
            let mut tasks = JoinSet::new();
            for event in claimed {
                let worker = self.clone();
                let permits = semaphore.clone();
                tasks.spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .expect("semaphore is never closed");
                    worker.process_event(event).await;
                });
            }

            self.drain(tasks, &shutdown).await;
        }
    }

    /// Wait for a batch's tasks to finish, bailing out after
    /// `shutdown_grace` once shutdown has been requested.
    async fn drain(&self, mut tasks: JoinSet<()>, shutdown: &CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    let grace = self.config.shutdown_grace();
                    let _ = tokio::time::timeout(grace, async {
                        while tasks.join_next().await.is_some() {}
                    })
                    .await;
                    if tasks.len() > 0 {
                        tracing::warn!(
                            remaining = tasks.len(),
                            "abandoning in-flight attempts after shutdown grace period"
                        );
                        tasks.abort_all();
                    }
                    return;
                }
                next = tasks.join_next() => {
                    if next.is_none() {
                        return;
                    }
                }
            }
        }
    }

    async fn process_event(&self, event: Event) {
        let attempt_number = event.attempt_count + 1;

        let body = match serde_json::to_vec(&event.payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                // Can't happen for a `serde_json::Value` round-tripped from the
                // database, but nothing here can safely retry a bad encode.
                tracing::error!(event_id = %event.id, "failed to serialize payload: {e}");
                return;
            }
        };

        let signature = sign(&self.secret, &body);
        let headers = vec![
            ("Content-Type", "application/json".to_string()),
            (SIGNATURE_HEADER, signature),
        ];

        let outcome = self.sender.send(&event.target_url, body, headers).await;

        if outcome.is_success() {
            let Outcome::Response { status_code, body } = outcome else {
                unreachable!("is_success() only holds for Outcome::Response");
            };
            if let Err(e) = self
                .store
                .record_success(event.id, attempt_number, status_code as i32, Some(body))
                .await
            {
                tracing::error!(event_id = %event.id, "record_success failed: {e}");
            }
            return;
        }

        let attempt_outcome = match outcome {
            Outcome::Response { status_code, body } => AttemptOutcome::Response {
                status_code: status_code as i32,
                body: Some(body),
            },
            Outcome::TransportError { message } => AttemptOutcome::TransportError { message },
        };

        let next_retry_at = {
            let mut rng = self.rng.lock().await;
            let delay = self.backoff.next_delay(attempt_number, &mut *rng);
            Utc::now() + ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::zero())
        };

        if let Err(e) = self
            .store
            .record_failure(
                event.id,
                attempt_number,
                &attempt_outcome,
                self.config.max_attempts,
                next_retry_at,
            )
            .await
        {
            tracing::error!(event_id = %event.id, "record_failure failed: {e}");
        }
    }
}
