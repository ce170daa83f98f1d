//! Ingestion and lookup handlers
//!
//! The HTTP surface is deliberately thin: accept an event, persist it,
//! hand back its id. All delivery semantics live in the Store and the
//! Worker, not here.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Event, NewEvent};
use crate::{AppState, HandlerResult};

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub payload: serde_json::Value,
    pub target_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub id: Uuid,
    pub status: &'static str,
}

/// `POST /api/events` — accept an event for durable delivery.
pub async fn ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> HandlerResult<(StatusCode, Json<IngestResponse>)> {
    let target_url = req
        .target_url
        .or_else(|| state.config.webhook.default_target_url.clone())
        .ok_or_else(|| AppError::BadRequest("target_url is required".to_string()))?;

    validate_target_url(&target_url)?;

    let id = state
        .store
        .insert_event(NewEvent {
            payload: req.payload,
            target_url,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            id,
            status: "accepted",
        }),
    ))
}

/// `GET /api/events/{id}` — look up an event's current state.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<Event>> {
    let event = state
        .store
        .get_event(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("event {id} not found")))?;

    Ok(Json(event))
}

fn validate_target_url(target_url: &str) -> Result<(), AppError> {
    let parsed = url::Url::parse(target_url)
        .map_err(|_| AppError::BadRequest("target_url is not a valid URL".to_string()))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(AppError::BadRequest(
            "target_url must be an absolute http or https URL".to_string(),
        ));
    }

    if parsed.host().is_none() {
        return Err(AppError::BadRequest(
            "target_url must include a host".to_string(),
        ));
    }

    Ok(())
}
