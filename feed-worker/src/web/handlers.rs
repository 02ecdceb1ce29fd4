//! Intake endpoint handlers.
//!
//! `POST /items` only verifies, parses and enqueues; publishing happens
//! later on the dispatcher's schedule.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::intake::{Admission, Intake};
use crate::queue::{QueueItem, QueueStatus};
use crate::web::signature::{verify_intake_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub intake: Intake,
}

impl AppState {
    pub fn new(config: Config, intake: Intake) -> Self {
        Self {
            config: Arc::new(config),
            intake,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Queue Status
// =============================================================================

/// Current queue length and gate state.
pub async fn queue_status(State(state): State<AppState>) -> Json<QueueStatus> {
    Json(state.intake.handler().status().await)
}

// =============================================================================
// Item Intake
// =============================================================================

/// Item intake response.
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_length: Option<usize>,
}

impl ItemResponse {
    fn status(status: &'static str) -> Self {
        Self {
            status,
            queue_length: None,
        }
    }
}

/// Item intake endpoint.
///
/// This endpoint:
/// 1. Verifies the HMAC signature (if a signing key is configured)
/// 2. Parses the body as a queue item
/// 3. Admits it to the queue (dropping duplicates when dedup is on)
pub async fn submit_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<ItemResponse>) {
    info!(body_length = body.len(), "intake_item_received");

    if let Some(signing_key) = state.config.intake_signing_key.as_deref() {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string()
        };

        if !verify_intake_signature(
            signing_key,
            &header(TIMESTAMP_HEADER),
            &body,
            &header(SIGNATURE_HEADER),
            state.config.intake_signature_max_age,
        ) {
            warn!("intake_signature_invalid");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ItemResponse::status("unauthorized")),
            );
        }
    }

    let item: QueueItem = match serde_json::from_slice(&body) {
        Ok(item) => item,
        Err(e) => {
            warn!(error = %e, "intake_item_parse_failed");
            return (
                StatusCode::BAD_REQUEST,
                Json(ItemResponse::status("invalid_item")),
            );
        }
    };

    match state.intake.admit(item).await {
        Ok(Admission::Enqueued { queue_length }) => (
            StatusCode::OK,
            Json(ItemResponse {
                status: "enqueued",
                queue_length: Some(queue_length),
            }),
        ),
        Ok(Admission::Duplicate) => (StatusCode::OK, Json(ItemResponse::status("duplicate"))),
        Err(e) => {
            error!(error = %e, "intake_item_admit_failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ItemResponse::status("error")),
            )
        }
    }
}
