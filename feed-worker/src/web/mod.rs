//! Web server module for the item intake.
//!
//! This module provides a small web server that:
//! - Accepts feed items on `POST /items` (HMAC-signed when configured)
//! - Reports queue length and gate state on `GET /queue`
//! - Answers `GET /health`
//!
//! It shares the process with the queue, since the queue lives in memory.

pub mod handlers;
pub mod signature;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{health, queue_status, submit_item, AppState, HealthResponse, ItemResponse};
pub use signature::{sign_body, verify_intake_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// Build the intake router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/queue", get(queue_status))
        .route("/items", post(submit_item))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
