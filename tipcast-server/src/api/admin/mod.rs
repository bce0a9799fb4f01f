//! Admin API handlers.
//!
//! These endpoints require the `Tipcast-Admin-Authorization` header with
//! the plaintext admin secret.
//!
//! # Endpoints
//!
//! - `GET  /hooks/failed`            – list hooks that exhausted their retry budget
//! - `POST /hooks/{hook_id}/requeue` – put a completely-failed hook back in the queue

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::state::AppState;

mod list_failed_hooks;
mod requeue_hook;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/hooks/failed", get(list_failed_hooks::list_failed_hooks))
        .route(
            "/hooks/{hook_id}/requeue",
            post(requeue_hook::requeue_hook),
        )
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in Admin API handlers.
#[derive(Debug)]
pub(crate) enum AdminApiError {
    Database(sqlx::Error),
    NotFound,
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminApiError::Database(e) => {
                tracing::error!(error = %e, "Admin API database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            AdminApiError::NotFound => {
                (StatusCode::NOT_FOUND, "resource not found").into_response()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

use tipcast_core::entities::notification_hook::NotificationHook;
use tipcast_sdk::objects::admin::AdminHookResponse;

pub(crate) fn hook_to_admin_response(h: &NotificationHook) -> AdminHookResponse {
    AdminHookResponse {
        id: h.id,
        event_kind: h.event_kind.into(),
        channel: h.channel.to_string(),
        status: h.status.to_string(),
        retry_count: h.retry_count,
        last_error: h.last_error.clone(),
        created_at: h.created_at.assume_utc().unix_timestamp(),
        updated_at: h.updated_at.assume_utc().unix_timestamp(),
    }
}
