//! The ingestion gateway: `POST /webhooks/transactions`.
//!
//! Deduplicates and persists the provider's delivery before any processing
//! starts, then hands off asynchronously. The sender only ever observes
//! 2xx (fresh *and* duplicate deliveries — idempotency is invisible to
//! callers) or 5xx on genuine storage failure, which prompts its own
//! at-least-once retry.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use kanau::processor::Processor;
use tipcast_core::entities::ingested_event::{IngestOutcome, InsertIngestedEvent};
use tipcast_core::events::EventIngested;
use tipcast_core::framework::DatabaseProcessor;
use tipcast_sdk::objects::webhook::TransactionWebhook;

use crate::api::extractors::SignedBody;
use crate::state::AppState;

pub(crate) async fn receive_transaction_webhook(
    state: State<AppState>,
    SignedBody(webhook): SignedBody<TransactionWebhook>,
) -> Result<impl IntoResponse, WebhookApiError> {
    let processor = DatabaseProcessor {
        pool: state.db.clone(),
    };

    let payload = serde_json::to_value(&webhook).map_err(WebhookApiError::Serialize)?;

    let outcome = processor
        .process(InsertIngestedEvent {
            provider_event_id: webhook.event_id.clone(),
            payload,
        })
        .await
        .map_err(WebhookApiError::Database)?;

    match outcome {
        IngestOutcome::Duplicate => {
            tracing::debug!(
                provider_event_id = %webhook.event_id,
                "Duplicate webhook delivery short-circuited"
            );
        }
        IngestOutcome::Fresh(event_id) => {
            tracing::info!(
                event_id,
                provider_event_id = %webhook.event_id,
                kind = %webhook.kind,
                "Ingested webhook event"
            );
            // Fire-and-forget: the row is durable, so if the nudge is lost
            // the reconcile worker's sweep picks the event up.
            if let Err(e) = state
                .event_senders
                .event_ingested
                .try_send(EventIngested { event_id })
            {
                tracing::warn!(event_id, error = %e, "Failed to nudge reconcile worker");
            }
        }
    }

    Ok(StatusCode::OK)
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in the webhook gateway.
#[derive(Debug)]
pub(crate) enum WebhookApiError {
    /// The event row could not be persisted.
    Database(sqlx::Error),
    /// The verified payload could not be re-serialized for storage.
    Serialize(serde_json::Error),
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            WebhookApiError::Database(e) => {
                tracing::error!(error = %e, "Webhook ingestion database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            WebhookApiError::Serialize(e) => {
                tracing::error!(error = %e, "Webhook payload serialization error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}
