use axum::{extract::Path, http::StatusCode, response::IntoResponse};
use kanau::processor::Processor;
use tipcast_core::entities::notification_hook::RequeueHook;
use tipcast_core::framework::DatabaseProcessor;

use super::AdminApiError;
use crate::api::extractors::AdminAuth;
use crate::state::AppState;

/// `POST /hooks/{hook_id}/requeue` — manual intervention for a hook that
/// exhausted its retry budget.
///
/// Resets the row to PENDING with a fresh budget; the next fresh pass of
/// any hook processor picks it up. Only COMPLETELY_FAILED rows qualify, so
/// this cannot double-deliver a hook that is merely in flight.
pub(super) async fn requeue_hook(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(hook_id): Path<i64>,
) -> Result<impl IntoResponse, AdminApiError> {
    let processor = DatabaseProcessor {
        pool: state.db.clone(),
    };

    let requeued = processor
        .process(RequeueHook { hook_id })
        .await
        .map_err(AdminApiError::Database)?;

    if requeued == 0 {
        return Err(AdminApiError::NotFound);
    }

    tracing::info!(hook_id, "Hook manually requeued");
    Ok(StatusCode::ACCEPTED)
}
