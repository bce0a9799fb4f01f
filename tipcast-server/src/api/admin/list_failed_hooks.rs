use axum::{Json, extract::Query, response::IntoResponse};
use kanau::processor::Processor;
use serde::Deserialize;
use tipcast_core::entities::notification_hook::ListCompletelyFailedHooks;
use tipcast_core::framework::DatabaseProcessor;

use super::{AdminApiError, hook_to_admin_response};
use crate::api::extractors::AdminAuth;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(super) struct Pagination {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// `GET /hooks/failed` — audit listing of COMPLETELY_FAILED hooks.
///
/// These rows are never retried automatically; this is the surface a human
/// works from before deciding to requeue.
pub(super) async fn list_failed_hooks(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AdminApiError> {
    let processor = DatabaseProcessor {
        pool: state.db.clone(),
    };

    let limit = pagination.limit.unwrap_or(50).clamp(1, 200);
    let offset = pagination.offset.unwrap_or(0).max(0);

    let hooks = processor
        .process(ListCompletelyFailedHooks { limit, offset })
        .await
        .map_err(AdminApiError::Database)?;

    let response: Vec<_> = hooks.iter().map(hook_to_admin_response).collect();
    Ok(Json(response))
}
