//! Admin API response objects.

use crate::objects::hooks::HookEventKind;
use serde::{Deserialize, Serialize};

/// A notification hook row as exposed to the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminHookResponse {
    pub id: i64,
    pub event_kind: HookEventKind,
    pub channel: String,
    pub status: String,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
