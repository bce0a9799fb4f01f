//! Application state shared across all request handlers.

use crate::config::runtime::SharedConfig;
use sqlx::PgPool;
use tipcast_core::events::EventSenders;

/// Application state that is shared across all request handlers.
///
/// Cloneable and cheap to pass around (config sections are behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Runtime configuration (sections reloadable via SIGHUP).
    pub config: SharedConfig,
    /// Senders for the in-process pipeline events.
    pub event_senders: EventSenders,
}

impl AppState {
    pub fn new(db: PgPool, config: SharedConfig, event_senders: EventSenders) -> Self {
        Self {
            db,
            config,
            event_senders,
        }
    }
}
