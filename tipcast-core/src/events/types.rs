//! Event type definitions.

/// Emitted by the ingestion gateway after persisting a fresh event row.
///
/// Carries only the row id; the reconcile worker loads the payload from
/// the event store. Duplicate deliveries never produce this event — they
/// are short-circuited at the gateway.
#[derive(Debug, Clone, Copy)]
pub struct EventIngested {
    pub event_id: i64,
}

/// Emitted after the hook dispatcher persists new hook rows, so the hook
/// processor can start a fresh pass without waiting for its poll tick.
#[derive(Debug, Clone, Copy)]
pub struct HooksEnqueued {
    pub hook_count: usize,
}
