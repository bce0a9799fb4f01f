//! Event channel factories and handles.

use super::types::{EventIngested, HooksEnqueued};
use tokio::sync::mpsc;

/// Default buffer size for event channels.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for EventIngested events.
pub type EventIngestedSender = mpsc::Sender<EventIngested>;
/// Receiver handle for EventIngested events.
pub type EventIngestedReceiver = mpsc::Receiver<EventIngested>;

/// Sender handle for HooksEnqueued events.
pub type HooksEnqueuedSender = mpsc::Sender<HooksEnqueued>;
/// Receiver handle for HooksEnqueued events.
pub type HooksEnqueuedReceiver = mpsc::Receiver<HooksEnqueued>;

/// Create a new EventIngested channel.
pub fn event_ingested_channel() -> (EventIngestedSender, EventIngestedReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create a new HooksEnqueued channel.
pub fn hooks_enqueued_channel() -> (HooksEnqueuedSender, HooksEnqueuedReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Container for all event channel senders, passed to components that
/// emit events (the gateway handler and the hook dispatcher).
#[derive(Clone)]
pub struct EventSenders {
    /// Sender for EventIngested events
    pub event_ingested: EventIngestedSender,
    /// Sender for HooksEnqueued events
    pub hooks_enqueued: HooksEnqueuedSender,
}

impl EventSenders {
    pub fn new(event_ingested: EventIngestedSender, hooks_enqueued: HooksEnqueuedSender) -> Self {
        Self {
            event_ingested,
            hooks_enqueued,
        }
    }
}
