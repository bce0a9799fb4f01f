//! In-process events connecting the pipeline stages.
//!
//! Events are ephemeral nudges carrying row ids, not data: every consumer
//! re-reads current state from the database, so a lost event costs only
//! latency (the sweep and poll paths pick the work up), never correctness.

mod channels;
mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, EventIngestedReceiver, EventIngestedSender, EventSenders,
    HooksEnqueuedReceiver, HooksEnqueuedSender, event_ingested_channel, hooks_enqueued_channel,
};
pub use types::{EventIngested, HooksEnqueued};
