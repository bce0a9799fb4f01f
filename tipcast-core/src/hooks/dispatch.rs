//! Hook dispatcher: persists planned hooks as PENDING queue rows.

use crate::entities::notification_hook::{InsertNotificationHooks, NewHook};
use crate::entities::{HookChannel, HookEventKind};
use crate::events::{HooksEnqueued, HooksEnqueuedSender};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use smallvec::SmallVec;
use tracing::{debug, warn};

/// One planned outbound delivery: what to say, over which channel, to whom.
///
/// Plans are pure data produced by the per-kind reconcilers, which is what
/// makes "hook count is deterministic per transaction" a testable property
/// rather than an emergent one.
#[derive(Debug, Clone, PartialEq)]
pub struct HookPlan {
    pub event_kind: HookEventKind,
    pub channel: HookChannel,
    pub payload: serde_json::Value,
    pub recipient_ids: SmallVec<[i64; 2]>,
}

/// Persists hook plans and nudges the hook processor.
///
/// Never delivers anything itself: delivery belongs to the lease-based
/// processor, and the reconciler must stay oblivious to transport
/// failures.
pub struct HookDispatcher {
    db: DatabaseProcessor,
    hooks_tx: HooksEnqueuedSender,
}

impl HookDispatcher {
    pub fn new(db: DatabaseProcessor, hooks_tx: HooksEnqueuedSender) -> Self {
        Self { db, hooks_tx }
    }

    /// Insert one PENDING row per plan and wake the processor.
    ///
    /// Returns the new hook row ids.
    pub async fn emit(&self, plans: Vec<HookPlan>) -> Result<Vec<i64>, sqlx::Error> {
        if plans.is_empty() {
            return Ok(Vec::new());
        }

        let hooks = plans
            .into_iter()
            .map(|plan| NewHook {
                event_kind: plan.event_kind,
                channel: plan.channel,
                payload: plan.payload,
                recipient_ids: plan.recipient_ids.into_vec(),
            })
            .collect();

        let ids = self.db.process(InsertNotificationHooks { hooks }).await?;

        debug!(hook_count = ids.len(), "Enqueued notification hooks");

        // The nudge is best-effort: if the channel is full or closed the
        // processor's poll tick picks the rows up anyway.
        if let Err(e) = self.hooks_tx.try_send(HooksEnqueued {
            hook_count: ids.len(),
        }) {
            warn!(error = %e, "Failed to nudge hook processor");
        }

        Ok(ids)
    }
}
