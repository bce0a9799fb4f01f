//! ReconcileWorker processor.
//!
//! The ReconcileWorker is responsible for:
//! - Receiving `EventIngested` events from the ingestion gateway
//! - Loading the event row and parsing the provider webhook payload
//! - Driving the idempotent reconciliation in [`crate::reconcile`]
//! - Marking the event row processed once applied
//! - Sweeping stale pending events whose in-process nudge was lost
//!
//! Racing instances are harmless by construction: reconciliation is
//! idempotent per provider transaction id, and the processed flip is
//! guarded.

use crate::entities::EventStatus;
use crate::entities::ingested_event::{
    GetIngestedEventById, IngestedEvent, ListStalePendingEvents, MarkEventProcessed,
};
use crate::events::EventIngestedReceiver;
use crate::framework::DatabaseProcessor;
use crate::reconcile::{ReconcileError, Reconciler};
use kanau::processor::Processor;
use std::time::Duration;
use tipcast_sdk::objects::webhook::TransactionWebhook;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Tuning for the stale-event sweep.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileWorkerConfig {
    /// How often to look for pending events the channel path missed.
    pub sweep_interval: Duration,
    /// Minimum age before a pending event is considered stale. Keeps the
    /// sweep from racing deliveries that are mid-flight on the channel.
    pub sweep_older_than_secs: i64,
    /// Maximum stale events re-driven per sweep.
    pub sweep_batch: i64,
}

impl Default for ReconcileWorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            sweep_older_than_secs: 120,
            sweep_batch: 50,
        }
    }
}

/// ReconcileWorker drives ingested events through reconciliation.
pub struct ReconcileWorker {
    db: DatabaseProcessor,
    reconciler: Reconciler,
    config: ReconcileWorkerConfig,
}

impl ReconcileWorker {
    pub fn new(
        db: DatabaseProcessor,
        reconciler: Reconciler,
        config: ReconcileWorkerConfig,
    ) -> Self {
        Self {
            db,
            reconciler,
            config,
        }
    }

    /// Run the ReconcileWorker until shutdown is signaled.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut event_rx: EventIngestedReceiver,
    ) {
        info!("ReconcileWorker started");

        let mut sweep = tokio::time::interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                // Check for shutdown
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("ReconcileWorker received shutdown signal");
                        break;
                    }
                }

                // Receive EventIngested events
                Some(event) = event_rx.recv() => {
                    self.process_event(event.event_id).await;
                }

                // Periodic sweep for events whose nudge was lost
                _ = sweep.tick() => {
                    if let Err(e) = self.sweep_stale_events().await {
                        error!(error = %e, "Stale event sweep failed");
                    }
                }

                else => {
                    info!("EventIngested channel closed");
                    break;
                }
            }
        }

        info!("ReconcileWorker shutdown complete");
    }

    /// Process one event id end to end, routing failures per their nature:
    /// transient ones leave the row pending (the sweep or the sender's
    /// retry re-drives it), data errors are logged with the full payload
    /// and the row is closed out so the sweep cannot loop on it.
    async fn process_event(&self, event_id: i64) {
        let event = match self.db.process(GetIngestedEventById { event_id }).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                warn!(event_id, "EventIngested referenced a missing event row");
                return;
            }
            Err(e) => {
                warn!(event_id, error = %e, "Failed to load event row, leaving pending");
                return;
            }
        };

        if event.status == EventStatus::Processed {
            debug!(event_id, "Event already processed, skipping");
            return;
        }

        match self.reconcile_event(&event).await {
            Ok(report) => {
                info!(
                    event_id,
                    provider_event_id = %event.provider_event_id,
                    applied = report.applied,
                    insert_race = report.took_insert_race_path,
                    "Event reconciled"
                );
                if let Err(e) = self.db.process(MarkEventProcessed { event_id }).await {
                    warn!(event_id, error = %e, "Failed to mark event processed");
                }
            }
            Err(e) if e.is_transient() => {
                warn!(
                    event_id,
                    provider_event_id = %event.provider_event_id,
                    error = %e,
                    "Transient reconcile failure, event left pending"
                );
            }
            Err(e) => {
                error!(
                    event_id,
                    provider_event_id = %event.provider_event_id,
                    error = %e,
                    payload = %event.payload,
                    "Unreconcilable event, closing it out for manual inspection"
                );
                if let Err(e) = self.db.process(MarkEventProcessed { event_id }).await {
                    warn!(event_id, error = %e, "Failed to mark poison event processed");
                }
            }
        }
    }

    async fn reconcile_event(
        &self,
        event: &IngestedEvent,
    ) -> Result<crate::reconcile::ReconcileReport, ReconcileError> {
        let webhook: TransactionWebhook = serde_json::from_value(event.payload.clone())
            .map_err(|e| ReconcileError::Malformed(e.to_string()))?;
        self.reconciler.reconcile(&webhook).await
    }

    async fn sweep_stale_events(&self) -> Result<(), sqlx::Error> {
        let stale = self
            .db
            .process(ListStalePendingEvents {
                older_than_secs: self.config.sweep_older_than_secs,
                limit: self.config.sweep_batch,
            })
            .await?;

        if stale.is_empty() {
            return Ok(());
        }

        info!(count = stale.len(), "Re-driving stale pending events");
        for event in stale {
            self.process_event(event.id).await;
        }
        Ok(())
    }
}
