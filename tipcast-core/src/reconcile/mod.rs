//! Idempotent transaction reconciliation.
//!
//! Every kind shares one concurrency pattern:
//!
//! 1. look up the transaction by provider id while resolving participants,
//! 2. if found, validate and advance its status (same-terminal re-delivery
//!    is a no-op),
//! 3. if absent, attempt an insert with the terminal status already set;
//!    losing the insert race means backing off briefly, re-fetching the
//!    winner's row, and converging on the found path,
//! 4. side effects and hook emission run exactly once, inside whichever
//!    arm actually applied the transition.
//!
//! The uniqueness constraint on `provider_txn_id` is the correctness
//! mechanism; the backoff is scheduling hygiene that turns the lost race
//! into a cheap update instead of a hot retry loop.

pub mod kinds;

use crate::entities::TransactionStatus;
use crate::entities::ledger::{BumpVideoTipTotal, CreditSparkBalance, CreditTopupReceipt};
use crate::entities::transaction::{
    AdvanceTransactionStatus, GetTransactionByProviderId, InsertTransaction, NewTransaction,
    TransactionRecord, TxInsertOutcome,
};
use crate::entities::user_link::ResolveProviderUsers;
use crate::framework::DatabaseProcessor;
use crate::hooks::HookDispatcher;
use compact_str::CompactString;
use kanau::processor::Processor;
use kinds::{PlanContext, SideEffect};
use std::collections::HashMap;
use std::time::Duration;
use tipcast_sdk::objects::transaction::TransactionOutcome;
use tipcast_sdk::objects::webhook::{TransactionWebhook, WebhookTransaction};
use tracing::{debug, info, warn};

/// Errors from reconciling one delivery.
///
/// `Database` is transient (the sender or the sweep re-drives the event);
/// everything else is a data problem that re-running cannot fix.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed event payload: {0}")]
    Malformed(String),

    #[error("no internal user linked to provider user id {0}")]
    UnknownUser(CompactString),

    #[error(
        "transaction {provider_txn_id} is already {existing}, refusing to apply {incoming}"
    )]
    StatusConflict {
        provider_txn_id: CompactString,
        existing: TransactionStatus,
        incoming: TransactionStatus,
    },

    #[error(
        "lost the insert race for {provider_txn_id} but the winning row \
         stayed invisible after {attempts} refetches"
    )]
    RaceNotConverged {
        provider_txn_id: CompactString,
        attempts: u32,
    },
}

impl ReconcileError {
    /// Whether re-driving the same delivery can possibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ReconcileError::Database(_) | ReconcileError::RaceNotConverged { .. }
        )
    }
}

impl From<kinds::PlanError> for ReconcileError {
    fn from(err: kinds::PlanError) -> Self {
        ReconcileError::Malformed(err.to_string())
    }
}

/// Insert-race backoff tuning. The delay is a fixed short sleep, not a
/// cancellable wait: it only exists to let the winner's commit become
/// visible before we re-read.
#[derive(Debug, Clone, Copy)]
pub struct RaceBackoff {
    pub delay: Duration,
    pub refetch_attempts: u32,
}

impl Default for RaceBackoff {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
            refetch_attempts: 3,
        }
    }
}

/// What one reconcile call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// True if this call applied the status transition (and therefore ran
    /// side effects and queued hooks). False for idempotent re-deliveries.
    pub applied: bool,
    /// True if this call lost the insert race and converged via
    /// backoff-and-refetch.
    pub took_insert_race_path: bool,
}

/// How an incoming terminal status relates to the row's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileDecision {
    /// Same status already applied; re-delivery is a no-op.
    AlreadyApplied,
    /// The row is still pending; apply the transition.
    Advance,
    /// The row is terminal in a *different* status; data conflict.
    Conflict,
}

/// Decide what an incoming status means for an existing row.
pub fn decide(existing: TransactionStatus, incoming: TransactionStatus) -> ReconcileDecision {
    if existing == incoming {
        ReconcileDecision::AlreadyApplied
    } else if existing == TransactionStatus::Pending {
        ReconcileDecision::Advance
    } else {
        ReconcileDecision::Conflict
    }
}

/// Internal user ids resolved from the webhook's provider ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participants {
    pub from_user_id: Option<i64>,
    pub to_user_ids: Vec<i64>,
}

/// Map resolved links onto the webhook's participant list.
///
/// Pure so the failure modes (no recipients, unlinked provider id) are
/// unit-testable without a database.
pub fn map_participants(
    txn: &WebhookTransaction,
    links: &HashMap<CompactString, i64>,
) -> Result<Participants, ReconcileError> {
    if txn.to_provider_user_ids.is_empty() {
        return Err(ReconcileError::Malformed(
            "transaction has no recipients".to_string(),
        ));
    }

    let from_user_id = match &txn.from_provider_user_id {
        Some(provider_id) => Some(
            links
                .get(provider_id)
                .copied()
                .ok_or_else(|| ReconcileError::UnknownUser(provider_id.clone()))?,
        ),
        None => None,
    };

    let to_user_ids = txn
        .to_provider_user_ids
        .iter()
        .map(|provider_id| {
            links
                .get(provider_id)
                .copied()
                .ok_or_else(|| ReconcileError::UnknownUser(provider_id.clone()))
        })
        .collect::<Result<Vec<i64>, ReconcileError>>()?;

    Ok(Participants {
        from_user_id,
        to_user_ids,
    })
}

/// The shared reconciliation engine. Per-kind behavior comes in through
/// [`kinds::plan`]; everything else (dedup, racing, status transitions) is
/// kind-agnostic.
pub struct Reconciler {
    db: DatabaseProcessor,
    dispatcher: HookDispatcher,
    backoff: RaceBackoff,
}

impl Reconciler {
    pub fn new(db: DatabaseProcessor, dispatcher: HookDispatcher, backoff: RaceBackoff) -> Self {
        Self {
            db,
            dispatcher,
            backoff,
        }
    }

    /// Apply one webhook delivery to the ledger, exactly once.
    pub async fn reconcile(
        &self,
        webhook: &TransactionWebhook,
    ) -> Result<ReconcileReport, ReconcileError> {
        let provider_txn_id = &webhook.transaction.provider_txn_id;
        if provider_txn_id.is_empty() {
            return Err(ReconcileError::Malformed(
                "empty provider_txn_id".to_string(),
            ));
        }

        let target = match webhook.outcome {
            TransactionOutcome::Success => TransactionStatus::Done,
            TransactionOutcome::Failure => TransactionStatus::Failed,
        };

        // The ledger lookup and the participant resolution are independent
        // reads; run them concurrently.
        let (existing, participants) = tokio::join!(
            self.db.process(GetTransactionByProviderId {
                provider_txn_id: provider_txn_id.clone(),
            }),
            self.resolve_participants(&webhook.transaction),
        );
        let existing = existing?;
        let participants = participants?;

        match existing {
            Some(record) => {
                self.apply_to_existing(webhook, &participants, record, target, false)
                    .await
            }
            None => self.insert_or_converge(webhook, &participants, target).await,
        }
    }

    async fn resolve_participants(
        &self,
        txn: &WebhookTransaction,
    ) -> Result<Participants, ReconcileError> {
        let mut provider_user_ids: Vec<CompactString> = txn.to_provider_user_ids.to_vec();
        if let Some(from) = &txn.from_provider_user_id {
            provider_user_ids.push(from.clone());
        }

        let links = self
            .db
            .process(ResolveProviderUsers { provider_user_ids })
            .await?;

        let links: HashMap<CompactString, i64> = links
            .into_iter()
            .map(|link| (link.provider_user_id, link.user_id))
            .collect();

        map_participants(txn, &links)
    }

    /// The "found" path: validate the current status, advance it if still
    /// pending, and trigger the per-kind plan if this call won.
    async fn apply_to_existing(
        &self,
        webhook: &TransactionWebhook,
        participants: &Participants,
        mut record: TransactionRecord,
        target: TransactionStatus,
        via_race_path: bool,
    ) -> Result<ReconcileReport, ReconcileError> {
        loop {
            match decide(record.status, target) {
                ReconcileDecision::AlreadyApplied => {
                    debug!(
                        provider_txn_id = %record.provider_txn_id,
                        status = %record.status,
                        "Re-delivery of an already-applied status, no-op"
                    );
                    return Ok(ReconcileReport {
                        applied: false,
                        took_insert_race_path: via_race_path,
                    });
                }
                ReconcileDecision::Conflict => {
                    return Err(ReconcileError::StatusConflict {
                        provider_txn_id: record.provider_txn_id.clone(),
                        existing: record.status,
                        incoming: target,
                    });
                }
                ReconcileDecision::Advance => {
                    let extra_data = serde_json::to_value(&webhook.transaction.meta)
                        .map_err(|e| ReconcileError::Malformed(e.to_string()))?;

                    let updated = self
                        .db
                        .process(AdvanceTransactionStatus {
                            id: record.id,
                            expected: record.status,
                            target,
                            extra_data: Some(extra_data),
                        })
                        .await?;

                    if updated == 0 {
                        // A concurrent worker advanced the row between our
                        // read and the guarded update. Re-read and
                        // re-decide; the row is terminal now, so the loop
                        // ends on the next pass.
                        record = self.refetch(&record.provider_txn_id).await?;
                        continue;
                    }

                    self.run_plan(webhook, participants, record.id, target)
                        .await?;
                    return Ok(ReconcileReport {
                        applied: true,
                        took_insert_race_path: via_race_path,
                    });
                }
            }
        }
    }

    /// The "absent" path: attempt the insert; on a lost race, back off and
    /// converge through the found path.
    async fn insert_or_converge(
        &self,
        webhook: &TransactionWebhook,
        participants: &Participants,
        target: TransactionStatus,
    ) -> Result<ReconcileReport, ReconcileError> {
        let extra_data = serde_json::to_value(&webhook.transaction.meta)
            .map_err(|e| ReconcileError::Malformed(e.to_string()))?;

        let txn = NewTransaction {
            provider_txn_id: webhook.transaction.provider_txn_id.clone(),
            kind: webhook.kind.into(),
            status: target,
            from_user_id: participants.from_user_id,
            to_user_ids: participants.to_user_ids.clone(),
            amount: webhook.transaction.amount,
            extra_data,
        };

        match self.db.process(InsertTransaction { txn }).await? {
            TxInsertOutcome::Inserted(record) => {
                info!(
                    provider_txn_id = %record.provider_txn_id,
                    kind = %webhook.kind,
                    status = %target,
                    "Inserted transaction"
                );
                self.run_plan(webhook, participants, record.id, target)
                    .await?;
                Ok(ReconcileReport {
                    applied: true,
                    took_insert_race_path: false,
                })
            }
            TxInsertOutcome::AlreadyExists => {
                // A concurrent delivery inserted between our lookup and
                // our insert. The constraint already guaranteed exactly
                // one row; all that remains is converging on it.
                for attempt in 1..=self.backoff.refetch_attempts {
                    tokio::time::sleep(self.backoff.delay).await;

                    if let Some(record) = self
                        .db
                        .process(GetTransactionByProviderId {
                            provider_txn_id: webhook.transaction.provider_txn_id.clone(),
                        })
                        .await?
                    {
                        debug!(
                            provider_txn_id = %record.provider_txn_id,
                            attempt,
                            "Lost insert race, converged on winner's row"
                        );
                        return self
                            .apply_to_existing(webhook, participants, record, target, true)
                            .await;
                    }

                    warn!(
                        provider_txn_id = %webhook.transaction.provider_txn_id,
                        attempt,
                        "Winning row not visible yet after lost insert race"
                    );
                }

                Err(ReconcileError::RaceNotConverged {
                    provider_txn_id: webhook.transaction.provider_txn_id.clone(),
                    attempts: self.backoff.refetch_attempts,
                })
            }
        }
    }

    async fn refetch(
        &self,
        provider_txn_id: &CompactString,
    ) -> Result<TransactionRecord, ReconcileError> {
        self.db
            .process(GetTransactionByProviderId {
                provider_txn_id: provider_txn_id.clone(),
            })
            .await?
            .ok_or_else(|| ReconcileError::RaceNotConverged {
                provider_txn_id: provider_txn_id.clone(),
                attempts: 1,
            })
    }

    /// Run the kind-specific side effects and queue the hooks. Reached
    /// from exactly one arm per transition, never both.
    async fn run_plan(
        &self,
        webhook: &TransactionWebhook,
        participants: &Participants,
        transaction_id: i64,
        _applied: TransactionStatus,
    ) -> Result<(), ReconcileError> {
        let ctx = PlanContext {
            transaction_id,
            provider_txn_id: &webhook.transaction.provider_txn_id,
            from_user_id: participants.from_user_id,
            to_user_ids: &participants.to_user_ids,
            amount: webhook.transaction.amount,
            meta: &webhook.transaction.meta,
        };

        let plan = kinds::plan(webhook.kind, webhook.outcome, &ctx)?;

        for effect in &plan.side_effects {
            match effect {
                SideEffect::CreditTopupReceipt {
                    transaction_id,
                    user_id,
                    amount,
                } => {
                    let credited = self
                        .db
                        .process(CreditTopupReceipt {
                            transaction_id: *transaction_id,
                            user_id: *user_id,
                            amount: *amount,
                        })
                        .await?;
                    if !credited {
                        debug!(transaction_id, "Top-up receipt already present");
                    }
                }
                SideEffect::BumpVideoTipTotal { video_id, amount } => {
                    self.db
                        .process(BumpVideoTipTotal {
                            video_id: *video_id,
                            amount: *amount,
                        })
                        .await?;
                }
                SideEffect::CreditSparkBalance { user_id, amount } => {
                    self.db
                        .process(CreditSparkBalance {
                            user_id: *user_id,
                            amount: *amount,
                        })
                        .await?;
                }
            }
        }

        let hook_ids = self.dispatcher.emit(plan.hooks).await?;
        debug!(
            provider_txn_id = %webhook.transaction.provider_txn_id,
            hook_count = hook_ids.len(),
            "Reconciliation queued hooks"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_status_is_already_applied() {
        assert_eq!(
            decide(TransactionStatus::Done, TransactionStatus::Done),
            ReconcileDecision::AlreadyApplied
        );
        assert_eq!(
            decide(TransactionStatus::Failed, TransactionStatus::Failed),
            ReconcileDecision::AlreadyApplied
        );
    }

    #[test]
    fn pending_rows_advance() {
        assert_eq!(
            decide(TransactionStatus::Pending, TransactionStatus::Done),
            ReconcileDecision::Advance
        );
        assert_eq!(
            decide(TransactionStatus::Pending, TransactionStatus::Failed),
            ReconcileDecision::Advance
        );
    }

    #[test]
    fn crossed_terminal_statuses_conflict() {
        assert_eq!(
            decide(TransactionStatus::Done, TransactionStatus::Failed),
            ReconcileDecision::Conflict
        );
        assert_eq!(
            decide(TransactionStatus::Failed, TransactionStatus::Done),
            ReconcileDecision::Conflict
        );
    }

    fn webhook_txn(
        from: Option<&str>,
        to: &[&str],
    ) -> tipcast_sdk::objects::webhook::WebhookTransaction {
        tipcast_sdk::objects::webhook::WebhookTransaction {
            provider_txn_id: "txn_1".into(),
            from_provider_user_id: from.map(Into::into),
            to_provider_user_ids: to.iter().map(|s| (*s).into()).collect(),
            amount: rust_decimal::Decimal::ONE,
            meta: Default::default(),
        }
    }

    #[test]
    fn participants_resolve_through_links() {
        let txn = webhook_txn(Some("pu_a"), &["pu_b", "pu_c"]);
        let links: HashMap<CompactString, i64> = [
            (CompactString::from("pu_a"), 1),
            (CompactString::from("pu_b"), 2),
            (CompactString::from("pu_c"), 3),
        ]
        .into_iter()
        .collect();

        let participants = map_participants(&txn, &links).unwrap();
        assert_eq!(
            participants,
            Participants {
                from_user_id: Some(1),
                to_user_ids: vec![2, 3],
            }
        );
    }

    #[test]
    fn unlinked_provider_user_is_fatal() {
        let txn = webhook_txn(None, &["pu_unknown"]);
        let links = HashMap::new();
        let err = map_participants(&txn, &links).unwrap_err();
        assert!(matches!(err, ReconcileError::UnknownUser(id) if id == "pu_unknown"));
    }

    #[test]
    fn missing_recipients_are_malformed() {
        let txn = webhook_txn(None, &[]);
        assert!(txn.to_provider_user_ids.is_empty());
        let err = map_participants(&txn, &HashMap::new()).unwrap_err();
        assert!(matches!(err, ReconcileError::Malformed(_)));
    }

    #[test]
    fn transient_classification() {
        assert!(
            ReconcileError::RaceNotConverged {
                provider_txn_id: "t".into(),
                attempts: 3,
            }
            .is_transient()
        );
        assert!(!ReconcileError::Malformed("x".to_string()).is_transient());
        assert!(
            !ReconcileError::StatusConflict {
                provider_txn_id: "t".into(),
                existing: TransactionStatus::Done,
                incoming: TransactionStatus::Failed,
            }
            .is_transient()
        );
    }

    #[test]
    fn default_backoff_matches_documented_tradeoff() {
        let backoff = RaceBackoff::default();
        assert_eq!(backoff.delay, Duration::from_millis(500));
        assert_eq!(backoff.refetch_attempts, 3);
    }
}
