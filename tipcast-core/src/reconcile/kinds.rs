//! Per-kind reconciliation plans.
//!
//! A plan is the pure description of what applying a transaction means
//! beyond the ledger row itself: which side-effect writes to perform and
//! which hooks to queue. Keeping plans pure data makes two properties
//! checkable in isolation: the dispatch over (kind, outcome) is total, and
//! the number of hooks per transaction is deterministic.

use crate::entities::{HookChannel, HookEventKind};
use crate::hooks::HookPlan;
use rust_decimal::Decimal;
use smallvec::{SmallVec, smallvec};
use tipcast_sdk::objects::hooks::{
    AirdropActivatedPayload, RedemptionDonePayload, ReplyTipReceivedPayload, TopupDonePayload,
    TopupFailedPayload, TransferReceivedPayload, VideoTipReceivedPayload,
};
use tipcast_sdk::objects::transaction::{TransactionKind, TransactionOutcome};
use tipcast_sdk::objects::webhook::WebhookMeta;

/// Inputs a plan is built from: the applied ledger row plus the resolved
/// participants and the webhook's kind-specific meta.
#[derive(Debug, Clone)]
pub struct PlanContext<'a> {
    pub transaction_id: i64,
    pub provider_txn_id: &'a str,
    pub from_user_id: Option<i64>,
    pub to_user_ids: &'a [i64],
    pub amount: Decimal,
    pub meta: &'a WebhookMeta,
}

/// One kind-specific ledger write to perform after the status transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    CreditTopupReceipt {
        transaction_id: i64,
        user_id: i64,
        amount: Decimal,
    },
    BumpVideoTipTotal {
        video_id: i64,
        amount: Decimal,
    },
    CreditSparkBalance {
        user_id: i64,
        amount: Decimal,
    },
}

/// Everything a reconciled transaction triggers, exactly once.
#[derive(Debug, Clone, Default)]
pub struct KindPlan {
    pub side_effects: Vec<SideEffect>,
    pub hooks: Vec<HookPlan>,
}

/// Plan construction failures. These are data errors: the payload is
/// missing something the kind requires, so retrying the same delivery
/// cannot succeed.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("payload is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("failed to serialize hook payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Build the plan for one (kind, outcome) pair.
///
/// Total over the closed kind set: adding a `TransactionKind` variant
/// makes this a compile error until the new kind gets a plan.
pub fn plan(
    kind: TransactionKind,
    outcome: TransactionOutcome,
    ctx: &PlanContext<'_>,
) -> Result<KindPlan, PlanError> {
    match (kind, outcome) {
        (TransactionKind::Topup, TransactionOutcome::Success) => {
            let user_id = sole_recipient(ctx)?;
            Ok(KindPlan {
                side_effects: vec![SideEffect::CreditTopupReceipt {
                    transaction_id: ctx.transaction_id,
                    user_id,
                    amount: ctx.amount,
                }],
                hooks: vec![push_hook(
                    HookEventKind::TopupDone,
                    &TopupDonePayload {
                        user_id,
                        provider_txn_id: ctx.provider_txn_id.into(),
                        amount: ctx.amount,
                    },
                    smallvec![user_id],
                )?],
            })
        }
        (TransactionKind::Topup, TransactionOutcome::Failure) => {
            let user_id = sole_recipient(ctx)?;
            Ok(KindPlan {
                side_effects: Vec::new(),
                hooks: vec![push_hook(
                    HookEventKind::TopupFailed,
                    &TopupFailedPayload {
                        user_id,
                        provider_txn_id: ctx.provider_txn_id.into(),
                        amount: ctx.amount,
                    },
                    smallvec![user_id],
                )?],
            })
        }

        (TransactionKind::Redemption, TransactionOutcome::Success) => {
            let user_id = sender(ctx)?;
            let product_id = ctx
                .meta
                .redemption_product_id
                .as_ref()
                .ok_or(PlanError::MissingField("redemption_product_id"))?;
            Ok(KindPlan {
                side_effects: Vec::new(),
                hooks: vec![push_hook(
                    HookEventKind::RedemptionDone,
                    &RedemptionDonePayload {
                        user_id,
                        provider_txn_id: ctx.provider_txn_id.into(),
                        amount: ctx.amount,
                        product_id: product_id.clone(),
                    },
                    smallvec![user_id],
                )?],
            })
        }
        (TransactionKind::Redemption, TransactionOutcome::Failure) => Ok(KindPlan::default()),

        (TransactionKind::ReplyOnVideo, TransactionOutcome::Success) => {
            let from_user_id = sender(ctx)?;
            let to_user_id = sole_recipient(ctx)?;
            let video_id = ctx.meta.video_id.ok_or(PlanError::MissingField("video_id"))?;
            Ok(KindPlan {
                side_effects: vec![SideEffect::BumpVideoTipTotal {
                    video_id,
                    amount: ctx.amount,
                }],
                hooks: vec![push_hook(
                    HookEventKind::VideoTipReceived,
                    &VideoTipReceivedPayload {
                        video_id,
                        from_user_id,
                        to_user_id,
                        amount: ctx.amount,
                    },
                    smallvec![to_user_id],
                )?],
            })
        }
        (TransactionKind::ReplyOnVideo, TransactionOutcome::Failure) => Ok(KindPlan::default()),

        (TransactionKind::SparkOnReply, TransactionOutcome::Success) => {
            let from_user_id = sender(ctx)?;
            let to_user_id = sole_recipient(ctx)?;
            let reply_id = ctx.meta.reply_id.ok_or(PlanError::MissingField("reply_id"))?;
            let spark_amount = ctx.meta.spark_amount.unwrap_or(ctx.amount);
            Ok(KindPlan {
                side_effects: vec![SideEffect::CreditSparkBalance {
                    user_id: to_user_id,
                    amount: spark_amount,
                }],
                hooks: vec![push_hook(
                    HookEventKind::ReplyTipReceived,
                    &ReplyTipReceivedPayload {
                        reply_id,
                        parent_video_id: ctx.meta.parent_video_id,
                        from_user_id,
                        to_user_id,
                        spark_amount,
                    },
                    smallvec![to_user_id],
                )?],
            })
        }
        (TransactionKind::SparkOnReply, TransactionOutcome::Failure) => Ok(KindPlan::default()),

        (TransactionKind::UserActivateAirdrop, TransactionOutcome::Success) => {
            let user_id = sole_recipient(ctx)?;
            let spark_amount = ctx.meta.spark_amount.unwrap_or(ctx.amount);
            Ok(KindPlan {
                side_effects: vec![SideEffect::CreditSparkBalance {
                    user_id,
                    amount: spark_amount,
                }],
                hooks: vec![push_hook(
                    HookEventKind::AirdropActivated,
                    &AirdropActivatedPayload {
                        user_id,
                        spark_amount,
                    },
                    smallvec![user_id],
                )?],
            })
        }
        (TransactionKind::UserActivateAirdrop, TransactionOutcome::Failure) => {
            Ok(KindPlan::default())
        }

        (TransactionKind::CompanyToUser, TransactionOutcome::Success) => {
            if ctx.to_user_ids.is_empty() {
                return Err(PlanError::MissingField("to_user_ids"));
            }
            let payload = TransferReceivedPayload {
                from_user_id: None,
                to_user_ids: ctx.to_user_ids.to_vec(),
                provider_txn_id: ctx.provider_txn_id.into(),
                amount: ctx.amount,
            };
            Ok(KindPlan {
                side_effects: Vec::new(),
                hooks: vec![
                    push_hook(
                        HookEventKind::TransferReceived,
                        &payload,
                        SmallVec::from_slice(ctx.to_user_ids),
                    )?,
                    // The company's own system gets a webhook callback for
                    // treasury transfers; the endpoint is configured
                    // globally, so no per-row recipients.
                    HookPlan {
                        event_kind: HookEventKind::TransferReceived,
                        channel: HookChannel::Webhook,
                        payload: serde_json::to_value(&payload)?,
                        recipient_ids: SmallVec::new(),
                    },
                ],
            })
        }
        (TransactionKind::CompanyToUser, TransactionOutcome::Failure) => Ok(KindPlan::default()),

        (TransactionKind::UserTransaction, TransactionOutcome::Success) => {
            let from_user_id = sender(ctx)?;
            if ctx.to_user_ids.is_empty() {
                return Err(PlanError::MissingField("to_user_ids"));
            }
            Ok(KindPlan {
                side_effects: Vec::new(),
                hooks: vec![push_hook(
                    HookEventKind::TransferReceived,
                    &TransferReceivedPayload {
                        from_user_id: Some(from_user_id),
                        to_user_ids: ctx.to_user_ids.to_vec(),
                        provider_txn_id: ctx.provider_txn_id.into(),
                        amount: ctx.amount,
                    },
                    SmallVec::from_slice(ctx.to_user_ids),
                )?],
            })
        }
        (TransactionKind::UserTransaction, TransactionOutcome::Failure) => Ok(KindPlan::default()),
    }
}

fn sole_recipient(ctx: &PlanContext<'_>) -> Result<i64, PlanError> {
    ctx.to_user_ids
        .first()
        .copied()
        .ok_or(PlanError::MissingField("to_user_ids"))
}

fn sender(ctx: &PlanContext<'_>) -> Result<i64, PlanError> {
    ctx.from_user_id
        .ok_or(PlanError::MissingField("from_user_id"))
}

fn push_hook<T: serde::Serialize>(
    event_kind: HookEventKind,
    payload: &T,
    recipient_ids: SmallVec<[i64; 2]>,
) -> Result<HookPlan, PlanError> {
    Ok(HookPlan {
        event_kind,
        channel: HookChannel::Push,
        payload: serde_json::to_value(payload)?,
        recipient_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn full_meta() -> WebhookMeta {
        WebhookMeta {
            video_id: Some(10),
            reply_id: Some(20),
            parent_video_id: Some(10),
            redemption_product_id: Some("prod_1".into()),
            spark_amount: Some(Decimal::from(5)),
        }
    }

    fn ctx<'a>(meta: &'a WebhookMeta, to: &'a [i64]) -> PlanContext<'a> {
        PlanContext {
            transaction_id: 1,
            provider_txn_id: "txn_1",
            from_user_id: Some(100),
            to_user_ids: to,
            amount: Decimal::from(3),
            meta,
        }
    }

    #[test]
    fn dispatch_is_total_over_kinds_and_outcomes() {
        let meta = full_meta();
        let to = [200i64];
        for kind in TransactionKind::ALL {
            for outcome in [TransactionOutcome::Success, TransactionOutcome::Failure] {
                plan(kind, outcome, &ctx(&meta, &to)).unwrap();
            }
        }
    }

    #[test]
    fn hook_counts_are_deterministic_per_kind() {
        let meta = full_meta();
        let to = [200i64];
        let context = ctx(&meta, &to);

        let counts: Vec<usize> = TransactionKind::ALL
            .iter()
            .map(|kind| {
                plan(*kind, TransactionOutcome::Success, &context)
                    .unwrap()
                    .hooks
                    .len()
            })
            .collect();
        // topup, redemption, reply_on_video, spark_on_reply, airdrop,
        // company_to_user (push + webhook), user_transaction
        assert_eq!(counts, vec![1, 1, 1, 1, 1, 2, 1]);
    }

    #[test]
    fn failure_outcomes_have_no_side_effects() {
        let meta = full_meta();
        let to = [200i64];
        let context = ctx(&meta, &to);
        for kind in TransactionKind::ALL {
            let plan = plan(kind, TransactionOutcome::Failure, &context).unwrap();
            assert!(plan.side_effects.is_empty(), "kind {kind} credited on failure");
        }
    }

    #[test]
    fn topup_failure_still_notifies_the_user() {
        let meta = WebhookMeta::default();
        let to = [200i64];
        let plan = plan(
            TransactionKind::Topup,
            TransactionOutcome::Failure,
            &ctx(&meta, &to),
        )
        .unwrap();
        assert_eq!(plan.hooks.len(), 1);
        assert_eq!(plan.hooks[0].event_kind, HookEventKind::TopupFailed);
        assert_eq!(plan.hooks[0].recipient_ids.as_slice(), &[200]);
    }

    #[test]
    fn reply_on_video_requires_video_id() {
        let meta = WebhookMeta::default();
        let to = [200i64];
        let err = plan(
            TransactionKind::ReplyOnVideo,
            TransactionOutcome::Success,
            &ctx(&meta, &to),
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::MissingField("video_id")));
    }

    #[test]
    fn user_transaction_requires_sender() {
        let meta = WebhookMeta::default();
        let to = [200i64];
        let mut context = ctx(&meta, &to);
        context.from_user_id = None;
        let err = plan(
            TransactionKind::UserTransaction,
            TransactionOutcome::Success,
            &context,
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::MissingField("from_user_id")));
    }

    #[test]
    fn airdrop_prefers_quoted_spark_amount() {
        let meta = full_meta();
        let to = [200i64];
        let plan = plan(
            TransactionKind::UserActivateAirdrop,
            TransactionOutcome::Success,
            &ctx(&meta, &to),
        )
        .unwrap();
        assert_eq!(
            plan.side_effects,
            vec![SideEffect::CreditSparkBalance {
                user_id: 200,
                amount: Decimal::from(5),
            }]
        );
    }

    #[test]
    fn company_transfer_emits_push_and_webhook() {
        let meta = WebhookMeta::default();
        let to = [200i64, 201];
        let plan = plan(
            TransactionKind::CompanyToUser,
            TransactionOutcome::Success,
            &ctx(&meta, &to),
        )
        .unwrap();
        assert_eq!(plan.hooks.len(), 2);
        assert_eq!(plan.hooks[0].channel, HookChannel::Push);
        assert_eq!(plan.hooks[0].recipient_ids.as_slice(), &[200, 201]);
        assert_eq!(plan.hooks[1].channel, HookChannel::Webhook);
        assert!(plan.hooks[1].recipient_ids.is_empty());
    }
}
