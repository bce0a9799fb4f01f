//! Inbound transaction webhook wire format.
//!
//! This is the payload the token-economy provider POSTs to
//! `/webhooks/transactions`, signed with the provider secret. The
//! `event_id` is the provider-minted idempotency key for the delivery;
//! `transaction.provider_txn_id` is the idempotency key for the ledger.

use crate::objects::transaction::{TransactionKind, TransactionOutcome};
use crate::signature::Signature;
use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One provider webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionWebhook {
    /// Provider-minted event identifier, unique per logical delivery.
    pub event_id: CompactString,
    pub kind: TransactionKind,
    /// Top-level status of the reported transaction.
    pub outcome: TransactionOutcome,
    pub transaction: WebhookTransaction,
}

impl Signature for TransactionWebhook {}

/// The transaction body inside a webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookTransaction {
    /// Provider-minted transaction identifier (the ledger idempotency key).
    pub provider_txn_id: CompactString,
    /// Sender, in provider user-id space. Absent for provider/company
    /// initiated kinds (topup, airdrop).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_provider_user_id: Option<CompactString>,
    /// Recipients, in provider user-id space. Most kinds have exactly one.
    pub to_provider_user_ids: SmallVec<[CompactString; 2]>,
    pub amount: Decimal,
    #[serde(default)]
    pub meta: WebhookMeta,
}

/// Kind-specific fields. Which of these are mandatory depends on the
/// transaction kind; the reconciler validates per kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_video_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redemption_product_id: Option<CompactString>,
    /// Spark amount when it differs from the settlement `amount`
    /// (e.g. an airdrop quoted in spark rather than fiat).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spark_amount: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_topup_webhook() {
        let json = r#"{
            "event_id": "evt_01",
            "kind": "topup",
            "outcome": "success",
            "transaction": {
                "provider_txn_id": "txn_01",
                "to_provider_user_ids": ["pu_9"],
                "amount": "12.50"
            }
        }"#;
        let parsed: TransactionWebhook = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.kind, TransactionKind::Topup);
        assert_eq!(parsed.outcome, TransactionOutcome::Success);
        assert_eq!(parsed.transaction.provider_txn_id, "txn_01");
        assert!(parsed.transaction.from_provider_user_id.is_none());
        assert_eq!(parsed.transaction.meta, WebhookMeta::default());
    }

    #[test]
    fn parses_reply_webhook_with_meta() {
        let json = r#"{
            "event_id": "evt_02",
            "kind": "reply_on_video",
            "outcome": "success",
            "transaction": {
                "provider_txn_id": "txn_02",
                "from_provider_user_id": "pu_1",
                "to_provider_user_ids": ["pu_2"],
                "amount": "3",
                "meta": { "video_id": 44, "reply_id": 1001 }
            }
        }"#;
        let parsed: TransactionWebhook = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.transaction.meta.video_id, Some(44));
        assert_eq!(parsed.transaction.meta.reply_id, Some(1001));
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        let json = r#"{
            "event_id": "evt_03",
            "kind": "mystery",
            "outcome": "success",
            "transaction": {
                "provider_txn_id": "txn_03",
                "to_provider_user_ids": [],
                "amount": "1"
            }
        }"#;
        assert!(serde_json::from_str::<TransactionWebhook>(json).is_err());
    }
}
