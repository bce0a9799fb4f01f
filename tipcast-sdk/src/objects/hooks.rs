//! Outbound hook payloads.
//!
//! A "hook" is one unit of outbound delivery work — a push notification or
//! an HTTP webhook callback — queued by the reconciler and delivered by
//! the hook processor. Every delivery POSTs a signed [`HookEnvelope`].

use crate::signature::Signature;
use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The closed set of outbound hook kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEventKind {
    TopupDone,
    TopupFailed,
    RedemptionDone,
    VideoTipReceived,
    ReplyTipReceived,
    AirdropActivated,
    TransferReceived,
}

impl std::fmt::Display for HookEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookEventKind::TopupDone => write!(f, "topup_done"),
            HookEventKind::TopupFailed => write!(f, "topup_failed"),
            HookEventKind::RedemptionDone => write!(f, "redemption_done"),
            HookEventKind::VideoTipReceived => write!(f, "video_tip_received"),
            HookEventKind::ReplyTipReceived => write!(f, "reply_tip_received"),
            HookEventKind::AirdropActivated => write!(f, "airdrop_activated"),
            HookEventKind::TransferReceived => write!(f, "transfer_received"),
        }
    }
}

/// The body actually delivered to a push gateway or webhook consumer.
///
/// `payload` is one of the typed payload structs below, serialized; the
/// envelope stays schemaless so consumers can dispatch on `event_kind`
/// before touching the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookEnvelope {
    pub event_kind: HookEventKind,
    pub payload: serde_json::Value,
    /// Unix timestamp of the delivery attempt (not of the original event).
    pub sent_at: i64,
}

impl Signature for HookEnvelope {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopupDonePayload {
    pub user_id: i64,
    pub provider_txn_id: CompactString,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopupFailedPayload {
    pub user_id: i64,
    pub provider_txn_id: CompactString,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionDonePayload {
    pub user_id: i64,
    pub provider_txn_id: CompactString,
    pub amount: Decimal,
    pub product_id: CompactString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTipReceivedPayload {
    pub video_id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyTipReceivedPayload {
    pub reply_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_video_id: Option<i64>,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub spark_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirdropActivatedPayload {
    pub user_id: i64,
    pub spark_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceivedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_user_id: Option<i64>,
    pub to_user_ids: Vec<i64>,
    pub provider_txn_id: CompactString,
    pub amount: Decimal,
}
