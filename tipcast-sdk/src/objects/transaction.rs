//! Transaction kind and outcome as they appear on the wire.
//!
//! These are the API/DTO versions without `sqlx::Type`. For database
//! operations, use the versions in `tipcast-core::entities`.

use serde::{Deserialize, Serialize};

/// The closed set of transaction kinds the provider reports.
///
/// Adding a kind here is a compile-enforced change: every dispatch site is
/// a total `match`, so the compiler points at everything that must learn
/// about the new kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Fiat purchase of spark (in-app token).
    Topup,
    /// Spark redeemed for an external product.
    Redemption,
    /// Paid reply posted on a video.
    ReplyOnVideo,
    /// Spark tip attached to a reply.
    SparkOnReply,
    /// Signup airdrop released on account activation.
    UserActivateAirdrop,
    /// Company treasury transfer to a user.
    CompanyToUser,
    /// Direct user-to-user transfer.
    UserTransaction,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Topup => write!(f, "topup"),
            TransactionKind::Redemption => write!(f, "redemption"),
            TransactionKind::ReplyOnVideo => write!(f, "reply_on_video"),
            TransactionKind::SparkOnReply => write!(f, "spark_on_reply"),
            TransactionKind::UserActivateAirdrop => write!(f, "user_activate_airdrop"),
            TransactionKind::CompanyToUser => write!(f, "company_to_user"),
            TransactionKind::UserTransaction => write!(f, "user_transaction"),
        }
    }
}

impl TransactionKind {
    /// Every kind, for exhaustive table-driven tests.
    pub const ALL: [TransactionKind; 7] = [
        TransactionKind::Topup,
        TransactionKind::Redemption,
        TransactionKind::ReplyOnVideo,
        TransactionKind::SparkOnReply,
        TransactionKind::UserActivateAirdrop,
        TransactionKind::CompanyToUser,
        TransactionKind::UserTransaction,
    ];
}

/// The top-level status field of a provider webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionOutcome {
    Success,
    Failure,
}

impl std::fmt::Display for TransactionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionOutcome::Success => write!(f, "success"),
            TransactionOutcome::Failure => write!(f, "failure"),
        }
    }
}
