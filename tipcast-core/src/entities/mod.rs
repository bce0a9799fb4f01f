pub mod ingested_event;
pub mod ledger;
pub mod notification_hook;
pub mod transaction;
pub mod user_link;

use tipcast_sdk::objects::hooks::HookEventKind as SdkHookEventKind;
use tipcast_sdk::objects::transaction::TransactionKind as SdkTransactionKind;

/// Transaction kind for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see
/// `tipcast_sdk::objects::transaction::TransactionKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "transaction_kind")]
pub enum TransactionKind {
    Topup,
    Redemption,
    ReplyOnVideo,
    SparkOnReply,
    UserActivateAirdrop,
    CompanyToUser,
    UserTransaction,
}

impl From<TransactionKind> for SdkTransactionKind {
    fn from(value: TransactionKind) -> Self {
        match value {
            TransactionKind::Topup => SdkTransactionKind::Topup,
            TransactionKind::Redemption => SdkTransactionKind::Redemption,
            TransactionKind::ReplyOnVideo => SdkTransactionKind::ReplyOnVideo,
            TransactionKind::SparkOnReply => SdkTransactionKind::SparkOnReply,
            TransactionKind::UserActivateAirdrop => SdkTransactionKind::UserActivateAirdrop,
            TransactionKind::CompanyToUser => SdkTransactionKind::CompanyToUser,
            TransactionKind::UserTransaction => SdkTransactionKind::UserTransaction,
        }
    }
}

impl From<SdkTransactionKind> for TransactionKind {
    fn from(value: SdkTransactionKind) -> Self {
        match value {
            SdkTransactionKind::Topup => TransactionKind::Topup,
            SdkTransactionKind::Redemption => TransactionKind::Redemption,
            SdkTransactionKind::ReplyOnVideo => TransactionKind::ReplyOnVideo,
            SdkTransactionKind::SparkOnReply => TransactionKind::SparkOnReply,
            SdkTransactionKind::UserActivateAirdrop => TransactionKind::UserActivateAirdrop,
            SdkTransactionKind::CompanyToUser => TransactionKind::CompanyToUser,
            SdkTransactionKind::UserTransaction => TransactionKind::UserTransaction,
        }
    }
}

/// Ledger status of a transaction row.
///
/// `Done` and `Failed` are terminal: once reached, only a re-delivery of
/// the *same* terminal status is accepted (as a no-op).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "transaction_status")]
pub enum TransactionStatus {
    Pending,
    Done,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Done | TransactionStatus::Failed)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Done => write!(f, "done"),
            TransactionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Processing status of an ingested event row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "event_status")]
pub enum EventStatus {
    Pending,
    Processed,
}

/// Delivery status of a notification hook row.
///
/// `Success`, `CompletelyFailed` and `Ignored` are terminal. `Failed` rows
/// re-enter the queue through the retry pass until the retry budget is
/// exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "hook_status")]
pub enum HookStatus {
    Pending,
    Success,
    Failed,
    CompletelyFailed,
    Ignored,
}

impl std::fmt::Display for HookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookStatus::Pending => write!(f, "pending"),
            HookStatus::Success => write!(f, "success"),
            HookStatus::Failed => write!(f, "failed"),
            HookStatus::CompletelyFailed => write!(f, "completely_failed"),
            HookStatus::Ignored => write!(f, "ignored"),
        }
    }
}

/// Outbound delivery channel of a hook row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "hook_channel")]
pub enum HookChannel {
    Push,
    Webhook,
}

impl std::fmt::Display for HookChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookChannel::Push => write!(f, "push"),
            HookChannel::Webhook => write!(f, "webhook"),
        }
    }
}

/// Hook event kind for database operations.
///
/// sqlx::Type twin of `tipcast_sdk::objects::hooks::HookEventKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "hook_event_kind")]
pub enum HookEventKind {
    TopupDone,
    TopupFailed,
    RedemptionDone,
    VideoTipReceived,
    ReplyTipReceived,
    AirdropActivated,
    TransferReceived,
}

impl From<HookEventKind> for SdkHookEventKind {
    fn from(value: HookEventKind) -> Self {
        match value {
            HookEventKind::TopupDone => SdkHookEventKind::TopupDone,
            HookEventKind::TopupFailed => SdkHookEventKind::TopupFailed,
            HookEventKind::RedemptionDone => SdkHookEventKind::RedemptionDone,
            HookEventKind::VideoTipReceived => SdkHookEventKind::VideoTipReceived,
            HookEventKind::ReplyTipReceived => SdkHookEventKind::ReplyTipReceived,
            HookEventKind::AirdropActivated => SdkHookEventKind::AirdropActivated,
            HookEventKind::TransferReceived => SdkHookEventKind::TransferReceived,
        }
    }
}

impl From<SdkHookEventKind> for HookEventKind {
    fn from(value: SdkHookEventKind) -> Self {
        match value {
            SdkHookEventKind::TopupDone => HookEventKind::TopupDone,
            SdkHookEventKind::TopupFailed => HookEventKind::TopupFailed,
            SdkHookEventKind::RedemptionDone => HookEventKind::RedemptionDone,
            SdkHookEventKind::VideoTipReceived => HookEventKind::VideoTipReceived,
            SdkHookEventKind::ReplyTipReceived => HookEventKind::ReplyTipReceived,
            SdkHookEventKind::AirdropActivated => HookEventKind::AirdropActivated,
            SdkHookEventKind::TransferReceived => HookEventKind::TransferReceived,
        }
    }
}
