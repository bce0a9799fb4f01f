use crate::entities::{TransactionKind, TransactionStatus};
use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use kanau::processor::Processor;
use rust_decimal::Decimal;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRecord {
    pub id: i64,
    pub provider_txn_id: CompactString,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub from_user_id: Option<i64>,
    pub to_user_ids: Vec<i64>,
    pub amount: Decimal,
    pub extra_data: serde_json::Value,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

/// Fields for a new transaction row.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub provider_txn_id: CompactString,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub from_user_id: Option<i64>,
    pub to_user_ids: Vec<i64>,
    pub amount: Decimal,
    pub extra_data: serde_json::Value,
}

/// Outcome of an insert against the `provider_txn_id` uniqueness
/// constraint.
///
/// `AlreadyExists` means a concurrent delivery won the race between the
/// caller's lookup and this insert; the caller re-fetches and takes the
/// update path.
#[derive(Debug, Clone)]
pub enum TxInsertOutcome {
    Inserted(TransactionRecord),
    AlreadyExists,
}

#[derive(Debug, Clone)]
pub struct GetTransactionByProviderId {
    pub provider_txn_id: CompactString,
}

impl Processor<GetTransactionByProviderId> for DatabaseProcessor {
    type Output = Option<TransactionRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetTransactionByProviderId")]
    async fn process(
        &self,
        query: GetTransactionByProviderId,
    ) -> Result<Option<TransactionRecord>, sqlx::Error> {
        sqlx::query_as::<_, TransactionRecord>(
            r#"
            SELECT id, provider_txn_id, kind, status, from_user_id, to_user_ids,
                   amount, extra_data, created_at, updated_at
            FROM transactions
            WHERE provider_txn_id = $1
            "#,
        )
        .bind(query.provider_txn_id.as_str())
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Attempt-insert half of the two-step reconciliation protocol.
///
/// The unique constraint on `provider_txn_id` is the only mutual exclusion
/// for this path; a lost race comes back as the typed `AlreadyExists`
/// outcome rather than a surfaced error.
pub struct InsertTransaction {
    pub txn: NewTransaction,
}

impl Processor<InsertTransaction> for DatabaseProcessor {
    type Output = TxInsertOutcome;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertTransaction")]
    async fn process(&self, insert: InsertTransaction) -> Result<TxInsertOutcome, sqlx::Error> {
        let InsertTransaction { txn } = insert;
        let record = sqlx::query_as::<_, TransactionRecord>(
            r#"
            INSERT INTO transactions
                (provider_txn_id, kind, status, from_user_id, to_user_ids, amount, extra_data)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (provider_txn_id) DO NOTHING
            RETURNING id, provider_txn_id, kind, status, from_user_id, to_user_ids,
                      amount, extra_data, created_at, updated_at
            "#,
        )
        .bind(txn.provider_txn_id.as_str())
        .bind(txn.kind)
        .bind(txn.status)
        .bind(txn.from_user_id)
        .bind(&txn.to_user_ids)
        .bind(txn.amount)
        .bind(&txn.extra_data)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match record {
            Some(record) => TxInsertOutcome::Inserted(record),
            None => TxInsertOutcome::AlreadyExists,
        })
    }
}

#[derive(Debug, Clone)]
/// Conditionally advance a transaction's status.
///
/// The `WHERE status = expected` guard means a terminal status can never be
/// overwritten by a stale or duplicate delivery: if another worker got
/// there first, `rows_affected` is 0 and the caller re-reads to decide.
pub struct AdvanceTransactionStatus {
    pub id: i64,
    pub expected: TransactionStatus,
    pub target: TransactionStatus,
    /// Replacement extra_data, or `None` to keep the existing value.
    pub extra_data: Option<serde_json::Value>,
}

impl Processor<AdvanceTransactionStatus> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AdvanceTransactionStatus")]
    async fn process(&self, cmd: AdvanceTransactionStatus) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $3,
                extra_data = COALESCE($4, extra_data),
                updated_at = now()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(cmd.id)
        .bind(cmd.expected)
        .bind(cmd.target)
        .bind(cmd.extra_data)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
