//! Kind-specific side-effect targets.
//!
//! Each operation here is shaped so that re-running it for the same
//! transaction cannot double-apply: the top-up receipt is insert-once per
//! transaction id, and the aggregate bumps are only ever executed from the
//! reconciliation arm that actually applied the status transition.

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
/// Credit the fiat top-up ledger. Insert-once per transaction; returns
/// whether a receipt was actually written.
pub struct CreditTopupReceipt {
    pub transaction_id: i64,
    pub user_id: i64,
    pub amount: Decimal,
}

impl Processor<CreditTopupReceipt> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CreditTopupReceipt")]
    async fn process(&self, cmd: CreditTopupReceipt) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO topup_receipts (transaction_id, user_id, amount)
            VALUES ($1, $2, $3)
            ON CONFLICT (transaction_id) DO NOTHING
            "#,
        )
        .bind(cmd.transaction_id)
        .bind(cmd.user_id)
        .bind(cmd.amount)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
/// Add a tip to a video's running totals.
pub struct BumpVideoTipTotal {
    pub video_id: i64,
    pub amount: Decimal,
}

impl Processor<BumpVideoTipTotal> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:BumpVideoTipTotal")]
    async fn process(&self, cmd: BumpVideoTipTotal) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO video_tip_totals (video_id, total_amount, tip_count)
            VALUES ($1, $2, 1)
            ON CONFLICT (video_id) DO UPDATE
            SET total_amount = video_tip_totals.total_amount + EXCLUDED.total_amount,
                tip_count = video_tip_totals.tip_count + 1,
                updated_at = now()
            "#,
        )
        .bind(cmd.video_id)
        .bind(cmd.amount)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Credit a user's spark balance.
pub struct CreditSparkBalance {
    pub user_id: i64,
    pub amount: Decimal,
}

impl Processor<CreditSparkBalance> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CreditSparkBalance")]
    async fn process(&self, cmd: CreditSparkBalance) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO spark_balances (user_id, balance)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET balance = spark_balances.balance + EXCLUDED.balance,
                updated_at = now()
            "#,
        )
        .bind(cmd.user_id)
        .bind(cmd.amount)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
