use crate::entities::{HookChannel, HookEventKind, HookStatus};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationHook {
    pub id: i64,
    pub event_kind: HookEventKind,
    pub channel: HookChannel,
    pub payload: serde_json::Value,
    pub recipient_ids: Vec<i64>,
    pub status: HookStatus,
    pub lock_id: Option<Uuid>,
    pub lock_expires_at: Option<time::PrimitiveDateTime>,
    pub retry_count: i32,
    pub next_retry_at: Option<time::PrimitiveDateTime>,
    pub last_error: Option<String>,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

/// Fields for a new hook row. Always enters the queue as PENDING with a
/// zero retry count.
#[derive(Debug, Clone)]
pub struct NewHook {
    pub event_kind: HookEventKind,
    pub channel: HookChannel,
    pub payload: serde_json::Value,
    pub recipient_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
/// Bulk-insert hook rows, returning the new ids.
pub struct InsertNotificationHooks {
    pub hooks: Vec<NewHook>,
}

impl Processor<InsertNotificationHooks> for DatabaseProcessor {
    type Output = Vec<i64>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertNotificationHooks")]
    async fn process(&self, insert: InsertNotificationHooks) -> Result<Vec<i64>, sqlx::Error> {
        if insert.hooks.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO notification_hooks (event_kind, channel, payload, recipient_ids) ",
        );

        query_builder.push_values(insert.hooks, |mut b, hook| {
            b.push_bind(hook.event_kind)
                .push_bind(hook.channel)
                .push_bind(hook.payload)
                .push_bind(hook.recipient_ids);
        });

        query_builder.push(" RETURNING id");

        query_builder
            .build_query_scalar::<i64>()
            .fetch_all(&self.pool)
            .await
    }
}

/// Which population a claim cycle targets. The two passes are mutually
/// exclusive per claim: a cycle sweeps either fresh rows or the retry
/// pool, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeasePass {
    /// PENDING rows that have never been attempted (or whose lease
    /// expired mid-flight before any outcome was committed).
    Fresh,
    /// FAILED rows below the retry cap whose backoff delay has elapsed.
    Retry { retry_cap: i32 },
}

#[derive(Debug, Clone)]
/// Atomically claim up to `batch_size` rows for this worker.
///
/// Stamps every claimed row with a fresh `lock_id` and an expiry, so a
/// worker that dies mid-batch strands nothing: once `lock_expires_at`
/// passes, the rows are claimable again. `FOR UPDATE SKIP LOCKED` keeps
/// concurrent claimers from blocking on each other.
pub struct AcquireHookLease {
    pub pass: LeasePass,
    pub lock_id: Uuid,
    pub lease_secs: i64,
    pub batch_size: i64,
}

impl Processor<AcquireHookLease> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AcquireHookLease")]
    async fn process(&self, claim: AcquireHookLease) -> Result<u64, sqlx::Error> {
        let result = match claim.pass {
            LeasePass::Fresh => {
                sqlx::query(
                    r#"
                    UPDATE notification_hooks
                    SET lock_id = $1,
                        lock_expires_at = now() + ($2 * interval '1 second'),
                        updated_at = now()
                    WHERE id IN (
                        SELECT id FROM notification_hooks
                        WHERE status = 'pending'
                          AND (lock_id IS NULL OR lock_expires_at < now())
                        ORDER BY created_at ASC
                        LIMIT $3
                        FOR UPDATE SKIP LOCKED
                    )
                    "#,
                )
                .bind(claim.lock_id)
                .bind(claim.lease_secs)
                .bind(claim.batch_size)
                .execute(&self.pool)
                .await?
            }
            LeasePass::Retry { retry_cap } => {
                sqlx::query(
                    r#"
                    UPDATE notification_hooks
                    SET lock_id = $1,
                        lock_expires_at = now() + ($2 * interval '1 second'),
                        updated_at = now()
                    WHERE id IN (
                        SELECT id FROM notification_hooks
                        WHERE status = 'failed'
                          AND retry_count < $4
                          AND (next_retry_at IS NULL OR next_retry_at <= now())
                          AND (lock_id IS NULL OR lock_expires_at < now())
                        ORDER BY next_retry_at ASC NULLS FIRST
                        LIMIT $3
                        FOR UPDATE SKIP LOCKED
                    )
                    "#,
                )
                .bind(claim.lock_id)
                .bind(claim.lease_secs)
                .bind(claim.batch_size)
                .bind(retry_cap)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Read back exactly the rows a claim stamped.
///
/// Fetching by `lock_id` (rather than trusting the claim's row estimate)
/// guards against processing rows a racing claim actually owns.
pub struct FetchLeasedHooks {
    pub lock_id: Uuid,
}

impl Processor<FetchLeasedHooks> for DatabaseProcessor {
    type Output = Vec<NotificationHook>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FetchLeasedHooks")]
    async fn process(&self, query: FetchLeasedHooks) -> Result<Vec<NotificationHook>, sqlx::Error> {
        sqlx::query_as::<_, NotificationHook>(
            r#"
            SELECT id, event_kind, channel, payload, recipient_ids, status,
                   lock_id, lock_expires_at, retry_count, next_retry_at,
                   last_error, created_at, updated_at
            FROM notification_hooks
            WHERE lock_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(query.lock_id)
        .fetch_all(&self.pool)
        .await
    }
}

/// A failed row routed back to the retry pool: its id, the backoff delay
/// before the next attempt, and the error to record.
#[derive(Debug, Clone)]
pub struct RetryRoute {
    pub id: i64,
    pub delay_secs: i64,
    pub error: String,
}

/// A row leaving the queue with an error attached (exhausted or ignored).
#[derive(Debug, Clone)]
pub struct TerminalRoute {
    pub id: i64,
    pub error: String,
}

#[derive(Debug, Clone)]
/// Commit a whole batch's outcomes in one database transaction.
///
/// Nothing is written while rows are still being attempted; this runs once
/// per batch so a crash mid-batch leaves every row locked-but-unmodified
/// and therefore reclaimable after the lease expires. Every statement is
/// additionally guarded on `lock_id` so a commit can never touch rows
/// whose lease has been reclaimed by another worker in the meantime.
pub struct CommitHookOutcomes {
    pub lock_id: Uuid,
    pub succeeded: Vec<i64>,
    pub retried: Vec<RetryRoute>,
    pub exhausted: Vec<TerminalRoute>,
    pub ignored: Vec<TerminalRoute>,
}

impl Processor<CommitHookOutcomes> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CommitHookOutcomes")]
    async fn process(&self, commit: CommitHookOutcomes) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        if !commit.succeeded.is_empty() {
            sqlx::query(
                r#"
                UPDATE notification_hooks
                SET status = 'success',
                    lock_id = NULL, lock_expires_at = NULL,
                    last_error = NULL, updated_at = now()
                WHERE id = ANY($1) AND lock_id = $2
                "#,
            )
            .bind(&commit.succeeded)
            .bind(commit.lock_id)
            .execute(&mut *tx)
            .await?;
        }

        if !commit.retried.is_empty() {
            let ids: Vec<i64> = commit.retried.iter().map(|r| r.id).collect();
            let delays: Vec<i64> = commit.retried.iter().map(|r| r.delay_secs).collect();
            let errors: Vec<String> = commit.retried.iter().map(|r| r.error.clone()).collect();

            sqlx::query(
                r#"
                UPDATE notification_hooks AS h
                SET status = 'failed',
                    retry_count = h.retry_count + 1,
                    next_retry_at = now() + (u.delay_secs * interval '1 second'),
                    last_error = u.error,
                    lock_id = NULL, lock_expires_at = NULL,
                    updated_at = now()
                FROM UNNEST($1::bigint[], $2::bigint[], $3::text[])
                    AS u(id, delay_secs, error)
                WHERE h.id = u.id AND h.lock_id = $4
                "#,
            )
            .bind(&ids)
            .bind(&delays)
            .bind(&errors)
            .bind(commit.lock_id)
            .execute(&mut *tx)
            .await?;
        }

        if !commit.exhausted.is_empty() {
            let ids: Vec<i64> = commit.exhausted.iter().map(|r| r.id).collect();
            let errors: Vec<String> = commit.exhausted.iter().map(|r| r.error.clone()).collect();

            sqlx::query(
                r#"
                UPDATE notification_hooks AS h
                SET status = 'completely_failed',
                    retry_count = h.retry_count + 1,
                    next_retry_at = NULL,
                    last_error = u.error,
                    lock_id = NULL, lock_expires_at = NULL,
                    updated_at = now()
                FROM UNNEST($1::bigint[], $2::text[]) AS u(id, error)
                WHERE h.id = u.id AND h.lock_id = $3
                "#,
            )
            .bind(&ids)
            .bind(&errors)
            .bind(commit.lock_id)
            .execute(&mut *tx)
            .await?;
        }

        if !commit.ignored.is_empty() {
            let ids: Vec<i64> = commit.ignored.iter().map(|r| r.id).collect();
            let errors: Vec<String> = commit.ignored.iter().map(|r| r.error.clone()).collect();

            sqlx::query(
                r#"
                UPDATE notification_hooks AS h
                SET status = 'ignored',
                    last_error = u.error,
                    lock_id = NULL, lock_expires_at = NULL,
                    updated_at = now()
                FROM UNNEST($1::bigint[], $2::text[]) AS u(id, error)
                WHERE h.id = u.id AND h.lock_id = $3
                "#,
            )
            .bind(&ids)
            .bind(&errors)
            .bind(commit.lock_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}

#[derive(Debug, Clone)]
/// Audit listing of hooks that exhausted their retry budget.
pub struct ListCompletelyFailedHooks {
    pub limit: i64,
    pub offset: i64,
}

impl Processor<ListCompletelyFailedHooks> for DatabaseProcessor {
    type Output = Vec<NotificationHook>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListCompletelyFailedHooks")]
    async fn process(
        &self,
        query: ListCompletelyFailedHooks,
    ) -> Result<Vec<NotificationHook>, sqlx::Error> {
        sqlx::query_as::<_, NotificationHook>(
            r#"
            SELECT id, event_kind, channel, payload, recipient_ids, status,
                   lock_id, lock_expires_at, retry_count, next_retry_at,
                   last_error, created_at, updated_at
            FROM notification_hooks
            WHERE status = 'completely_failed'
            ORDER BY updated_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Manual-intervention path: put a completely-failed hook back into the
/// queue with a fresh retry budget.
pub struct RequeueHook {
    pub hook_id: i64,
}

impl Processor<RequeueHook> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RequeueHook")]
    async fn process(&self, cmd: RequeueHook) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notification_hooks
            SET status = 'pending',
                retry_count = 0,
                next_retry_at = NULL,
                last_error = NULL,
                lock_id = NULL, lock_expires_at = NULL,
                updated_at = now()
            WHERE id = $1 AND status = 'completely_failed'
            "#,
        )
        .bind(cmd.hook_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
