use crate::entities::EventStatus;
use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use kanau::processor::Processor;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IngestedEvent {
    pub id: i64,
    pub provider_event_id: CompactString,
    pub status: EventStatus,
    pub payload: serde_json::Value,
    pub created_at: time::PrimitiveDateTime,
    pub processed_at: Option<time::PrimitiveDateTime>,
}

/// Outcome of an insert-if-absent on the event store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First delivery of this `provider_event_id`; row created.
    Fresh(i64),
    /// The event id was already ingested; nothing written.
    Duplicate,
}

#[derive(Debug, Clone)]
/// Insert an event row unless one already exists for the same provider
/// event id.
///
/// `ON CONFLICT DO NOTHING RETURNING id` makes duplicate detection a typed
/// outcome instead of an error path; at-least-once senders hit the
/// `Duplicate` arm on every re-delivery.
pub struct InsertIngestedEvent {
    pub provider_event_id: CompactString,
    pub payload: serde_json::Value,
}

impl Processor<InsertIngestedEvent> for DatabaseProcessor {
    type Output = IngestOutcome;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertIngestedEvent")]
    async fn process(&self, insert: InsertIngestedEvent) -> Result<IngestOutcome, sqlx::Error> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO ingested_events (provider_event_id, payload)
            VALUES ($1, $2)
            ON CONFLICT (provider_event_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(insert.provider_event_id.as_str())
        .bind(&insert.payload)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match id {
            Some(id) => IngestOutcome::Fresh(id),
            None => IngestOutcome::Duplicate,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GetIngestedEventById {
    pub event_id: i64,
}

impl Processor<GetIngestedEventById> for DatabaseProcessor {
    type Output = Option<IngestedEvent>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetIngestedEventById")]
    async fn process(
        &self,
        query: GetIngestedEventById,
    ) -> Result<Option<IngestedEvent>, sqlx::Error> {
        sqlx::query_as::<_, IngestedEvent>(
            r#"
            SELECT id, provider_event_id, status, payload, created_at, processed_at
            FROM ingested_events
            WHERE id = $1
            "#,
        )
        .bind(query.event_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Flip an event to `processed` once reconciliation has applied it.
///
/// Guarded on `pending` so racing workers cannot double-flip; returns the
/// number of rows actually updated.
pub struct MarkEventProcessed {
    pub event_id: i64,
}

impl Processor<MarkEventProcessed> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkEventProcessed")]
    async fn process(&self, cmd: MarkEventProcessed) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE ingested_events
            SET status = 'processed', processed_at = now()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(cmd.event_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Sweep query for events that were ingested but whose in-process job was
/// lost (worker crash between insert and dispatch). Only rows older than
/// `older_than_secs` are returned so the sweep does not race the normal
/// channel-driven path.
pub struct ListStalePendingEvents {
    pub older_than_secs: i64,
    pub limit: i64,
}

impl Processor<ListStalePendingEvents> for DatabaseProcessor {
    type Output = Vec<IngestedEvent>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListStalePendingEvents")]
    async fn process(
        &self,
        query: ListStalePendingEvents,
    ) -> Result<Vec<IngestedEvent>, sqlx::Error> {
        sqlx::query_as::<_, IngestedEvent>(
            r#"
            SELECT id, provider_event_id, status, payload, created_at, processed_at
            FROM ingested_events
            WHERE status = 'pending'
              AND created_at < now() - ($1 * interval '1 second')
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(query.older_than_secs)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
    }
}
