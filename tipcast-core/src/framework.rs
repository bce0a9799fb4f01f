use sqlx::PgPool;

/// Abstraction over "something queries can execute against": either the
/// shared pool or an open transaction.
pub trait DatabaseAccessor {
    fn acquire(&mut self) -> impl sqlx::PgExecutor<'_>;
}

/// Pool-backed processor. Every entity operation in [`crate::entities`] is
/// implemented as `Processor<Op> for DatabaseProcessor`.
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Clone for DatabaseProcessor {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

/// Transaction-backed processor for multi-statement atomic operations.
pub struct TransactionProcessor<'b> {
    pub tx: sqlx::Transaction<'b, sqlx::Postgres>,
}

impl DatabaseAccessor for DatabaseProcessor {
    fn acquire(&mut self) -> impl sqlx::PgExecutor<'_> {
        &self.pool
    }
}

impl<'b> DatabaseAccessor for TransactionProcessor<'b> {
    fn acquire(&mut self) -> impl sqlx::PgExecutor<'_> {
        &mut *self.tx
    }
}
