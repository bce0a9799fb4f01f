//! HookProcessor: the lease-based delivery worker.
//!
//! One processing cycle:
//! 1. atomically claim up to a batch of rows (fresh pass or retry pass,
//!    never both in one claim), stamping them with a fresh lease
//! 2. read back exactly the rows this lease owns
//! 3. attempt every row, failures isolated per row; outcomes accumulate
//!    in memory only
//! 4. commit all outcomes in one database transaction, releasing every
//!    lease
//!
//! No database write happens between claim and commit, so a worker killed
//! mid-batch leaves rows locked-but-unmodified; once the lease expires a
//! later cycle reclaims them. That is what makes the hard external restart
//! interval safe.

use crate::entities::notification_hook::{
    AcquireHookLease, CommitHookOutcomes, FetchLeasedHooks, LeasePass, RetryRoute, TerminalRoute,
};
use crate::events::HooksEnqueuedReceiver;
use crate::framework::DatabaseProcessor;
use crate::hooks::{DeliveryVerdict, HookTransport};
use crate::utils::retry::{retry_delay, with_jitter};
use futures_util::StreamExt;
use futures_util::stream;
use kanau::processor::Processor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Tuning for a hook processor instance.
#[derive(Debug, Clone, Copy)]
pub struct HookProcessorConfig {
    /// Numeric identifier of this worker instance, for logs and metrics.
    pub worker_id: u32,
    /// Maximum rows claimed per cycle.
    pub batch_size: i64,
    /// Idle wait between cycles when no wake nudge arrives.
    pub poll_interval: Duration,
    /// Lease duration. Must comfortably exceed the worst-case batch wall
    /// time, or a slow batch's rows get reclaimed mid-flight.
    pub lease_secs: i64,
    /// Failure count at which a hook becomes COMPLETELY_FAILED.
    pub retry_cap: i32,
    /// Concurrent delivery attempts within one batch.
    pub delivery_parallelism: usize,
}

impl Default for HookProcessorConfig {
    fn default() -> Self {
        Self {
            worker_id: 0,
            batch_size: 25,
            poll_interval: Duration::from_secs(5),
            lease_secs: 120,
            retry_cap: 5,
            delivery_parallelism: 8,
        }
    }
}

/// One delivery attempt's result, keyed by row id and the retry count the
/// row carried when claimed.
pub type AttemptResult = (i64, i32, DeliveryVerdict);

/// HookProcessor claims and delivers queued notification hooks.
pub struct HookProcessor {
    db: DatabaseProcessor,
    transport: Arc<dyn HookTransport>,
    config: HookProcessorConfig,
}

impl HookProcessor {
    pub fn new(
        db: DatabaseProcessor,
        transport: Arc<dyn HookTransport>,
        config: HookProcessorConfig,
    ) -> Self {
        Self {
            db,
            transport,
            config,
        }
    }

    /// Run the HookProcessor until shutdown is signaled.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut wake_rx: HooksEnqueuedReceiver,
    ) {
        info!(worker_id = self.config.worker_id, "HookProcessor started");

        // Alternate fresh and retry passes so neither population can
        // starve the other under sustained load.
        let mut retry_turn = false;

        loop {
            tokio::select! {
                biased;

                // Check for shutdown
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(
                            worker_id = self.config.worker_id,
                            "HookProcessor received shutdown signal"
                        );
                        break;
                    }
                }

                // Freshly enqueued hooks: jump straight to a fresh pass.
                Some(event) = wake_rx.recv() => {
                    debug!(hook_count = event.hook_count, "Received HooksEnqueued nudge");
                    self.drain_pass(LeasePass::Fresh, &shutdown_rx).await;
                }

                // Poll tick: run the next scheduled pass.
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    let pass = if retry_turn {
                        LeasePass::Retry { retry_cap: self.config.retry_cap }
                    } else {
                        LeasePass::Fresh
                    };
                    retry_turn = !retry_turn;
                    self.drain_pass(pass, &shutdown_rx).await;
                }
            }
        }

        info!(
            worker_id = self.config.worker_id,
            "HookProcessor shutdown complete"
        );
    }

    /// Run cycles of one pass until the backlog is shorter than a batch.
    async fn drain_pass(&self, pass: LeasePass, shutdown_rx: &watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            match self.run_cycle(pass).await {
                Ok(claimed) => {
                    if claimed < self.config.batch_size as u64 {
                        break;
                    }
                }
                Err(e) => {
                    error!(
                        worker_id = self.config.worker_id,
                        error = %e,
                        "Hook cycle failed"
                    );
                    break;
                }
            }
        }
    }

    /// One claim → fetch → attempt → commit cycle. Returns the number of
    /// rows claimed.
    async fn run_cycle(&self, pass: LeasePass) -> Result<u64, sqlx::Error> {
        let lock_id = Uuid::new_v4();

        let claimed = self
            .db
            .process(AcquireHookLease {
                pass,
                lock_id,
                lease_secs: self.config.lease_secs,
                batch_size: self.config.batch_size,
            })
            .await?;

        if claimed == 0 {
            return Ok(0);
        }

        // Fetch by lock id rather than trusting `claimed`: only rows this
        // lease actually owns get processed.
        let hooks = self.db.process(FetchLeasedHooks { lock_id }).await?;

        debug!(
            worker_id = self.config.worker_id,
            pass = ?pass,
            claimed,
            fetched = hooks.len(),
            "Processing hook batch"
        );

        // Attempt every row; nothing is written until the whole batch has
        // been tried. Rows are independent, so attempts run with bounded
        // parallelism.
        let results: Vec<AttemptResult> = stream::iter(hooks)
            .map(|hook| async move {
                let verdict = self.transport.deliver(&hook).await;
                if let DeliveryVerdict::Retry(reason) | DeliveryVerdict::Reject(reason) = &verdict {
                    warn!(
                        hook_id = hook.id,
                        event_kind = ?hook.event_kind,
                        retry_count = hook.retry_count,
                        reason = %reason,
                        "Hook delivery attempt failed"
                    );
                }
                (hook.id, hook.retry_count, verdict)
            })
            .buffer_unordered(self.config.delivery_parallelism)
            .collect()
            .await;

        let outcomes = partition_outcomes(lock_id, results, self.config.retry_cap);

        info!(
            worker_id = self.config.worker_id,
            succeeded = outcomes.succeeded.len(),
            retried = outcomes.retried.len(),
            exhausted = outcomes.exhausted.len(),
            ignored = outcomes.ignored.len(),
            "Committing hook batch outcomes"
        );

        self.db.process(outcomes).await?;
        Ok(claimed)
    }
}

/// Partition a batch's delivery verdicts into commit sets.
///
/// Budget rule: a recoverable failure whose incremented count reaches the
/// cap becomes COMPLETELY_FAILED; below the cap it re-enters the retry
/// pool with an exponential (jittered) delay. Permanent rejections skip
/// the budget entirely.
pub fn partition_outcomes(
    lock_id: Uuid,
    results: Vec<AttemptResult>,
    retry_cap: i32,
) -> CommitHookOutcomes {
    let mut outcomes = CommitHookOutcomes {
        lock_id,
        succeeded: Vec::new(),
        retried: Vec::new(),
        exhausted: Vec::new(),
        ignored: Vec::new(),
    };

    for (id, retry_count, verdict) in results {
        match verdict {
            DeliveryVerdict::Delivered => outcomes.succeeded.push(id),
            DeliveryVerdict::Ignore(reason) => {
                outcomes.ignored.push(TerminalRoute { id, error: reason });
            }
            DeliveryVerdict::Reject(reason) => {
                outcomes.exhausted.push(TerminalRoute { id, error: reason });
            }
            DeliveryVerdict::Retry(reason) => {
                let attempted = retry_count.saturating_add(1);
                if attempted >= retry_cap {
                    outcomes.exhausted.push(TerminalRoute { id, error: reason });
                } else {
                    let delay = with_jitter(retry_delay(attempted.max(0) as u32));
                    outcomes.retried.push(RetryRoute {
                        id,
                        delay_secs: delay.as_secs() as i64,
                        error: reason,
                    });
                }
            }
        }
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdicts() -> Vec<AttemptResult> {
        vec![
            (1, 0, DeliveryVerdict::Delivered),
            (2, 0, DeliveryVerdict::Retry("503".to_string())),
            (3, 0, DeliveryVerdict::Reject("400".to_string())),
            (4, 0, DeliveryVerdict::Ignore("410".to_string())),
        ]
    }

    #[test]
    fn mixed_batch_partitions_into_all_four_sets() {
        let outcomes = partition_outcomes(Uuid::new_v4(), verdicts(), 5);
        assert_eq!(outcomes.succeeded, vec![1]);
        assert_eq!(outcomes.retried.len(), 1);
        assert_eq!(outcomes.retried[0].id, 2);
        assert_eq!(outcomes.exhausted.len(), 1);
        assert_eq!(outcomes.exhausted[0].id, 3);
        assert_eq!(outcomes.ignored.len(), 1);
        assert_eq!(outcomes.ignored[0].id, 4);
    }

    #[test]
    fn failure_below_cap_goes_back_to_retry_pool() {
        let outcomes = partition_outcomes(
            Uuid::new_v4(),
            vec![(7, 3, DeliveryVerdict::Retry("timeout".to_string()))],
            5,
        );
        assert_eq!(outcomes.retried.len(), 1);
        assert!(outcomes.exhausted.is_empty());
    }

    #[test]
    fn failure_reaching_cap_is_completely_failed() {
        // retry_count 4 with cap 5: this failure is the fifth, the row is
        // done for good.
        let outcomes = partition_outcomes(
            Uuid::new_v4(),
            vec![(7, 4, DeliveryVerdict::Retry("timeout".to_string()))],
            5,
        );
        assert!(outcomes.retried.is_empty());
        assert_eq!(outcomes.exhausted.len(), 1);
        assert_eq!(outcomes.exhausted[0].id, 7);
    }

    #[test]
    fn permanent_rejection_skips_the_retry_budget() {
        let outcomes = partition_outcomes(
            Uuid::new_v4(),
            vec![(9, 0, DeliveryVerdict::Reject("unprocessable".to_string()))],
            5,
        );
        assert!(outcomes.retried.is_empty());
        assert_eq!(outcomes.exhausted.len(), 1);
    }

    #[test]
    fn retry_delay_grows_with_the_failure_count() {
        let first = partition_outcomes(
            Uuid::new_v4(),
            vec![(1, 0, DeliveryVerdict::Retry("x".to_string()))],
            10,
        );
        let fifth = partition_outcomes(
            Uuid::new_v4(),
            vec![(1, 4, DeliveryVerdict::Retry("x".to_string()))],
            10,
        );
        // Jitter adds at most 25%, so the windows cannot overlap.
        assert!(first.retried[0].delay_secs <= 3);
        assert!(fifth.retried[0].delay_secs >= 32);
    }

    #[test]
    fn empty_batch_produces_empty_commit() {
        let outcomes = partition_outcomes(Uuid::new_v4(), Vec::new(), 5);
        assert!(outcomes.succeeded.is_empty());
        assert!(outcomes.retried.is_empty());
        assert!(outcomes.exhausted.is_empty());
        assert!(outcomes.ignored.is_empty());
    }
}
