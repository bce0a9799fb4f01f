//! Long-running workers.
//!
//! - `ReconcileWorker`: receives `EventIngested`, applies each event to the
//!   transaction ledger exactly once, marks the event processed
//! - `HookProcessor`: claims batches of queued hooks under a lease,
//!   attempts delivery, and commits per-row outcomes
//!
//! Both are safe to run as many concurrent instances: the reconciler leans
//! on the ledger's uniqueness constraint and the processor on row leases,
//! so killing and respawning either at any point loses no work.

pub mod hook_processor;
pub mod reconcile_worker;

pub use hook_processor::{HookProcessor, HookProcessorConfig};
pub use reconcile_worker::{ReconcileWorker, ReconcileWorkerConfig};
