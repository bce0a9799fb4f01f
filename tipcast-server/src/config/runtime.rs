//! Validated runtime configuration.
//!
//! Each section lives behind its own `Arc<RwLock<_>>` so a SIGHUP reload
//! can swap one section without blocking readers of the others.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tipcast_core::hooks::HookEndpoint;
use tipcast_core::processors::HookProcessorConfig;
use tipcast_core::reconcile::RaceBackoff;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

/// Admin authentication. Only the argon2 hash is kept in memory; the
/// header value is verified against it per request.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    secret_hash: String,
}

impl AdminConfig {
    pub fn new(secret_hash: String) -> Self {
        Self { secret_hash }
    }

    /// Verify a plaintext admin secret against the stored hash.
    pub fn verify(&self, plaintext: &str) -> bool {
        use argon2::{Argon2, PasswordHash, PasswordVerifier};

        let Ok(parsed) = PasswordHash::new(&self.secret_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

/// The inbound webhook signer.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    secret: Box<[u8]>,
}

impl ProviderConfig {
    pub fn new(name: String, secret: Box<[u8]>) -> Self {
        Self { name, secret }
    }

    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}

/// Outbound delivery endpoints.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub push: HookEndpoint,
    pub webhook: Option<HookEndpoint>,
}

/// Worker tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub batch_size: i64,
    pub retry_cap: i32,
    pub lease_secs: i64,
    pub poll_secs: u64,
    pub delivery_parallelism: usize,
    pub race_backoff_ms: u64,
    pub race_refetch_attempts: u32,
}

impl WorkerConfig {
    pub fn hook_processor_config(&self, worker_id: u32) -> HookProcessorConfig {
        HookProcessorConfig {
            worker_id,
            batch_size: self.batch_size,
            poll_interval: Duration::from_secs(self.poll_secs),
            lease_secs: self.lease_secs,
            retry_cap: self.retry_cap,
            delivery_parallelism: self.delivery_parallelism,
        }
    }

    pub fn race_backoff(&self) -> RaceBackoff {
        RaceBackoff {
            delay: Duration::from_millis(self.race_backoff_ms),
            refetch_attempts: self.race_refetch_attempts,
        }
    }
}

/// All config sections, individually lockable.
#[derive(Clone)]
pub struct SharedConfig {
    pub server: Arc<RwLock<ServerConfig>>,
    pub admin: Arc<RwLock<AdminConfig>>,
    pub provider: Arc<RwLock<ProviderConfig>>,
    pub delivery: Arc<RwLock<DeliveryConfig>>,
    pub worker: Arc<RwLock<WorkerConfig>>,
}
