//! On-disk TOML configuration shape.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerSection,
    pub admin: AdminSection,
    pub provider: ProviderSection,
    pub delivery: DeliverySection,
    #[serde(default)]
    pub worker: WorkerSection,
}

impl FileConfig {
    /// Whether the admin secret has already been hashed in place.
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    pub listen: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSection {
    /// Plaintext on first boot; rewritten as an argon2 hash on load.
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSection {
    /// Display name of the token-economy provider, for logs only.
    pub name: String,
    /// Shared secret the provider signs inbound webhooks with.
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySection {
    /// Push gateway endpoint for user notifications.
    pub push_url: Url,
    pub push_secret: String,
    /// Optional partner webhook consumer endpoint.
    #[serde(default)]
    pub webhook_url: Option<Url>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    pub batch_size: i64,
    pub retry_cap: i32,
    pub lease_secs: i64,
    pub poll_secs: u64,
    pub delivery_parallelism: usize,
    pub race_backoff_ms: u64,
    pub race_refetch_attempts: u32,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            batch_size: 25,
            retry_cap: 5,
            lease_secs: 120,
            poll_secs: 5,
            delivery_parallelism: 8,
            race_backoff_ms: 500,
            race_refetch_attempts: 3,
        }
    }
}
