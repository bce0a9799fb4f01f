//! Configuration module for tipcast-server.
//!
//! Handles loading configuration from TOML files, CLI arguments, and
//! environment variables. Also handles admin secret hashing.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{
    AdminConfig, DeliveryConfig, ProviderConfig, ServerConfig, SharedConfig, WorkerConfig,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tipcast_core::hooks::HookEndpoint;
use tokio::sync::RwLock;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all sections.
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub provider: ProviderConfig,
    pub delivery: DeliveryConfig,
    pub worker: WorkerConfig,
}

impl LoadedConfig {
    /// Convert into a SharedConfig with Arc<RwLock<T>> wrappers.
    pub fn into_shared(self) -> SharedConfig {
        SharedConfig {
            server: Arc::new(RwLock::new(self.server)),
            admin: Arc::new(RwLock::new(self.admin)),
            provider: Arc::new(RwLock::new(self.provider)),
            delivery: Arc::new(RwLock::new(self.delivery)),
            worker: Arc::new(RwLock::new(self.worker)),
        }
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Hash the admin secret if it's plaintext (and rewrite the file)
    /// 5. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        self.validate(&file_config)?;

        let secret_hash = if file_config.is_admin_secret_hashed() {
            file_config.admin.secret.clone()
        } else {
            let hash = self.hash_secret(&file_config.admin.secret)?;
            file_config.admin.secret = hash.clone();
            self.rewrite_config(&file_config)?;
            tracing::info!("Admin secret hashed and config file updated");
            hash
        };

        self.build_loaded_config(file_config, secret_hash)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        if config.provider.secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.secret must not be empty".to_string(),
            ));
        }
        if config.worker.batch_size <= 0 {
            return Err(ConfigError::ValidationError(
                "worker.batch_size must be positive".to_string(),
            ));
        }
        if config.worker.retry_cap <= 0 {
            return Err(ConfigError::ValidationError(
                "worker.retry_cap must be positive".to_string(),
            ));
        }
        if config.worker.lease_secs <= 0 {
            return Err(ConfigError::ValidationError(
                "worker.lease_secs must be positive".to_string(),
            ));
        }
        if config.delivery.webhook_url.is_some() && config.delivery.webhook_secret.is_none() {
            return Err(ConfigError::ValidationError(
                "delivery.webhook_secret is required when delivery.webhook_url is set".to_string(),
            ));
        }
        Ok(())
    }

    fn hash_secret(&self, plaintext: &str) -> Result<String, ConfigError> {
        use argon2::{
            Argon2, PasswordHasher,
            password_hash::{SaltString, rand_core::OsRng},
        };

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ConfigError::HashError(e.to_string()))
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write atomically: write to temp file, then rename
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }

    fn build_loaded_config(
        &self,
        file_config: FileConfig,
        secret_hash: String,
    ) -> Result<LoadedConfig, ConfigError> {
        let webhook = match (
            file_config.delivery.webhook_url,
            file_config.delivery.webhook_secret,
        ) {
            (Some(url), Some(secret)) => Some(HookEndpoint {
                url,
                secret: secret.into_bytes().into_boxed_slice(),
            }),
            _ => None,
        };

        Ok(LoadedConfig {
            server: ServerConfig {
                listen: file_config.server.listen,
            },
            admin: AdminConfig::new(secret_hash),
            provider: ProviderConfig::new(
                file_config.provider.name,
                file_config.provider.secret.into_bytes().into_boxed_slice(),
            ),
            delivery: DeliveryConfig {
                push: HookEndpoint {
                    url: file_config.delivery.push_url,
                    secret: file_config
                        .delivery
                        .push_secret
                        .into_bytes()
                        .into_boxed_slice(),
                },
                webhook,
            },
            worker: WorkerConfig {
                batch_size: file_config.worker.batch_size,
                retry_cap: file_config.worker.retry_cap,
                lease_secs: file_config.worker.lease_secs,
                poll_secs: file_config.worker.poll_secs,
                delivery_parallelism: file_config.worker.delivery_parallelism,
                race_backoff_ms: file_config.worker.race_backoff_ms,
                race_refetch_attempts: file_config.worker.race_refetch_attempts,
            },
        })
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
