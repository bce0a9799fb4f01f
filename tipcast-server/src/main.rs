//! tipcast payments backend
//!
//! Ingests the token-economy provider's transaction webhooks, reconciles
//! them idempotently into the ledger, and delivers the resulting
//! notification hooks through a lease-based retry worker.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tipcast_core::events::{EventSenders, event_ingested_channel, hooks_enqueued_channel};
use tipcast_core::framework::DatabaseProcessor;
use tipcast_core::hooks::{HookDispatcher, HttpHookTransport};
use tipcast_core::processors::{
    HookProcessor, ReconcileWorker, ReconcileWorkerConfig,
};
use tipcast_core::reconcile::Reconciler;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// tipcast - payments backend for the tipcast social video app
#[derive(Parser, Debug)]
#[command(name = "tipcast-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./tipcast-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Numeric identifier of this worker instance, used in logs to tell
    /// concurrent processors apart
    #[arg(short = 'w', long, default_value = "0")]
    worker_id: u32,

    /// Exit gracefully after this many seconds so a supervisor can respawn
    /// the process with a bounded lifetime
    #[arg(long)]
    restart_after_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!(
        worker_id = args.worker_id,
        "Starting tipcast-server v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    let worker_config = loaded_config.worker;
    let delivery_config = loaded_config.delivery.clone();
    tracing::info!("Configuration loaded from {:?}", args.config);

    let shared_config = loaded_config.into_shared();

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    // Event channels wiring the gateway, reconciler, and hook processor
    let (event_ingested_tx, event_ingested_rx) = event_ingested_channel();
    let (hooks_enqueued_tx, hooks_enqueued_rx) = hooks_enqueued_channel();
    let event_senders = EventSenders::new(event_ingested_tx, hooks_enqueued_tx.clone());

    // Shutdown signal shared by all processors
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // Spawn the reconcile worker
    let db = DatabaseProcessor::new(db_pool.clone());
    let dispatcher = HookDispatcher::new(db.clone(), hooks_enqueued_tx);
    let reconciler = Reconciler::new(db.clone(), dispatcher, worker_config.race_backoff());
    let reconcile_worker =
        ReconcileWorker::new(db.clone(), reconciler, ReconcileWorkerConfig::default());
    let reconcile_handle =
        tokio::spawn(reconcile_worker.run(shutdown_rx.clone(), event_ingested_rx));

    // Spawn the hook processor
    let transport = Arc::new(HttpHookTransport::new(
        delivery_config.push.clone(),
        delivery_config.webhook.clone(),
    ));
    let hook_processor = HookProcessor::new(
        db,
        transport,
        worker_config.hook_processor_config(args.worker_id),
    );
    let hook_handle = tokio::spawn(hook_processor.run(shutdown_rx.clone(), hooks_enqueued_rx));

    // Create application state
    let state = AppState::new(db_pool.clone(), shared_config, event_senders);

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify = spawn_config_reload_handler(state.clone(), config_loader);

    // Build the router
    let router = build_router(state);

    // Run the server until a signal or the restart deadline
    let restart_after = args.restart_after_secs.map(Duration::from_secs);
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr, shutdown::shutdown_signal(restart_after)).await;

    // Stop the workers and let in-flight batches settle
    let _ = shutdown_tx.send(true);
    reload_notify.notify_one();
    let _ = reconcile_handle.await;
    let _ = hook_handle.await;

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
