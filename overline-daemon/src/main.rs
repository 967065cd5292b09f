//! Overline settlement daemon.
//!
//! Hosts the event-driven settlement cascade: prop status updates, pick
//! resolution, parlay settlement, match settlement, and the matches poller.

mod config;
mod runtime;
mod shutdown;

use clap::Parser;
use config::get_database_url;
use runtime::Component;
use shutdown::shutdown_signal;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Overline - settlement backbone for the prop wagering platform
#[derive(Parser, Debug)]
#[command(name = "overline-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./overline-config.toml")]
    config: PathBuf,

    /// Components to run (defaults to all of them)
    #[arg(long = "component", value_enum)]
    components: Vec<Component>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting overline-daemon v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let file_config = config::load(&args.config).map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

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

    let components = if args.components.is_empty() {
        Component::ALL.to_vec()
    } else {
        args.components
    };
    tracing::info!(?components, "Starting settlement components");

    // Spawn the publisher and selected components
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handles = runtime::spawn_components(
        &db_pool,
        &database_url,
        &file_config,
        &components,
        &shutdown_rx,
    )
    .await?;

    // Block until a shutdown signal arrives, then drain
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    for handle in handles {
        let _ = handle.await;
    }

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Daemon shutdown complete");

    Ok(())
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
