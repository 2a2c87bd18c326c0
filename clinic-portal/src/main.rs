//! clinic-portal - clinic schedule portal
//!
//! Serves the schedule store, change stream and arrival alerts to the view
//! layer. Sessions are resolved by the fronting auth proxy.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use clinic_common::config::{load_toml_config, CliOverrides, PortalConfig};
use clinic_portal::mirror::{JsonFileMirror, LocalMirror, MemoryMirror};
use clinic_portal::persistence::{InMemoryRepository, ScheduleRepository, SqliteRepository};
use clinic_portal::realtime::RealtimeHub;
use clinic_portal::reset::{run_startup_check, spawn_daily_reset, ResetPolicy};
use clinic_portal::store::{LoadSource, ScheduleStore};
use clinic_portal::{build_router, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "clinic-portal")]
#[command(about = "Clinic schedule portal", long_about = None)]
#[command(version)]
struct Args {
    /// HTTP server port
    #[arg(short, long, env = "CLINIC_PORT")]
    port: Option<u16>,

    /// Folder holding the database and the local mirror
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Daily reset time, local "HH:MM"
    #[arg(long)]
    reset_time: Option<String>,

    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep everything in memory; nothing touches disk
    #[arg(long)]
    ephemeral: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_file =
        load_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    let cli = CliOverrides {
        root_folder: args.root_folder.clone(),
        port: args.port,
        reset_time: args.reset_time.clone(),
    };
    let config = PortalConfig::resolve(&cli, config_file.config()).context("Invalid configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("clinic_portal={0},clinic_common={0},tower_http=info", config.log_level).into()
            }),
        )
        .init();

    info!("Starting clinic-portal v{}", env!("CARGO_PKG_VERSION"));
    config_file.log();

    let repo: Arc<dyn ScheduleRepository>;
    let mirror: Arc<dyn LocalMirror>;
    if args.ephemeral {
        info!("Ephemeral mode: in-memory schedule and mirror");
        repo = Arc::new(InMemoryRepository::new());
        mirror = Arc::new(MemoryMirror::new());
    } else {
        let db_path = config.database_path();
        info!("Root folder: {}", config.root_folder.display());
        let pool = clinic_common::db::init_database(&db_path)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        info!("✓ Database ready: {}", db_path.display());
        repo = Arc::new(SqliteRepository::new(pool));
        mirror = Arc::new(JsonFileMirror::new(config.mirror_dir()));
    }

    let hub = RealtimeHub::new(config.event_capacity);
    let store = Arc::new(ScheduleStore::new(repo, hub, mirror));

    store.hydrate_from_mirror().await;
    let policy = ResetPolicy::new(config.reset_time);
    run_startup_check(&store, &policy, Local::now()).await;
    match store.initial_load().await {
        LoadSource::Repository(count) => info!("✓ Schedule loaded ({} entries)", count),
        LoadSource::Mirror(count) => warn!("Schedule served from mirror ({} entries)", count),
    }

    let sync = store
        .attach_realtime()
        .context("Failed to attach realtime sync")?;
    let reset_timer = spawn_daily_reset(store.clone(), policy);

    let app = build_router(AppState::new(store))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("clinic-portal listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    reset_timer.shutdown().await;
    sync.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        },
    }
}
