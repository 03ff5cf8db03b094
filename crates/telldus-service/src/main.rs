//! telldus-sync - incremental sync of Telldus Live sensor history.
//!
//! Run with: `cargo run -p telldus-service -- serve`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use telldus_core::OAuthSession;
use telldus_service::{AppState, Config, api};
use telldus_store::{KvStore, SqliteStore};

/// Incremental sync of Telldus Live sensor history into a local store.
#[derive(Parser, Debug)]
#[command(name = "telldus-sync")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long, global = true)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Serve the HTTP sync trigger (default).
    Serve,

    /// Run one sync and exit.
    Sync,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("telldus_service=info".parse()?)
                .add_directive("telldus_core=info".parse()?),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(db_path) = args.database {
        config.storage.path = db_path;
    }
    config.validate()?;

    info!("Opening database at {:?}", config.storage.path);
    let store: Arc<dyn KvStore> = Arc::new(SqliteStore::open(&config.storage.path)?);

    // Missing credentials abort here, before any sync work
    let credentials = config
        .telldus
        .credentials(store.as_ref())
        .context("cannot start without Telldus credentials")?;
    let session =
        OAuthSession::new(&config.telldus.base_url, credentials, config.telldus.timeout())?;

    let state = AppState::new(store, Arc::new(session), config.clone());

    match args.command.unwrap_or(Command::Serve) {
        Command::Sync => run_once(state).await,
        Command::Serve => serve(state, &config.server.bind).await,
    }
}

async fn run_once(state: Arc<AppState>) -> anyhow::Result<()> {
    let report = state.run_sync().await?;
    println!("{}", report.summary());

    if !report.is_complete() {
        for failure in &report.failures {
            warn!("Sensor {} ({}): {}", failure.sensor_id, failure.name, failure.error);
        }
        anyhow::bail!(
            "{} sensor(s) failed: {:?}",
            report.failures.len(),
            report.failed_sensor_ids()
        );
    }

    Ok(())
}

async fn serve(state: Arc<AppState>, bind: &str) -> anyhow::Result<()> {
    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr: SocketAddr = bind.parse()?;
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
