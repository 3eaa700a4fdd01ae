//! curio-ai - project analysis and curriculum service
//!
//! Subcommands:
//! - `serve`: HTTP surface over the job orchestrator
//! - `digest <dir>`: print the digest of a local directory
//! - `hints <dir>`: print static technology hints as JSON

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use curio_common::config::{database_path, resolve_root_folder, TomlConfig};
use curio_common::events::EventBus;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curio_ai::models::Snapshot;
use curio_ai::services::{assemble, extract_hints};
use curio_ai::{AppState, EVENT_BUS_CAPACITY};

/// Command-line arguments for curio-ai
#[derive(Parser, Debug)]
#[command(name = "curio-ai")]
#[command(about = "Project analysis and curriculum generation")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "CURIO_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for the database
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides `[server] port`)
        #[arg(short, long, env = "CURIO_PORT")]
        port: Option<u16>,
    },
    /// Print the digest for a local directory
    Digest {
        dir: PathBuf,
    },
    /// Print static technology hints for a local directory as JSON
    Hints {
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default(args.config.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("curio_ai={0},curio_common={0},tower_http=info", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Serve { port } => serve(&config, args.root_folder.as_deref(), port).await,
        Command::Digest { dir } => {
            let snapshot = load_directory(&dir)?;
            println!("{}", assemble(&snapshot));
            Ok(())
        }
        Command::Hints { dir } => {
            let snapshot = load_directory(&dir)?;
            let hints = extract_hints(&snapshot);
            println!("{}", serde_json::to_string_pretty(&hints)?);
            Ok(())
        }
    }
}

fn load_directory(dir: &Path) -> Result<Snapshot> {
    let snapshot =
        Snapshot::from_directory(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    info!(files = snapshot.len(), fingerprint = %snapshot.fingerprint(), "Snapshot loaded");
    Ok(snapshot)
}

async fn serve(config: &TomlConfig, root_arg: Option<&Path>, port: Option<u16>) -> Result<()> {
    info!("Starting curio-ai {}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(root_arg, config);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;

    let db_path = database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let db = curio_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let state = AppState::from_config(db, EventBus::new(EVENT_BUS_CAPACITY), config);

    match state.runner.recover_interrupted().await {
        Ok(0) => {}
        Ok(n) => warn!(jobs = n, "Marked jobs interrupted by restart as failed"),
        Err(e) => {
            error!(error = %e, "Startup recovery failed");
            *state.last_error.write().await = Some(format!("startup recovery failed: {}", e));
        }
    }

    let app = curio_ai::build_router(state);

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid server host '{}'", config.server.host))?;
    let addr = SocketAddr::new(host, port.unwrap_or(config.server.port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install signal handler: {}", e);
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
            info!("Received terminate signal, shutting down");
        },
    }
}
