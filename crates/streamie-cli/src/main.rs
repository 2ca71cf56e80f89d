//! Streamie - manage the stream keys your server pushes to YouTube, Twitch
//! and Facebook.
//!
//! Runs an interactive session: log in once, edit keys and toggles locally,
//! then submit them to the server in one go.

mod shell;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use streamie_core::config::{TokenStoreKind, ENV_SERVER_URL};
use streamie_core::{Config, Context};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shell::Shell;

#[derive(Debug, Parser)]
#[command(name = "streamie", version, about = "Manage your streamie stream keys")]
struct Args {
    /// Server base URL (overrides the config file)
    #[arg(long, env = ENV_SERVER_URL)]
    server: Option<String>,

    /// Where to keep the session token: file, keyring or memory
    #[arg(long)]
    store: Option<TokenStoreKind>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_file: Option<&PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_file {
        Some(path) => {
            let dir = path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "streamie.log".into());
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let _log_guard = init_tracing(args.log_file.as_ref());
    info!("streamie starting");

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    if let Some(server) = args.server {
        config.server_url = Some(server);
    }
    if let Some(store) = args.store {
        config.token_store = store;
    }

    let context = Context::from_config(&config)?;

    let mut shell = Shell::new(config, context);
    let result = shell.run().await;

    info!("streamie shutting down");
    result
}
