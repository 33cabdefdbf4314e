//! XML-RPC Access Guard (v1)
//!
//! An HTTP front door that protects a site's XML-RPC endpoint from callers
//! impersonating the Jetpack service.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                  XMLRPC GUARD                    │
//!                      │                                                  │
//!   Client Request     │  ┌──────────┐   ┌──────────────┐   ┌──────────┐  │
//!   ───────────────────┼─▶│  axum    │──▶│ xmlrpc_guard │──▶│  proxy   │──┼──▶ Upstream
//!                      │  │ server   │   │  middleware  │   │ forward  │  │     site
//!                      │  └──────────┘   └──────┬───────┘   └──────────┘  │
//!                      │                        │ halted                  │
//!   Rejection body     │                        ▼                         │
//!   ◀──────────────────┼──────────────── fixed message                    │
//!                      │                                                  │
//!                      │  ┌────────────────────────────────────────────┐  │
//!                      │  │ config (TOML + hot reload) │ observability │  │
//!                      │  │ lifecycle (signals, graceful shutdown)     │  │
//!                      │  └────────────────────────────────────────────┘  │
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use xmlrpc_guard::check::check_address;
use xmlrpc_guard::config::{load_config, ConfigWatcher, GuardServerConfig};
use xmlrpc_guard::http::HttpServer;
use xmlrpc_guard::lifecycle::{spawn_signal_handler, Shutdown};
use xmlrpc_guard::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "xmlrpc-guard")]
#[command(about = "Guards an XML-RPC endpoint against callers impersonating Jetpack", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the guard server
    Serve {
        /// Path to a TOML config file (built-in defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Check whether an address is inside the configured ranges
    Check {
        /// IPv4 address in dotted-quad form
        ip: String,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Load and validate a config file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn load_or_default(path: Option<&Path>) -> Result<GuardServerConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => Ok(GuardServerConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { ip, config } => {
            let config = load_or_default(config.as_deref())?;
            let outcome = check_address(&config, &ip)?;
            println!("{outcome}");
            Ok(outcome.exit_code())
        }
        Commands::Validate { config } => {
            let loaded = load_config(&config)?;
            println!(
                "{}: ok ({} ranges, identity {:?})",
                config.display(),
                loaded.guard.ranges.len(),
                loaded.guard.provider_identity
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn serve(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_or_default(config_path.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("xmlrpc-guard v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        guard_enabled = config.guard.enabled,
        ranges = config.guard.ranges.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the life of the server.
    let (config_updates, _watcher) = match &config_path {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (rx, Some(watcher.run()?))
        }
        None => {
            let (_, rx) = mpsc::unbounded_channel();
            (rx, None)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    spawn_signal_handler(shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
