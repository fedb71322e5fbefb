//! omnicast-server - tenant-scoped social publishing API
//!
//! Serves the Omnicast engine over HTTP: connection management, publishing,
//! the publish ledger, analytics sync, and the OAuth connection flow.

use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use libomnicast::logging::{LogFormat, LoggingConfig};
use libomnicast::Config;

use omnicast_server::routes;
use omnicast_server::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "omnicast-server")]
#[command(version)]
#[command(about = "Tenant-scoped social publishing API")]
#[command(long_about = "\
omnicast-server - tenant-scoped social publishing API

DESCRIPTION:
    Serves the Omnicast engine over HTTP: platform connection management
    with masked credentials, publishing with a bounded per-tenant ledger,
    engagement analytics sync, and the OAuth connection flow for the
    graph-style platforms.

USAGE:
    # Run with the default config location
    omnicast-server

    # Run with an explicit config file
    omnicast-server --config /etc/omnicast/config.toml

CONFIGURATION:
    Configuration file: ~/.config/omnicast/config.toml
    Override with --config or the OMNICAST_CONFIG environment variable.

    [server]
    bind_addr = \"127.0.0.1:8080\"
    public_url = \"https://social.example.com\"

    [database]
    path = \"~/.local/share/omnicast/omnicast.db\"

    [auth.api_keys]
    acme = \"tenant-api-key\"

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the bind address from the config file
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = load_config(cli.config.as_ref())?;
    let bind_addr = cli
        .bind
        .clone()
        .unwrap_or_else(|| config.server.bind_addr.clone());

    if config.auth.api_keys.is_empty() {
        warn!("no API keys configured; every request will be rejected");
    }

    let state = AppState::build(&config).await?;
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("omnicast-server listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("omnicast-server stopped");
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Ok(Config::load_from_path(path)?),
        None => match Config::load() {
            Ok(config) => Ok(config),
            Err(libomnicast::OmnicastError::Config(
                libomnicast::error::ConfigError::ReadError(_),
            )) => {
                warn!("no config file found, using development defaults");
                Ok(Config::default_config())
            }
            Err(err) => Err(err.into()),
        },
    }
}

fn init_logging(verbose: bool) {
    let format = std::env::var("OMNICAST_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);
    let level = std::env::var("OMNICAST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    LoggingConfig::new(format, level, verbose).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut signal) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            signal.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
