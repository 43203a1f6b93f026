//! Main entry point for the lobby keeper
//!
//! Connects to the chat network, keeps one auto-managed lobby alive per
//! star bracket, and shuts down on SIGINT/SIGTERM or when the chat
//! connection drops.

use anyhow::Result;
use clap::Parser;
use lobby_keeper::config::{validate_config, AppConfig};
use lobby_keeper::service::AppState;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// Lobby Keeper - one auto-managed multiplayer lobby per star bracket
#[derive(Parser)]
#[command(
    name = "lobby-keeper",
    version,
    about = "Keeps a fixed roster of auto-managed osu! multiplayer lobbies alive",
    long_about = "Lobby Keeper periodically compares the configured star brackets against the \
                 lobbies this account owns, creates the missing ones over the chat network, \
                 and records them in the lobby registry."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Registry file override
    #[arg(long, value_name = "FILE", help = "Override lobby registry file path")]
    registry_path: Option<PathBuf>,

    /// Chat host override
    #[arg(long, value_name = "HOST", help = "Override IRC server host")]
    chat_host: Option<String>,

    /// Disable lobby creation
    #[arg(long, help = "Connect and answer messages without creating lobbies")]
    no_create_lobbies: bool,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received SIGINT (Ctrl+C) signal");
            },
            _ = terminate.recv() => {
                info!("Received SIGTERM signal");
            },
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received SIGINT (Ctrl+C) signal");
    }

    Ok(())
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Lobby Keeper");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!(
        "   Chat: {}@{}:{}",
        config.chat.username, config.chat.host, config.chat.port
    );
    info!("   Lobby creation: {}", config.lobbies.enabled);
    info!(
        "   Reconcile interval: {}s",
        config.lobbies.reconcile_interval_seconds
    );
    match config.catalog() {
        Ok(catalog) => {
            for bracket in catalog.brackets() {
                info!("   Bracket {}: {}", bracket, catalog.title_for(bracket));
            }
        }
        Err(e) => warn!("   Brackets: invalid ({})", e),
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(registry_path) = &args.registry_path {
        config.lobbies.registry_path = Some(registry_path.clone());
    }

    if let Some(chat_host) = &args.chat_host {
        config.chat.host = chat_host.clone();
    }

    if args.no_create_lobbies {
        config.lobbies.enabled = false;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    let mut app_state = match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("✅ Lobby Keeper is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    let connection_lost = tokio::select! {
        result = wait_for_shutdown_signal() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signals: {}", e);
            }
            false
        }
        _ = app_state.connection_lost() => {
            error!("Lost connection to the chat server");
            true
        }
    };

    info!("🛑 Beginning graceful shutdown...");
    if let Err(e) = app_state.shutdown().await {
        error!("Shutdown failed: {}", e);
    }

    info!("🛑 Lobby Keeper stopped");

    if connection_lost {
        std::process::exit(1);
    }
    Ok(())
}
