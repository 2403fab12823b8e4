//! AM2R Connector
//!
//! Entry point for the connector binary. Runs the game sync loop, the
//! optional multiworld server session and the stdin console until `exit` or
//! Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use am2r_connector::cli::{Cli, Commands, ConfigSubcommand};
use am2r_connector::config::{self, ConnectorConfig};
use am2r_connector::console::{self, ConsoleContext};
use am2r_connector::error::{Error, Result};
use am2r_connector::link::TcpTransport;
use am2r_connector::logging;
use am2r_connector::session::ServerSession;
use am2r_connector::sync::{SampleItems, SyncLoop};

/// How long runtime shutdown waits for the blocking stdin reader
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { subcommand } => handle_config_command(subcommand),
        Commands::Run {
            config,
            connect,
            name,
            password,
            port,
        } => {
            let mut config = load_or_exit(config.as_deref());

            if let Some(url) = connect {
                config.server.url = url;
            }
            if name.is_some() {
                config.server.name = name;
            }
            if password.is_some() {
                config.server.password = password;
            }
            if let Some(port) = port {
                config.game.port = port;
            }
            if let Err(e) = config.validate() {
                exit_with(e);
            }

            // The guards must be kept alive for the lifetime of the program
            let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;
            info!(version = env!("CARGO_PKG_VERSION"), "AM2R connector starting");

            run_connector(config)
        }
    }
}

/// Load configuration, exiting with a formatted error on failure
fn load_or_exit(path: Option<&str>) -> ConnectorConfig {
    match ConnectorConfig::load(path) {
        Ok(config) => config,
        Err(e) => exit_with(e),
    }
}

fn exit_with(e: Error) -> ! {
    eprint!("{}", e.format_for_terminal());
    std::process::exit(e.exit_code());
}

/// Build the runtime and run until shutdown
fn run_connector(config: ConnectorConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("am2r-connector")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    let result = runtime.block_on(async_main(config));

    // A pending stdin read cannot be interrupted; do not wait on it
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    result
}

async fn async_main(config: ConnectorConfig) -> Result<()> {
    let shutdown = CancellationToken::new();

    info!(
        host = %config.game.host,
        port = config.game.port,
        read_timeout_ms = config.game.read_timeout_ms,
        "Game link configured"
    );

    let sync = SyncLoop::new(config.sync_config(), TcpTransport, SampleItems::default());
    let status = sync.status_handle();
    let sync_task = tokio::spawn(sync.run(shutdown.clone()));

    let (session, session_task) = if config.server_enabled() {
        let mut session = ServerSession::new(config.session_config());
        let task = session.start(shutdown.clone())?;
        (Some(Arc::new(session)), Some(task))
    } else {
        info!("No multiworld server configured, syncing with AM2R only");
        (None, None)
    };

    tokio::spawn(console::run_console(
        ConsoleContext { status, session },
        shutdown.clone(),
    ));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
        _ = shutdown.cancelled() => info!("Shutdown requested"),
    }
    shutdown.cancel();

    // The loop exits after its in-flight wait, bounded by the largest timeout
    match sync_task.await {
        Ok(status) => info!(status = %status, "Game link closed"),
        Err(e) => warn!(error = %e, "Sync loop task failed"),
    }
    if let Some(task) = session_task {
        if let Err(e) = task.await {
            warn!(error = %e, "Server session task failed");
        }
    }

    info!("AM2R connector stopped");
    Ok(())
}

/// Handle config subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = load_or_exit(config.as_deref());
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let path = config::init_config(path.as_deref(), force)?;
            println!("Configuration file created: {}", path.display());
        }
        ConfigSubcommand::Validate { config } => {
            load_or_exit(config.as_deref());
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
