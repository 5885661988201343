//! beaconbridge CLI entry point: daemon lifecycle management for the bridge
//! core. Platform drivers, the credential vault's write path, and the
//! extension/capability-issuance layer are out of this binary's scope (§1)
//! — this process only boots the core, persists its state, and answers to
//! `stop`/`status` over the local IPC socket.

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use beaconbridge::bridge::BridgeCore;
use beaconbridge::cache::MessageCache;
use beaconbridge::config::Config;
use beaconbridge::driver::DriverRegistry;
use beaconbridge::filter::FilterEngine;
use beaconbridge::space::SpaceRegistry;
use beaconbridge::store::{SecureFiles, Vault, VaultMode};

use std::sync::Arc;

#[derive(Parser)]
#[command(name = "beaconbridge", version)]
#[command(about = "Cross-platform chat-bridge core: Spaces, drivers, and the filter pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the instance directory (overrides the platform default)
    #[arg(short, long, global = true)]
    data_dir: Option<std::path::PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start the bridge core (default when no subcommand is given)
    Start {
        /// Run in the foreground instead of daemonizing
        #[arg(short, long)]
        foreground: bool,
    },
    /// Stop the running bridge core
    Stop,
    /// Restart the bridge core (stop + start)
    Restart {
        /// Run in the foreground instead of daemonizing
        #[arg(short, long)]
        foreground: bool,
    },
    /// Show status of the running bridge core
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Start { foreground: false });

    match command {
        Command::Start { foreground } => cmd_start(cli.data_dir, cli.debug, foreground),
        Command::Stop => cmd_stop(),
        Command::Restart { foreground } => {
            cmd_stop_if_running();
            cmd_start(cli.data_dir, cli.debug, foreground)
        }
        Command::Status => cmd_status(),
    }
}

fn cmd_start(data_dir: Option<std::path::PathBuf>, debug: bool, foreground: bool) -> anyhow::Result<()> {
    let config = load_config(&data_dir)?;
    let paths = beaconbridge::daemon::DaemonPaths::new(&config.data_dir);

    if let Some(pid) = beaconbridge::daemon::is_running(&paths) {
        eprintln!("beaconbridge is already running (pid {pid})");
        std::process::exit(1);
    }

    if !foreground {
        // Fork before creating any Tokio runtime — Tokio's I/O driver and
        // thread pool don't survive fork, so everything async happens after
        // this call returns in the child.
        beaconbridge::daemon::daemonize(&paths)?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build Tokio runtime")?;

    runtime.block_on(async {
        if foreground {
            beaconbridge::daemon::init_foreground_tracing(debug);
        } else {
            beaconbridge::daemon::init_background_tracing(&paths, debug);
        }

        run(config, paths).await
    })
}

#[tokio::main]
async fn cmd_stop() -> anyhow::Result<()> {
    let paths = beaconbridge::daemon::DaemonPaths::from_default();

    let Some(pid) = beaconbridge::daemon::is_running(&paths) else {
        eprintln!("beaconbridge is not running");
        std::process::exit(1);
    };

    match beaconbridge::daemon::send_command(&paths, beaconbridge::daemon::IpcCommand::Shutdown).await {
        Ok(beaconbridge::daemon::IpcResponse::Ok) => {
            eprintln!("stopping beaconbridge (pid {pid})...");
        }
        Ok(beaconbridge::daemon::IpcResponse::Error { message }) => {
            eprintln!("shutdown failed: {message}");
            std::process::exit(1);
        }
        Ok(_) => {
            eprintln!("unexpected response from daemon");
            std::process::exit(1);
        }
        Err(error) => {
            eprintln!("failed to send shutdown command: {error}");
            std::process::exit(1);
        }
    }

    if beaconbridge::daemon::wait_for_exit(pid) {
        eprintln!("beaconbridge stopped");
    } else {
        eprintln!("beaconbridge did not stop within 10 seconds (pid {pid})");
        std::process::exit(1);
    }

    Ok(())
}

/// Stop if running, don't error if not. Used by `restart`.
fn cmd_stop_if_running() {
    let paths = beaconbridge::daemon::DaemonPaths::from_default();
    let Some(_pid) = beaconbridge::daemon::is_running(&paths) else {
        return;
    };
    let Ok(runtime) = tokio::runtime::Builder::new_current_thread().enable_all().build() else {
        return;
    };
    let _ = runtime.block_on(beaconbridge::daemon::send_command(&paths, beaconbridge::daemon::IpcCommand::Shutdown));
}

#[tokio::main]
async fn cmd_status() -> anyhow::Result<()> {
    let paths = beaconbridge::daemon::DaemonPaths::from_default();

    let Some(pid) = beaconbridge::daemon::is_running(&paths) else {
        println!("beaconbridge is not running");
        return Ok(());
    };

    match beaconbridge::daemon::send_command(&paths, beaconbridge::daemon::IpcCommand::Status).await {
        Ok(beaconbridge::daemon::IpcResponse::Status { pid, uptime_seconds }) => {
            println!("beaconbridge is running (pid {pid}, uptime {uptime_seconds}s)");
        }
        Ok(_) | Err(_) => {
            println!("beaconbridge process found (pid {pid}) but did not respond to status over IPC");
        }
    }
    Ok(())
}

fn load_config(data_dir: &Option<std::path::PathBuf>) -> anyhow::Result<Config> {
    match data_dir {
        Some(path) => Config::load_from_path(path).context("failed to load configuration"),
        None => Config::load().context("failed to load configuration"),
    }
}

/// Reads the vault password the core opens the store with. The core always
/// opens the vault read-only (§4.7) — only the password-rotation CLI
/// collaborator, out of this binary's scope, ever mutates it.
fn vault_password() -> anyhow::Result<String> {
    std::env::var("BEACONBRIDGE_VAULT_PASSWORD")
        .context("BEACONBRIDGE_VAULT_PASSWORD must be set; the core never prompts for a password")
}

async fn run(config: Config, paths: beaconbridge::daemon::DaemonPaths) -> anyhow::Result<()> {
    let password = vault_password()?;

    let vault = Arc::new(
        Vault::open(config.secrets_vault_path(), password.clone(), VaultMode::ReadOnly, [])
            .await
            .context("failed to open secrets vault")?,
    );
    let secure_files = Arc::new(SecureFiles::new(config.secure_files_dir(), &password));

    let spaces = Arc::new(SpaceRegistry::with_store(Arc::clone(&secure_files)));
    let cache = Arc::new(MessageCache::with_store(config.cache_limit, Arc::clone(&secure_files)));
    let drivers = if config.enable_platform_whitelist {
        Arc::new(DriverRegistry::with_allow_list(config.enabled_platforms.clone()))
    } else {
        Arc::new(DriverRegistry::new())
    };
    let filters = Arc::new(FilterEngine::with_builtins());

    let core = Arc::new(BridgeCore::new(
        Arc::clone(&spaces),
        Arc::clone(&drivers),
        filters,
        Arc::clone(&cache),
        config.enable_multi,
    ));
    // Vault is only opened to prove the configured password unlocks the
    // store before drivers start requesting secrets through a capability
    // handle; the core itself never calls it directly (§6.3).
    drop(vault);

    core.load_data().await.context("failed to load persisted bridge state")?;
    tracing::info!(ready = core.is_ready(), "bridge core loaded");

    let (mut shutdown_rx, ipc_handle) = beaconbridge::daemon::start_ipc_server(&paths)
        .await
        .context("failed to start IPC server")?;

    tokio::select! {
        _ = shutdown_rx.wait_for(|shutdown| *shutdown) => {
            tracing::info!("shutdown requested");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    core.shutdown();
    ipc_handle.abort();
    beaconbridge::daemon::cleanup(&paths);
    Ok(())
}
