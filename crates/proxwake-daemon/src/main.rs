//! # proxwake
//!
//! Scans for authorized Bluetooth devices, alternating BLE and Classic, and
//! sends a Wake-on-LAN magic packet to the configured PC when one shows up.
//!
//! ## Running
//!
//! ```bash
//! # Development, simulated radio
//! cargo run --package proxwake-daemon --features mock-bluetooth -- -c config.toml
//!
//! # Production (under systemd)
//! proxwake run --production
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use proxwake_core::{
    Config, MonotonicClock, PresenceController, ProxwakeError, WakeTrigger, DEFAULT_TICK_INTERVAL,
};
use proxwake_daemon::cli::{Cli, Command};
use proxwake_daemon::net::UdpBroadcaster;
use proxwake_daemon::state::AppState;
use proxwake_daemon::{api, logging, radio};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config_path();

    let result = match cli.command() {
        Command::Run { production } => run(&config_path, production).await,
        Command::Check => check(&config_path),
        Command::Wake => wake(&config_path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

/// `sysexits.h` status for classified errors, 1 for anything else.
fn exit_status(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<ProxwakeError>()
        .map_or(1, ProxwakeError::exit_code)
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load(path)
        .map_err(ProxwakeError::from)
        .with_context(|| format!("failed to load {}", path.display()))
}

async fn run(config_path: &Path, production: bool) -> anyhow::Result<()> {
    logging::init(production)?;
    info!(version = env!("CARGO_PKG_VERSION"), "Starting proxwake");

    let config = load_config(config_path)?;
    let settings = config
        .controller_settings()
        .map_err(ProxwakeError::from)?;

    match config.wifi.ssid.as_deref() {
        Some(ssid) => info!(%ssid, "Expecting Wi-Fi network"),
        None => info!("No Wi-Fi SSID configured; relying on the host network"),
    }
    if settings.allow_lists.is_empty() {
        warn!("Both allow-lists are empty; no device can trigger a wake");
    }
    info!(
        pc = %settings.pc_mac,
        target = %settings.broadcast,
        cooldown_ms = settings.wake_cooldown_ms,
        "Wake target configured"
    );

    let link = UdpBroadcaster::bind(settings.broadcast)
        .map_err(ProxwakeError::from)
        .context("failed to open broadcast socket")?;

    let radio = match radio::open(settings.ble_scan_interval).await {
        Ok(radio) => radio,
        Err(e) => {
            let e = ProxwakeError::from(e);
            error!(code = e.error_code(), error = %e, "Bluetooth unavailable");
            return Err(e.into());
        }
    };

    let mut controller = PresenceController::new(&settings, radio, link, MonotonicClock::new());

    let status_server = if config.status.enabled {
        let state = AppState::new(controller.subscribe()).shared();
        let bind = config.status.bind;
        Some(tokio::spawn(async move {
            if let Err(e) = api::serve(bind, state).await {
                error!(error = %e, "Status endpoint stopped");
            }
        }))
    } else {
        None
    };

    let result = controller
        .run(DEFAULT_TICK_INTERVAL, shutdown_signal())
        .await;

    if let Some(server) = status_server {
        server.abort();
    }

    match result {
        Ok(()) => {
            info!("proxwake stopped");
            Ok(())
        }
        Err(e) => {
            let e = ProxwakeError::from(e);
            error!(
                code = e.error_code(),
                recoverable = e.is_recoverable(),
                error = %e,
                "Presence detection stopped"
            );
            Err(e.into())
        }
    }
}

fn check(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let settings = config
        .controller_settings()
        .map_err(ProxwakeError::from)?;

    println!("Configuration OK: {}", config_path.display());
    println!("  PC:                {}", settings.pc_mac);
    println!("  Broadcast:         {}", settings.broadcast);
    println!("  BLE devices:       {}", settings.allow_lists.ble.len());
    println!("  Classic devices:   {}", settings.allow_lists.classic.len());
    println!("  BLE phase:         {} ms", settings.timing.switch_time_ms);
    println!("  Classic cycles:    {}", settings.timing.classic_cycles);
    println!("  Wake cooldown:     {} ms", settings.wake_cooldown_ms);
    println!();
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn wake(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let settings = config
        .controller_settings()
        .map_err(ProxwakeError::from)?;

    let link = UdpBroadcaster::bind(settings.broadcast).map_err(ProxwakeError::from)?;
    let trigger = WakeTrigger::new(
        link,
        settings.pc_mac,
        settings.broadcast,
        settings.wake_cooldown_ms,
    );
    trigger.send_now().map_err(ProxwakeError::from)?;

    println!("Magic packet sent to {} via {}", settings.pc_mac, settings.broadcast);
    Ok(())
}

/// Resolves on SIGINT or SIGTERM (Ctrl+C elsewhere).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigint, mut sigterm) = match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Signal handlers unavailable; falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, initiating shutdown..."),
            _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown..."),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, initiating shutdown...");
    }
}
