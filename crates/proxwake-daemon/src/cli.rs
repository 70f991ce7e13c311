//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Wake a PC over the LAN when an authorized Bluetooth device comes into range.
#[derive(Parser, Debug)]
#[command(name = "proxwake")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "PROXWAKE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Scan for authorized devices and wake the PC (default)
    Run {
        /// Log JSON to rolling files as well as stdout
        #[arg(long, env = "PROXWAKE_PRODUCTION")]
        production: bool,
    },

    /// Validate the configuration and print the effective settings
    Check,

    /// Send one magic packet to the configured PC, ignoring the cooldown
    Wake,
}

impl Cli {
    /// The subcommand to run, with `run` as the default.
    #[must_use]
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Run { production: false })
    }

    /// The configuration file to load.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(proxwake_core::default_config_path)
    }
}
