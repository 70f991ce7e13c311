//! # proxwake-core
//!
//! Core logic for proxwake: wake a PC over the LAN when an authorized
//! Bluetooth device comes into range.
//!
//! This crate provides:
//! - BLE / Bluetooth Classic scan alternation on fixed time budgets
//! - Allow-list matching of discovered device addresses
//! - Wake-on-LAN magic packets with a cooldown between sends
//! - Configuration loading and validation
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`scheduler`] - BLE / Classic phase state machine
//! - [`matcher`] - Per-scan-kind allow-lists and address matching
//! - [`wake`] - Magic packet construction and the cooldown-guarded trigger
//! - [`controller`] - The cooperative loop tying the above to the radio
//! - [`radio`] - The radio collaborator interface
//! - [`clock`] - Monotonic time sources
//! - [`config`] - Configuration loading, validation, and controller settings
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared types (hardware addresses, scan kinds)

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod matcher;
pub mod radio;
pub mod scheduler;
pub mod types;
pub mod wake;

// Re-export primary types for convenience
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{
    default_config_path, Config, ConfigError, ConfigResult, ControllerSettings, NetworkConfig,
    StatusConfig, TargetConfig, TimingConfig, WifiConfig,
};
pub use controller::{ControllerStatus, DiscoveryOutcome, PresenceController, DEFAULT_TICK_INTERVAL};
pub use error::{Error, ProxwakeError, Result};
pub use matcher::{normalize_address, AllowLists, DeviceMatcher};
pub use radio::{Radio, RadioError, RadioEvent, CLASSIC_INQUIRY_CYCLE_MS};
pub use scheduler::{ScanScheduler, ScanTiming, ScheduleState, Transition, TransitionReason};
pub use types::{is_valid_mac_address, MacAddress, Millis, ParseMacError, ScanKind};
pub use wake::{
    BroadcastTarget, CooldownGuard, MagicPacket, NetworkLink, WakeError, WakeOutcome, WakeTrigger,
    MAGIC_PACKET_LEN,
};
