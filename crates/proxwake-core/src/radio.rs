//! The Bluetooth radio as seen by the controller.
//!
//! Implementations live outside the core (BlueZ, simulated, test doubles).
//! The controller only starts and stops scans and pulls events.

use thiserror::Error;

use crate::types::ScanKind;

/// Classic inquiry cycle length of the BR/EDR baseband (1.28 s).
pub const CLASSIC_INQUIRY_CYCLE_MS: u64 = 1_280;

/// Something the radio observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// A device was seen. `address` is as reported by the stack, any case.
    Discovered {
        /// Reported hardware address.
        address: String,
        /// Which scan produced it.
        kind: ScanKind,
    },

    /// One Classic inquiry cycle finished.
    InquiryCycleComplete,
}

/// Errors raised by radio implementations.
#[derive(Debug, Error)]
pub enum RadioError {
    /// No Bluetooth adapter was found.
    #[error("No Bluetooth adapter found. Ensure Bluetooth hardware is present and drivers are loaded.")]
    AdapterNotFound,

    /// The adapter exists but is powered off.
    #[error("Bluetooth adapter is powered off. Run 'bluetoothctl power on' to enable.")]
    AdapterPoweredOff,

    /// Connecting to the Bluetooth stack failed.
    #[error("Failed to initialize Bluetooth session: {message}")]
    SessionInitFailed {
        /// Description from the stack.
        message: String,
    },

    /// Starting or stopping a scan failed.
    #[error("{kind} scan failed: {message}")]
    ScanFailed {
        /// The scan being started or stopped.
        kind: ScanKind,
        /// Description from the stack.
        message: String,
    },

    /// The radio stopped delivering events for good.
    #[error("Bluetooth radio event stream closed")]
    Closed,
}

/// Scan control and event delivery.
///
/// `next_event` must be cancel-safe: the controller races it against its
/// tick timer.
#[allow(async_fn_in_trait)]
pub trait Radio {
    /// Begin scanning with `kind`.
    async fn start_scan(&mut self, kind: ScanKind) -> Result<(), RadioError>;

    /// Stop scanning with `kind`.
    async fn stop_scan(&mut self, kind: ScanKind) -> Result<(), RadioError>;

    /// Wait for the next event. `None` means the radio is gone.
    async fn next_event(&mut self) -> Option<RadioEvent>;
}
