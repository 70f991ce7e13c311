//! Unified error types for the proxwake core library.
//!
//! Each module has its own error type ([`ConfigError`], [`RadioError`],
//! [`WakeError`]). [`ProxwakeError`] folds them into one type for callers
//! that do not care which layer failed.
//!
//! Nothing in the controller loop is fatal: radio and wake errors are
//! logged and scanning continues. Only configuration errors stop startup.
//!
//! [`ConfigError`]: crate::config::ConfigError
//! [`RadioError`]: crate::radio::RadioError
//! [`WakeError`]: crate::wake::WakeError

use thiserror::Error;

/// The unified error type for all proxwake operations.
#[derive(Debug, Error)]
pub enum ProxwakeError {
    // =========================================================================
    // BLUETOOTH ERRORS
    // =========================================================================
    /// No Bluetooth adapter was found on this system.
    #[error(
        "No Bluetooth adapter found. Ensure Bluetooth hardware is present and drivers are loaded."
    )]
    BluetoothAdapterNotFound,

    /// The Bluetooth adapter exists but is powered off.
    #[error("Bluetooth adapter is powered off. Run 'bluetoothctl power on' to enable.")]
    BluetoothAdapterPoweredOff,

    /// Starting or stopping a scan failed, or the radio went away.
    #[error("Bluetooth scan failed: {0}")]
    BluetoothScanFailed(String),

    // =========================================================================
    // NETWORK ERRORS
    // =========================================================================
    /// The network link is not up.
    #[error("Network is not ready")]
    NetworkUnavailable,

    /// A magic packet could not be sent.
    #[error("Wake-on-LAN transmission failed: {0}")]
    TransmissionFailed(String),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {0}")]
    ConfigNotFound(String),

    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // I/O ERRORS
    // =========================================================================
    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for proxwake operations.
pub type Result<T> = std::result::Result<T, ProxwakeError>;

/// Short alias for [`ProxwakeError`].
pub type Error = ProxwakeError;

impl ProxwakeError {
    /// Returns `true` if this error is related to Bluetooth operations.
    #[inline]
    #[must_use]
    pub const fn is_radio_error(&self) -> bool {
        matches!(
            self,
            Self::BluetoothAdapterNotFound
                | Self::BluetoothAdapterPoweredOff
                | Self::BluetoothScanFailed(_)
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error came from the network side of a wake.
    #[inline]
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(self, Self::NetworkUnavailable | Self::TransmissionFailed(_))
    }

    /// Returns `true` if this error is likely to clear without intervention.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::BluetoothScanFailed(_) | Self::NetworkUnavailable | Self::TransmissionFailed(_)
        )
    }

    /// Process exit status for this error, following `sysexits.h`.
    ///
    /// Recoverable failures exit with `EX_TEMPFAIL` so a supervisor restarts
    /// the daemon; configuration and missing-hardware failures do not.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        if self.is_config_error() {
            78 // EX_CONFIG
        } else if self.is_recoverable() {
            75 // EX_TEMPFAIL
        } else if self.is_radio_error() || self.is_network_error() {
            69 // EX_UNAVAILABLE
        } else {
            74 // EX_IOERR
        }
    }

    /// Returns a machine-readable error code.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::BluetoothAdapterNotFound => "BLUETOOTH_ADAPTER_NOT_FOUND",
            Self::BluetoothAdapterPoweredOff => "BLUETOOTH_ADAPTER_POWERED_OFF",
            Self::BluetoothScanFailed(_) => "BLUETOOTH_SCAN_FAILED",
            Self::NetworkUnavailable => "NETWORK_UNAVAILABLE",
            Self::TransmissionFailed(_) => "TRANSMISSION_FAILED",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for ProxwakeError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::ParseError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::SerializeError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<crate::radio::RadioError> for ProxwakeError {
    fn from(err: crate::radio::RadioError) -> Self {
        use crate::radio::RadioError;
        match err {
            RadioError::AdapterNotFound => Self::BluetoothAdapterNotFound,
            RadioError::AdapterPoweredOff => Self::BluetoothAdapterPoweredOff,
            RadioError::SessionInitFailed { message } => Self::BluetoothScanFailed(message),
            RadioError::ScanFailed { .. } | RadioError::Closed => {
                Self::BluetoothScanFailed(err.to_string())
            }
        }
    }
}

impl From<crate::wake::WakeError> for ProxwakeError {
    fn from(err: crate::wake::WakeError) -> Self {
        use crate::wake::WakeError;
        match err {
            WakeError::NetworkUnavailable => Self::NetworkUnavailable,
            WakeError::TransmissionFailed { .. } => Self::TransmissionFailed(err.to_string()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
