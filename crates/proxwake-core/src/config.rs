//! Application configuration management.
//!
//! Configuration is a TOML file layered with `PROXWAKE__`-prefixed
//! environment variables (`PROXWAKE__TIMING__WAKE_COOLDOWN_MS=60000`). It is
//! read once at startup, validated as a whole, and turned into an immutable
//! [`ControllerSettings`] that is handed to the controller.
//!
//! ```toml
//! [network]
//! broadcast_ip = "192.168.0.255"
//! wol_port = 9
//!
//! [target]
//! mac_address = "3c:52:82:ab:cd:ef"
//!
//! [allow_list]
//! ble = ["aa:bb:cc:dd:ee:ff"]
//! classic = []
//!
//! [timing]
//! ble_scan_interval_secs = 1
//! classic_scan_cycles = 5
//! wake_cooldown_ms = 30000
//! classic_ble_switch_time_ms = 10000
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matcher::AllowLists;
use crate::scheduler::ScanTiming;
use crate::types::{is_valid_mac_address, MacAddress, Millis};
use crate::wake::{BroadcastTarget, DEFAULT_WOL_PORT};

/// Longest SSID allowed by 802.11.
const MAX_SSID_LEN: usize = 32;

/// Environment variable prefix for overrides.
const ENV_PREFIX: &str = "PROXWAKE";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No file at the given path.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// The sources could not be merged or deserialized.
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] ::config::ConfigError),

    /// The configuration could not be rendered as TOML.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A single field holds an invalid value.
    #[error("{field}: {message}")]
    ValidationError {
        /// Dotted field path, e.g. `target.mac_address`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields are invalid.
    #[error("{} configuration errors: {}", .0.len(), join_errors(.0))]
    MultipleValidationErrors(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main application configuration, as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Wi-Fi credentials for the network collaborator.
    #[serde(default)]
    pub wifi: WifiConfig,

    /// Broadcast address and WoL port.
    #[serde(default)]
    pub network: NetworkConfig,

    /// The PC to wake.
    pub target: TargetConfig,

    /// Authorized devices per scan kind.
    #[serde(default)]
    pub allow_list: AllowLists,

    /// Scan and cooldown timing.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Read-only HTTP status endpoint.
    #[serde(default)]
    pub status: StatusConfig,
}

/// Wi-Fi network credentials.
///
/// The daemon does not manage Wi-Fi itself; these are passed through to
/// whatever brings the link up and reported at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WifiConfig {
    /// Network SSID.
    pub ssid: Option<String>,

    /// Network password.
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

/// Where magic packets go.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// IPv4 broadcast address of the LAN.
    pub broadcast_ip: Ipv4Addr,

    /// UDP port for magic packets.
    pub wol_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            broadcast_ip: Ipv4Addr::new(192, 168, 0, 255),
            wol_port: DEFAULT_WOL_PORT,
        }
    }
}

/// The PC to wake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// MAC address of the PC's wake-capable NIC.
    pub mac_address: String,
}

/// Scan and cooldown timing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Minimum seconds between BLE reports of the same device.
    pub ble_scan_interval_secs: u64,

    /// Classic inquiry cycles (~1.28 s each) per Classic phase.
    pub classic_scan_cycles: u32,

    /// Minimum milliseconds between two magic packets.
    pub wake_cooldown_ms: Millis,

    /// Milliseconds of BLE scanning before switching to Classic.
    pub classic_ble_switch_time_ms: Millis,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            ble_scan_interval_secs: 1,
            classic_scan_cycles: 5,
            wake_cooldown_ms: 30_000,
            classic_ble_switch_time_ms: 10_000,
        }
    }
}

/// Read-only HTTP status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Whether to serve `/health` and `/api/status`.
    pub enabled: bool,

    /// Listen address.
    pub bind: SocketAddr,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
        }
    }
}

/// Validated, immutable settings consumed by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Allow-lists, entries lowercased.
    pub allow_lists: AllowLists,
    /// PC to wake.
    pub pc_mac: MacAddress,
    /// Broadcast destination.
    pub broadcast: BroadcastTarget,
    /// Phase timing.
    pub timing: ScanTiming,
    /// Minimum spacing between sends.
    pub wake_cooldown_ms: Millis,
    /// BLE per-device report interval (radio-owned).
    pub ble_scan_interval: Duration,
}

impl Config {
    /// Load configuration from `path`, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file does not exist and
    /// [`ConfigError::ParseError`] if it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let settings = ::config::Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("allow_list.ble")
                    .with_list_parse_key("allow_list.classic")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Parse configuration from a TOML string, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if the string is not a valid
    /// configuration.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let settings = ::config::Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Render as TOML. Secrets are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SerializeError`] if rendering fails.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every field, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns the single error, or [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.target.mac_address.parse::<MacAddress>() {
            errors.push(ConfigError::invalid("target.mac_address", e.to_string()));
        }

        if self.network.wol_port == 0 {
            errors.push(ConfigError::invalid("network.wol_port", "must not be 0"));
        }
        if self.network.broadcast_ip.is_unspecified() {
            errors.push(ConfigError::invalid(
                "network.broadcast_ip",
                "must not be 0.0.0.0",
            ));
        }

        for (field, entries) in [
            ("allow_list.ble", &self.allow_list.ble),
            ("allow_list.classic", &self.allow_list.classic),
        ] {
            for (i, entry) in entries.iter().enumerate() {
                if !is_valid_mac_address(entry) {
                    errors.push(ConfigError::invalid(
                        format!("{field}[{i}]"),
                        format!("'{entry}' is not a MAC address like aa:bb:cc:dd:ee:ff"),
                    ));
                }
            }
        }

        if self.timing.ble_scan_interval_secs == 0 {
            errors.push(ConfigError::invalid(
                "timing.ble_scan_interval_secs",
                "must be at least 1",
            ));
        }
        if self.timing.classic_scan_cycles == 0 {
            errors.push(ConfigError::invalid(
                "timing.classic_scan_cycles",
                "must be at least 1",
            ));
        }
        if self.timing.classic_ble_switch_time_ms == 0 {
            errors.push(ConfigError::invalid(
                "timing.classic_ble_switch_time_ms",
                "must be greater than 0",
            ));
        }

        match (&self.wifi.ssid, &self.wifi.password) {
            (Some(ssid), _) if ssid.is_empty() || ssid.len() > MAX_SSID_LEN => {
                errors.push(ConfigError::invalid(
                    "wifi.ssid",
                    format!("must be 1 to {MAX_SSID_LEN} bytes"),
                ));
            }
            (None, Some(_)) => {
                errors.push(ConfigError::invalid(
                    "wifi.password",
                    "set without wifi.ssid",
                ));
            }
            _ => {}
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// Validate and build the controller's settings.
    ///
    /// # Errors
    ///
    /// Returns the validation errors from [`Config::validate`].
    pub fn controller_settings(&self) -> ConfigResult<ControllerSettings> {
        self.validate()?;

        let pc_mac = self
            .target
            .mac_address
            .parse::<MacAddress>()
            .map_err(|e| ConfigError::invalid("target.mac_address", e.to_string()))?;

        let lowercase = |entries: &[String]| -> Vec<String> {
            entries.iter().map(|e| e.to_ascii_lowercase()).collect()
        };

        Ok(ControllerSettings {
            allow_lists: AllowLists::new(
                lowercase(&self.allow_list.ble),
                lowercase(&self.allow_list.classic),
            ),
            pc_mac,
            broadcast: BroadcastTarget::new(self.network.broadcast_ip, self.network.wol_port),
            timing: ScanTiming {
                switch_time_ms: self.timing.classic_ble_switch_time_ms,
                classic_cycles: self.timing.classic_scan_cycles,
            },
            wake_cooldown_ms: self.timing.wake_cooldown_ms,
            ble_scan_interval: Duration::from_secs(self.timing.ble_scan_interval_secs),
        })
    }
}

/// Default configuration file location.
///
/// On Linux: `/etc/proxwake/config.toml`.
/// Elsewhere: the platform config directory.
#[must_use]
pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/etc/proxwake/config.toml")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "proxwake").map_or_else(
            || PathBuf::from("config.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    const FULL: &str = r#"
        [wifi]
        ssid = "home"
        password = "hunter22"

        [network]
        broadcast_ip = "10.0.0.255"
        wol_port = 7

        [target]
        mac_address = "3C:52:82:AB:CD:EF"

        [allow_list]
        ble = ["aa:bb:cc:dd:ee:ff", "11:22:33:44:55:66"]
        classic = ["01:02:03:04:05:06"]

        [timing]
        ble_scan_interval_secs = 2
        classic_scan_cycles = 3
        wake_cooldown_ms = 60000
        classic_ble_switch_time_ms = 8000

        [status]
        enabled = true
        bind = "0.0.0.0:9000"
    "#;

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml_str(FULL).unwrap();
        assert_eq!(config.wifi.ssid.as_deref(), Some("home"));
        assert_eq!(config.network.broadcast_ip, Ipv4Addr::new(10, 0, 0, 255));
        assert_eq!(config.network.wol_port, 7);
        assert_eq!(config.allow_list.ble.len(), 2);
        assert_eq!(config.timing.classic_scan_cycles, 3);
        assert!(config.status.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = Config::from_toml_str(
            r#"
            [target]
            mac_address = "3c:52:82:ab:cd:ef"
            "#,
        )
        .unwrap();
        assert_eq!(config.network.wol_port, 9);
        assert_eq!(config.network.broadcast_ip, Ipv4Addr::new(192, 168, 0, 255));
        assert_eq!(config.timing.wake_cooldown_ms, 30_000);
        assert_eq!(config.timing.classic_scan_cycles, 5);
        assert_eq!(config.timing.ble_scan_interval_secs, 1);
        assert!(config.allow_list.is_empty());
        assert!(!config.status.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_target_is_a_parse_error() {
        let err = Config::from_toml_str("[network]\nwol_port = 9\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_controller_settings() {
        let settings = Config::from_toml_str(FULL)
            .unwrap()
            .controller_settings()
            .unwrap();
        assert_eq!(
            settings.pc_mac,
            MacAddress::new([0x3c, 0x52, 0x82, 0xab, 0xcd, 0xef])
        );
        assert_eq!(settings.broadcast.to_string(), "10.0.0.255:7");
        assert_eq!(settings.timing.switch_time_ms, 8_000);
        assert_eq!(settings.timing.classic_cycles, 3);
        assert_eq!(settings.wake_cooldown_ms, 60_000);
        assert_eq!(settings.ble_scan_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_allow_list_entries_are_lowercased() {
        let mut config = Config::from_toml_str(FULL).unwrap();
        config.allow_list.ble = vec!["AA:BB:CC:DD:EE:FF".into()];
        let settings = config.controller_settings().unwrap();
        assert_eq!(settings.allow_lists.ble, vec!["aa:bb:cc:dd:ee:ff".to_string()]);
    }

    #[test]
    fn test_single_validation_error_names_field() {
        let mut config = Config::from_toml_str(FULL).unwrap();
        config.target.mac_address = "not-a-mac".into();
        match config.validate().unwrap_err() {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "target.mac_address");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_multiple_validation_errors_are_collected() {
        let mut config = Config::from_toml_str(FULL).unwrap();
        config.network.wol_port = 0;
        config.allow_list.classic.push("xx:xx:xx:xx:xx:xx".into());
        config.timing.classic_scan_cycles = 0;

        let err = config.validate().unwrap_err();
        let ConfigError::MultipleValidationErrors(errors) = &err else {
            panic!("expected multiple errors, got {err}");
        };
        assert_eq!(errors.len(), 3);
        let message = err.to_string();
        assert!(message.contains("network.wol_port"));
        assert!(message.contains("allow_list.classic[1]"));
        assert!(message.contains("timing.classic_scan_cycles"));
    }

    #[test]
    fn test_wifi_password_without_ssid_is_rejected() {
        let mut config = Config::from_toml_str(FULL).unwrap();
        config.wifi.ssid = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_password_is_not_serialized() {
        let config = Config::from_toml_str(FULL).unwrap();
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("home"));
        assert!(!rendered.contains("hunter22"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, FULL).unwrap();

        let _env = EnvGuard::set(&[]);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.target.mac_address, "3C:52:82:AB:CD:EF");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    /// Serializes tests that read or write `PROXWAKE__*` variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Sets environment variables for the life of the guard.
    struct EnvGuard {
        keys: Vec<&'static str>,
        _lock: MutexGuard<'static, ()>,
    }

    impl EnvGuard {
        fn set(vars: &[(&'static str, &str)]) -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            for (key, value) in vars {
                std::env::set_var(key, value);
            }
            Self {
                keys: vars.iter().map(|(key, _)| *key).collect(),
                _lock: lock,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for key in &self.keys {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, FULL).unwrap();

        let _env = EnvGuard::set(&[
            ("PROXWAKE__ALLOW_LIST__BLE", "AA:BB:CC:DD:EE:FF,01:02:03:04:05:06"),
            ("PROXWAKE__TIMING__WAKE_COOLDOWN_MS", "90000"),
        ]);
        let config = Config::load(&path).unwrap();

        assert_eq!(
            config.allow_list.ble,
            vec!["AA:BB:CC:DD:EE:FF".to_string(), "01:02:03:04:05:06".to_string()]
        );
        assert_eq!(config.allow_list.classic, vec!["01:02:03:04:05:06".to_string()]);
        assert_eq!(config.timing.wake_cooldown_ms, 90_000);
        assert_eq!(config.timing.classic_scan_cycles, 3);

        let settings = config.controller_settings().unwrap();
        assert_eq!(settings.allow_lists.ble[0], "aa:bb:cc:dd:ee:ff");
        assert_eq!(settings.wake_cooldown_ms, 90_000);
    }

    #[test]
    fn test_example_config_is_valid() {
        let config =
            Config::from_toml_str(include_str!("../../../config.example.toml")).unwrap();
        let settings = config.controller_settings().unwrap();
        assert_eq!(settings.timing.classic_cycles, 5);
        assert_eq!(settings.wake_cooldown_ms, 30_000);
        assert!(!config.status.enabled);
    }

    #[test]
    fn test_default_config_path_is_toml() {
        assert!(default_config_path().ends_with("config.toml"));
    }
}
