//! Logging initialization.
//!
//! - **Production**: JSON logs to rolling files + compact logs to stdout
//! - **Development**: Pretty logs to stdout with span events
//!
//! `RUST_LOG` wins when set. Otherwise `PROXWAKE_LOG_LEVEL` (default `info`)
//! sets the level for proxwake itself while the Bluetooth and HTTP stacks
//! stay at `warn`; BlueZ property churn would drown the scan log otherwise.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keep the non-blocking writers alive for the life of the process.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static STDOUT_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Environment variable holding the proxwake log level.
pub const LOG_LEVEL_ENV: &str = "PROXWAKE_LOG_LEVEL";

/// Environment variable overriding the production log directory.
pub const LOG_DIR_ENV: &str = "PROXWAKE_LOG_DIR";

/// Dependencies kept at `warn` unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: &[&str] = &["bluer", "dbus", "tower_http", "hyper"];

/// Initialize the logging system.
///
/// In production, logs go to daily files under [`log_directory`] and to
/// stdout for the systemd journal. If the directory cannot be created the
/// daemon keeps running with stdout only.
///
/// # Errors
///
/// Returns an error if the filter cannot be parsed or a global
/// subscriber is already installed.
pub fn init(is_production: bool) -> anyhow::Result<()> {
    let env_filter = env_filter()?;

    if is_production {
        init_production(env_filter)
    } else {
        init_development(env_filter)
    }
}

fn env_filter() -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());
    Ok(EnvFilter::try_new(default_directives(&level))?)
}

/// `level` for everything except the chatty dependencies.
fn default_directives(level: &str) -> String {
    let mut directives = level.to_string();
    for target in QUIET_TARGETS {
        directives.push_str(&format!(",{target}=warn"));
    }
    directives
}

fn init_production(env_filter: EnvFilter) -> anyhow::Result<()> {
    let (non_blocking_stdout, stdout_guard) = tracing_appender::non_blocking(io::stdout());

    // journald adds its own timestamps and does not render ANSI
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_stdout)
        .with_target(true)
        .with_ansi(false);

    let log_dir = log_directory();
    let file_layer = match prepare_log_dir(&log_dir) {
        Ok(()) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "proxwake");
            let (non_blocking_file, file_guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(file_guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking_file)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
        }
        Err(e) => {
            eprintln!("proxwake: file logging disabled ({}): {e}", log_dir.display());
            None
        }
    };
    let file_logging = file_layer.is_some();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()?;

    let _ = STDOUT_GUARD.set(stdout_guard);

    if !file_logging {
        warn!(dir = %log_dir.display(), "Logging to stdout only");
    }
    Ok(())
}

fn init_development(env_filter: EnvFilter) -> anyhow::Result<()> {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .try_init()?;

    Ok(())
}

fn prepare_log_dir(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    if std::fs::metadata(dir)?.permissions().readonly() {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "directory is read-only",
        ));
    }
    Ok(())
}

/// Returns the production log directory.
///
/// `PROXWAKE_LOG_DIR` if set, else `/var/log/proxwake` on Linux and the
/// platform data directory elsewhere.
#[must_use]
pub fn log_directory() -> PathBuf {
    if let Some(dir) = std::env::var_os(LOG_DIR_ENV).filter(|dir| !dir.is_empty()) {
        return PathBuf::from(dir);
    }
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/log/proxwake")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "proxwake")
            .map_or_else(|| PathBuf::from("./logs"), |dirs| dirs.data_dir().join("logs"))
    }
}
