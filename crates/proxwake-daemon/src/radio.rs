//! Radio implementations for the presence controller.
//!
//! - `bluetooth` feature: BlueZ over D-Bus via `bluer`
//! - `mock-bluetooth` (or no `bluetooth`): a simulated radio that keeps the
//!   scan alternation running but never discovers anything
//!
//! BlueZ does not report Classic inquiry cycle boundaries, so both radios
//! pace [`RadioEvent::InquiryCycleComplete`] off a timer with the nominal
//! 1.28 s cycle length while an inquiry is running.
//!
//! [`RadioEvent::InquiryCycleComplete`]: proxwake_core::RadioEvent::InquiryCycleComplete

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use proxwake_core::CLASSIC_INQUIRY_CYCLE_MS;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

#[cfg(all(feature = "bluetooth", not(feature = "mock-bluetooth")))]
pub mod bluez;
pub mod simulated;

#[cfg(all(feature = "bluetooth", not(feature = "mock-bluetooth")))]
pub use bluez::BluezRadio as PlatformRadio;
#[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
pub use simulated::SimulatedRadio as PlatformRadio;

pub use simulated::SimulatedRadio;

/// Open the radio selected at build time.
///
/// # Errors
///
/// Returns [`proxwake_core::RadioError`] if the adapter cannot be opened.
#[cfg(all(feature = "bluetooth", not(feature = "mock-bluetooth")))]
pub async fn open(ble_scan_interval: Duration) -> Result<PlatformRadio, proxwake_core::RadioError> {
    PlatformRadio::open(ble_scan_interval).await
}

/// Open the radio selected at build time.
///
/// # Errors
///
/// Never fails for the simulated radio.
#[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
#[allow(clippy::unused_async)]
pub async fn open(ble_scan_interval: Duration) -> Result<PlatformRadio, proxwake_core::RadioError> {
    tracing::warn!("Built without BlueZ support; using simulated radio");
    Ok(PlatformRadio::new(ble_scan_interval))
}

/// Emits one tick per nominal Classic inquiry cycle while running.
#[derive(Debug)]
pub struct InquiryPacer {
    period: Duration,
    interval: Option<Interval>,
}

impl InquiryPacer {
    /// A pacer with the standard 1.28 s cycle.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_period(Duration::from_millis(CLASSIC_INQUIRY_CYCLE_MS))
    }

    /// A pacer with a custom cycle length.
    #[must_use]
    pub const fn with_period(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    /// Start counting cycles from now. The first tick comes one period later.
    pub fn start(&mut self) {
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    /// Stop counting.
    pub fn stop(&mut self) {
        self.interval = None;
    }

    /// Whether cycles are being counted.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Wait for the next cycle boundary; pends forever while stopped.
    ///
    /// Cancel-safe.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}

impl Default for InquiryPacer {
    fn default() -> Self {
        Self::new()
    }
}

/// Limits how often the same BLE device is reported.
///
/// BlueZ re-announces a device on every advertisement or RSSI change; the
/// controller only needs to hear about it once per scan interval.
#[derive(Debug)]
pub struct ReportThrottle<K> {
    interval: Duration,
    last_reported: HashMap<K, Instant>,
}

impl<K: Hash + Eq> ReportThrottle<K> {
    /// Report each key at most once per `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_reported: HashMap::new(),
        }
    }

    /// Returns `true` and records `now` if `key` may be reported at `now`.
    pub fn allow(&mut self, key: K, now: Instant) -> bool {
        match self.last_reported.get(&key) {
            Some(last) if now.saturating_duration_since(*last) < self.interval => false,
            _ => {
                self.last_reported.insert(key, now);
                true
            }
        }
    }

    /// Forget every key, e.g. when a new scan starts.
    pub fn reset(&mut self) {
        self.last_reported.clear();
    }
}
