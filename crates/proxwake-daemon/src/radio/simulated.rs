//! A radio without hardware.
//!
//! Keeps the BLE / Classic alternation honest on machines without BlueZ:
//! inquiry cycles are paced as usual, and devices can be injected through
//! a channel.

use std::time::Duration;

use proxwake_core::{Radio, RadioError, RadioEvent, ScanKind};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use super::{InquiryPacer, ReportThrottle};

/// Simulated radio. Discoveries arrive only through [`SimulatedRadio::injector`].
#[derive(Debug)]
pub struct SimulatedRadio {
    active: Option<ScanKind>,
    pacer: InquiryPacer,
    throttle: ReportThrottle<String>,
    injected_tx: mpsc::UnboundedSender<(String, ScanKind)>,
    injected_rx: mpsc::UnboundedReceiver<(String, ScanKind)>,
}

impl SimulatedRadio {
    /// A radio with the standard inquiry cycle length.
    #[must_use]
    pub fn new(ble_scan_interval: Duration) -> Self {
        Self::with_pacer(InquiryPacer::new(), ble_scan_interval)
    }

    /// A radio with a custom inquiry pacer.
    #[must_use]
    pub fn with_pacer(pacer: InquiryPacer, ble_scan_interval: Duration) -> Self {
        let (injected_tx, injected_rx) = mpsc::unbounded_channel();
        Self {
            active: None,
            pacer,
            throttle: ReportThrottle::new(ble_scan_interval),
            injected_tx,
            injected_rx,
        }
    }

    /// Handle for injecting discoveries. They are only delivered while a
    /// scan of the same kind is active.
    #[must_use]
    pub fn injector(&self) -> mpsc::UnboundedSender<(String, ScanKind)> {
        self.injected_tx.clone()
    }

    /// The scan currently running.
    #[must_use]
    pub const fn active(&self) -> Option<ScanKind> {
        self.active
    }
}

impl Radio for SimulatedRadio {
    async fn start_scan(&mut self, kind: ScanKind) -> Result<(), RadioError> {
        debug!(%kind, "Simulated scan started");
        self.active = Some(kind);
        self.throttle.reset();
        if kind == ScanKind::Classic {
            self.pacer.start();
        }
        Ok(())
    }

    async fn stop_scan(&mut self, kind: ScanKind) -> Result<(), RadioError> {
        debug!(%kind, "Simulated scan stopped");
        if self.active == Some(kind) {
            self.active = None;
        }
        if kind == ScanKind::Classic {
            self.pacer.stop();
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Option<RadioEvent> {
        loop {
            tokio::select! {
                () = self.pacer.tick() => return Some(RadioEvent::InquiryCycleComplete),
                injected = self.injected_rx.recv() => {
                    // The radio holds a sender itself, so the channel never closes.
                    let (address, kind) = injected?;
                    if self.active != Some(kind) {
                        continue;
                    }
                    if kind == ScanKind::Ble && !self.throttle.allow(address.clone(), Instant::now()) {
                        continue;
                    }
                    return Some(RadioEvent::Discovered { address, kind });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_classic_scan_reports_cycles() {
        let mut radio = SimulatedRadio::with_pacer(
            InquiryPacer::with_period(Duration::from_millis(5)),
            Duration::from_secs(1),
        );
        radio.start_scan(ScanKind::Classic).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), radio.next_event())
            .await
            .unwrap();
        assert_eq!(event, Some(RadioEvent::InquiryCycleComplete));

        radio.stop_scan(ScanKind::Classic).await.unwrap();
        assert_eq!(radio.active(), None);
    }

    #[tokio::test]
    async fn test_injected_discoveries_follow_active_scan() {
        let mut radio = SimulatedRadio::new(Duration::from_secs(1));
        let injector = radio.injector();
        radio.start_scan(ScanKind::Ble).await.unwrap();

        injector
            .send(("AA:BB:CC:DD:EE:FF".into(), ScanKind::Classic))
            .unwrap();
        injector
            .send(("11:22:33:44:55:66".into(), ScanKind::Ble))
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), radio.next_event())
            .await
            .unwrap();
        assert_eq!(
            event,
            Some(RadioEvent::Discovered {
                address: "11:22:33:44:55:66".into(),
                kind: ScanKind::Ble,
            })
        );
    }

    #[tokio::test]
    async fn test_repeated_ble_reports_are_throttled() {
        let mut radio = SimulatedRadio::new(Duration::from_secs(60));
        let injector = radio.injector();
        radio.start_scan(ScanKind::Ble).await.unwrap();

        for _ in 0..3 {
            injector
                .send(("aa:bb:cc:dd:ee:ff".into(), ScanKind::Ble))
                .unwrap();
        }
        assert!(radio.next_event().await.is_some());
        let second = tokio::time::timeout(Duration::from_millis(50), radio.next_event()).await;
        assert!(second.is_err());
    }
}
