//! BlueZ radio over D-Bus.
//!
//! Discovery runs in a spawned task that owns its own adapter handle and
//! forwards device addresses over a channel. Stopping a scan aborts the
//! task, which drops the discovery session and lets BlueZ stop scanning.
//!
//! A new discovery session first replays every device BlueZ remembers,
//! including ones long out of range. Only devices with a current RSSI, and
//! an address type the active transport can produce, are reported.

use std::time::Duration;

use bluer::{
    Adapter, AdapterEvent, Address, AddressType, DiscoveryFilter, DiscoveryTransport, Session,
};
use futures::StreamExt;
use proxwake_core::{Radio, RadioError, RadioEvent, ScanKind};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::{InquiryPacer, ReportThrottle};

/// Radio backed by the default BlueZ adapter.
pub struct BluezRadio {
    // Keeps the D-Bus connection alive.
    _session: Session,
    adapter: Adapter,
    active: Option<ActiveScan>,
    pacer: InquiryPacer,
    throttle: ReportThrottle<Address>,
}

struct ActiveScan {
    kind: ScanKind,
    events: mpsc::UnboundedReceiver<Address>,
    task: JoinHandle<()>,
}

impl Drop for ActiveScan {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for BluezRadio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BluezRadio")
            .field("adapter", &self.adapter.name())
            .field("active", &self.active.as_ref().map(|scan| scan.kind))
            .finish_non_exhaustive()
    }
}

const fn transport_for(kind: ScanKind) -> DiscoveryTransport {
    match kind {
        ScanKind::Ble => DiscoveryTransport::Le,
        ScanKind::Classic => DiscoveryTransport::BrEdr,
    }
}

/// Whether a device BlueZ announced during a `kind` scan is actually in range.
///
/// No RSSI means BlueZ is replaying its cache. BR/EDR addresses cannot come
/// from an LE scan, and random addresses are LE-only. An unknown address
/// type is accepted.
fn is_in_range(kind: ScanKind, rssi: Option<i16>, address_type: Option<AddressType>) -> bool {
    if rssi.is_none() {
        return false;
    }
    !matches!(
        (kind, address_type),
        (ScanKind::Ble, Some(AddressType::BrEdr))
            | (ScanKind::Classic, Some(AddressType::LeRandom))
    )
}

/// Query the live properties of `address` and apply [`is_in_range`].
async fn reported_in_range(adapter: &Adapter, address: Address, kind: ScanKind) -> bool {
    let Ok(device) = adapter.device(address) else {
        return false;
    };
    let rssi = device.rssi().await.ok().flatten();
    let address_type = device.address_type().await.ok();
    let in_range = is_in_range(kind, rssi, address_type);
    if !in_range {
        trace!(%address, %kind, ?rssi, ?address_type, "Skipping device not seen by this scan");
    }
    in_range
}

fn scan_failed(kind: ScanKind, err: &bluer::Error) -> RadioError {
    RadioError::ScanFailed {
        kind,
        message: err.to_string(),
    }
}

impl BluezRadio {
    /// Connect to BlueZ and power on the default adapter.
    ///
    /// # Errors
    ///
    /// - [`RadioError::SessionInitFailed`] if the D-Bus session cannot be opened
    /// - [`RadioError::AdapterNotFound`] if there is no adapter
    /// - [`RadioError::AdapterPoweredOff`] if the adapter refuses to power on
    pub async fn open(ble_scan_interval: Duration) -> Result<Self, RadioError> {
        let session = Session::new()
            .await
            .map_err(|e| RadioError::SessionInitFailed {
                message: e.to_string(),
            })?;
        let adapter = session
            .default_adapter()
            .await
            .map_err(|_| RadioError::AdapterNotFound)?;

        let powered = adapter.is_powered().await.unwrap_or(false);
        if !powered {
            info!(adapter = adapter.name(), "Powering on Bluetooth adapter");
            adapter
                .set_powered(true)
                .await
                .map_err(|_| RadioError::AdapterPoweredOff)?;
        }

        info!(adapter = adapter.name(), "Bluetooth adapter ready");
        Ok(Self {
            _session: session,
            adapter,
            active: None,
            pacer: InquiryPacer::new(),
            throttle: ReportThrottle::new(ble_scan_interval),
        })
    }

    async fn spawn_discovery(&self, kind: ScanKind) -> Result<ActiveScan, RadioError> {
        let adapter = self.adapter.clone();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let filter = DiscoveryFilter {
                transport: transport_for(kind),
                duplicate_data: true,
                ..Default::default()
            };
            if let Err(e) = adapter.set_discovery_filter(filter).await {
                let _ = ready_tx.send(Err(scan_failed(kind, &e)));
                return;
            }
            let stream = match adapter.discover_devices_with_changes().await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(scan_failed(kind, &e)));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            futures::pin_mut!(stream);
            while let Some(event) = stream.next().await {
                let AdapterEvent::DeviceAdded(address) = event else {
                    continue;
                };
                if !reported_in_range(&adapter, address, kind).await {
                    continue;
                }
                if events_tx.send(address).is_err() {
                    break;
                }
            }
            debug!(%kind, "Discovery stream ended");
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(ActiveScan { kind, events, task }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RadioError::ScanFailed {
                kind,
                message: "discovery task exited before starting".to_string(),
            }),
        }
    }
}

impl Radio for BluezRadio {
    async fn start_scan(&mut self, kind: ScanKind) -> Result<(), RadioError> {
        self.active = None;
        let scan = self.spawn_discovery(kind).await?;
        self.active = Some(scan);
        self.throttle.reset();
        if kind == ScanKind::Classic {
            self.pacer.start();
        }
        debug!(%kind, "Discovery started");
        Ok(())
    }

    async fn stop_scan(&mut self, kind: ScanKind) -> Result<(), RadioError> {
        if self.active.as_ref().is_some_and(|scan| scan.kind == kind) {
            self.active = None;
        }
        if kind == ScanKind::Classic {
            self.pacer.stop();
        }
        debug!(%kind, "Discovery stopped");
        Ok(())
    }

    async fn next_event(&mut self) -> Option<RadioEvent> {
        loop {
            let Some(scan) = self.active.as_mut() else {
                // Nothing to report until a scan starts; the controller
                // drives transitions from its own ticker.
                std::future::pending::<()>().await;
                continue;
            };
            let kind = scan.kind;

            tokio::select! {
                () = self.pacer.tick() => return Some(RadioEvent::InquiryCycleComplete),
                address = scan.events.recv() => {
                    let Some(address) = address else {
                        warn!(%kind, "Discovery task ended unexpectedly");
                        self.active = None;
                        return None;
                    };
                    if kind == ScanKind::Ble && !self.throttle.allow(address, Instant::now()) {
                        continue;
                    }
                    return Some(RadioEvent::Discovered {
                        address: address.to_string(),
                        kind,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_kind_selects_transport() {
        assert!(matches!(transport_for(ScanKind::Ble), DiscoveryTransport::Le));
        assert!(matches!(
            transport_for(ScanKind::Classic),
            DiscoveryTransport::BrEdr
        ));
    }

    #[test]
    fn test_cached_devices_without_rssi_are_not_reported() {
        for kind in [ScanKind::Ble, ScanKind::Classic] {
            assert!(!is_in_range(kind, None, None));
            assert!(!is_in_range(kind, None, Some(AddressType::LePublic)));
            assert!(!is_in_range(kind, None, Some(AddressType::BrEdr)));
        }
    }

    #[test]
    fn test_address_type_must_fit_transport() {
        assert!(is_in_range(ScanKind::Ble, Some(-60), Some(AddressType::LePublic)));
        assert!(is_in_range(ScanKind::Ble, Some(-60), Some(AddressType::LeRandom)));
        assert!(!is_in_range(ScanKind::Ble, Some(-60), Some(AddressType::BrEdr)));

        assert!(is_in_range(ScanKind::Classic, Some(-70), Some(AddressType::BrEdr)));
        assert!(is_in_range(ScanKind::Classic, Some(-70), Some(AddressType::LePublic)));
        assert!(!is_in_range(ScanKind::Classic, Some(-70), Some(AddressType::LeRandom)));
    }

    #[test]
    fn test_unknown_address_type_relies_on_rssi() {
        assert!(is_in_range(ScanKind::Ble, Some(-80), None));
        assert!(is_in_range(ScanKind::Classic, Some(-80), None));
    }
}
