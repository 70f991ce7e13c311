//! Wake-on-LAN magic packets and the cooldown-guarded wake trigger.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::types::{MacAddress, Millis};

/// Number of 0xFF bytes that open a magic packet.
const SYNC_STREAM_LEN: usize = 6;

/// Number of times the target MAC is repeated.
const MAC_REPETITIONS: usize = 16;

/// Total magic packet length in bytes.
pub const MAGIC_PACKET_LEN: usize = SYNC_STREAM_LEN + MAC_REPETITIONS * 6;

/// Conventional WoL port ("discard").
pub const DEFAULT_WOL_PORT: u16 = 9;

/// A Wake-on-LAN magic packet: six 0xFF bytes then the MAC sixteen times.
#[derive(Clone, PartialEq, Eq)]
pub struct MagicPacket([u8; MAGIC_PACKET_LEN]);

impl MagicPacket {
    /// Build the packet for `mac`.
    #[must_use]
    pub fn new(mac: MacAddress) -> Self {
        let mut bytes = [0xFF; MAGIC_PACKET_LEN];
        let octets = mac.octets();
        for chunk in bytes[SYNC_STREAM_LEN..].chunks_exact_mut(octets.len()) {
            chunk.copy_from_slice(&octets);
        }
        Self(bytes)
    }

    /// The packet payload.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; MAGIC_PACKET_LEN] {
        &self.0
    }
}

impl fmt::Debug for MagicPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MagicPacket")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

/// Where magic packets are sent: the LAN broadcast address and WoL port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastTarget {
    /// IPv4 broadcast address of the local network.
    pub address: Ipv4Addr,

    /// UDP destination port.
    pub port: u16,
}

impl BroadcastTarget {
    /// Create a target.
    #[must_use]
    pub const fn new(address: Ipv4Addr, port: u16) -> Self {
        Self { address, port }
    }

    /// As a socket address.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.address, self.port)
    }
}

impl fmt::Display for BroadcastTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// The network as seen by the wake trigger.
pub trait NetworkLink {
    /// Whether the link can currently carry traffic.
    fn is_ready(&self) -> bool;

    /// Send one datagram. Fire-and-forget; no acknowledgment is expected.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the datagram could not be sent.
    fn send_datagram(&self, payload: &[u8], target: SocketAddrV4) -> std::io::Result<()>;
}

/// Errors from a wake attempt. None of them start the cooldown.
#[derive(Debug, Error)]
pub enum WakeError {
    /// The network collaborator reported the link as down.
    #[error("Network is not ready; magic packet not sent")]
    NetworkUnavailable,

    /// The datagram could not be sent.
    #[error("Failed to send magic packet to {target}: {source}")]
    TransmissionFailed {
        /// Destination of the failed send.
        target: BroadcastTarget,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },
}

/// What a wake attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WakeOutcome {
    /// A magic packet went out at `at`.
    Sent {
        /// Monotonic send time.
        at: Millis,
    },

    /// The cooldown is still running; nothing was sent.
    Suppressed {
        /// Milliseconds until the next send is allowed.
        remaining_ms: Millis,
    },
}

/// Remembers the last successful send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CooldownGuard {
    last_send: Option<Millis>,
}

impl CooldownGuard {
    /// Time of the last successful send, if any.
    #[must_use]
    pub const fn last_send(&self) -> Option<Millis> {
        self.last_send
    }

    /// Milliseconds left before a send is allowed at `now`; zero if allowed.
    #[must_use]
    pub fn remaining(&self, now: Millis, cooldown_ms: Millis) -> Millis {
        self.last_send.map_or(0, |last| {
            cooldown_ms.saturating_sub(now.saturating_sub(last))
        })
    }

    fn record(&mut self, now: Millis) {
        self.last_send = Some(now);
    }
}

/// Sends magic packets, at most once per cooldown window.
#[derive(Debug)]
pub struct WakeTrigger<L> {
    link: L,
    mac: MacAddress,
    target: BroadcastTarget,
    cooldown_ms: Millis,
    guard: CooldownGuard,
}

impl<L: NetworkLink> WakeTrigger<L> {
    /// Create a trigger that wakes `mac` through `target`.
    pub const fn new(link: L, mac: MacAddress, target: BroadcastTarget, cooldown_ms: Millis) -> Self {
        Self {
            link,
            mac,
            target,
            cooldown_ms,
            guard: CooldownGuard { last_send: None },
        }
    }

    /// The cooldown state.
    #[must_use]
    pub const fn guard(&self) -> &CooldownGuard {
        &self.guard
    }

    /// The broadcast destination.
    #[must_use]
    pub const fn target(&self) -> BroadcastTarget {
        self.target
    }

    /// The network link.
    #[must_use]
    pub const fn link(&self) -> &L {
        &self.link
    }

    /// Send a magic packet unless the cooldown is still running.
    ///
    /// The cooldown only starts on a successful send, so a failure leaves
    /// the next detection free to retry.
    ///
    /// # Errors
    ///
    /// Returns [`WakeError`] if the network is down or the send fails.
    pub fn attempt_wake(&mut self, now: Millis) -> Result<WakeOutcome, WakeError> {
        let remaining_ms = self.guard.remaining(now, self.cooldown_ms);
        if remaining_ms > 0 {
            debug!(remaining_ms, "Wake suppressed by cooldown");
            return Ok(WakeOutcome::Suppressed { remaining_ms });
        }

        self.transmit()?;
        self.guard.record(now);
        info!(mac = %self.mac, target = %self.target, "Magic packet sent");
        Ok(WakeOutcome::Sent { at: now })
    }

    /// Send a magic packet right away, ignoring and not touching the cooldown.
    ///
    /// # Errors
    ///
    /// Returns [`WakeError`] if the network is down or the send fails.
    pub fn send_now(&self) -> Result<(), WakeError> {
        self.transmit()
    }

    fn transmit(&self) -> Result<(), WakeError> {
        if !self.link.is_ready() {
            return Err(WakeError::NetworkUnavailable);
        }
        let packet = MagicPacket::new(self.mac);
        self.link
            .send_datagram(packet.as_bytes(), self.target.socket_addr())
            .map_err(|source| WakeError::TransmissionFailed {
                target: self.target,
                source,
            })
    }
}
