//! UDP broadcast link for magic packets.

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use proxwake_core::{BroadcastTarget, NetworkLink};
use tracing::debug;

/// Sends datagrams from one broadcast-enabled UDP socket.
///
/// Readiness is checked by connecting a throwaway socket to the broadcast
/// target: the kernel refuses when there is no route, which is what an
/// unassociated Wi-Fi interface looks like.
#[derive(Debug)]
pub struct UdpBroadcaster {
    socket: UdpSocket,
    route_target: SocketAddrV4,
}

impl UdpBroadcaster {
    /// Bind an ephemeral IPv4 socket with `SO_BROADCAST` set.
    ///
    /// # Errors
    ///
    /// Returns the socket error if binding or enabling broadcast fails.
    pub fn bind(target: BroadcastTarget) -> io::Result<Self> {
        let socket = broadcast_socket()?;
        Ok(Self {
            socket,
            route_target: target.socket_addr(),
        })
    }
}

fn broadcast_socket() -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.set_broadcast(true)?;
    Ok(socket)
}

impl NetworkLink for UdpBroadcaster {
    fn is_ready(&self) -> bool {
        match broadcast_socket().and_then(|socket| socket.connect(self.route_target)) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, target = %self.route_target, "No route to broadcast target");
                false
            }
        }
    }

    fn send_datagram(&self, payload: &[u8], target: SocketAddrV4) -> io::Result<()> {
        let sent = self.socket.send_to(payload, target)?;
        if sent == payload.len() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short send: {sent} of {} bytes", payload.len()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxwake_core::{MacAddress, MagicPacket};
    use std::time::Duration;

    #[test]
    fn test_sends_magic_packet_to_listener() {
        let listener = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        listener
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = listener.local_addr().unwrap().port();
        let target = BroadcastTarget::new(Ipv4Addr::LOCALHOST, port);

        let link = UdpBroadcaster::bind(target).unwrap();
        assert!(link.is_ready());

        let packet = MagicPacket::new(MacAddress::new([1, 2, 3, 4, 5, 6]));
        link.send_datagram(packet.as_bytes(), target.socket_addr())
            .unwrap();

        let mut buf = [0u8; 256];
        let (len, _) = listener.recv_from(&mut buf).unwrap();
        assert_eq!(len, 102);
        assert_eq!(&buf[..len], packet.as_bytes());
    }
}
