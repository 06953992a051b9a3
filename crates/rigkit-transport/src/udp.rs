//! UDP transport for datagram-based communication.
//!
//! [`UdpTransport`] wraps a [`tokio::net::UdpSocket`] with error mapping
//! consistent with the rest of the transport layer. It does **not**
//! implement the [`Transport`](rigkit_core::Transport) trait because UDP
//! is connectionless and datagram-based rather than stream-oriented.
//!
//! Uses in rigkit:
//! - the daemon's fire-and-forget multicast telemetry publisher
//!   (state snapshots, transceive notifications, spectrum frames);
//! - UDP-framed variants of the wire protocol.

use rigkit_core::error::{Error, Result};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

/// UDP transport for datagram-based communication.
#[derive(Debug)]
pub struct UdpTransport {
    /// The underlying UDP socket.
    socket: UdpSocket,
    /// The local address the socket is bound to.
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind to a local address.
    ///
    /// Use `"0.0.0.0:0"` to bind to any available port on all interfaces.
    pub async fn bind(addr: &str) -> Result<Self> {
        tracing::debug!(addr = %addr, "Binding UDP socket");

        let socket = UdpSocket::bind(addr).await.map_err(|e| {
            tracing::error!(addr = %addr, error = %e, "Failed to bind UDP socket");
            Error::Io(format!("bind {addr}: {e}"))
        })?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| Error::Io(format!("local_addr: {e}")))?;

        tracing::debug!(local_addr = %local_addr, "UDP socket bound");

        Ok(Self { socket, local_addr })
    }

    /// Bind to a specific port on all interfaces.
    pub async fn bind_port(port: u16) -> Result<Self> {
        Self::bind(&format!("0.0.0.0:{port}")).await
    }

    /// Get the local address this socket is bound to.
    ///
    /// Useful when binding to port 0 to discover the assigned port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Enable or disable broadcast on this socket.
    pub fn set_broadcast(&self, on: bool) -> Result<()> {
        self.socket
            .set_broadcast(on)
            .map_err(|e| Error::Io(format!("set_broadcast: {e}")))
    }

    /// Set the multicast TTL for outgoing IPv4 multicast datagrams.
    ///
    /// The default of 1 keeps telemetry on the local subnet.
    pub fn set_multicast_ttl_v4(&self, ttl: u32) -> Result<()> {
        self.socket
            .set_multicast_ttl_v4(ttl)
            .map_err(|e| Error::Io(format!("set_multicast_ttl_v4: {e}")))
    }

    /// Join an IPv4 multicast group (for telemetry consumers).
    pub fn join_multicast_v4(&self, group: Ipv4Addr, interface: Ipv4Addr) -> Result<()> {
        self.socket
            .join_multicast_v4(group, interface)
            .map_err(|e| Error::Io(format!("join_multicast_v4 {group}: {e}")))
    }

    /// Send a datagram to a specific address.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<usize> {
        self.socket
            .send_to(data, addr)
            .await
            .map_err(|e| Error::Io(format!("send_to {addr}: {e}")))
    }

    /// Receive a datagram, waiting up to `timeout`.
    ///
    /// Returns the byte count and source address.
    pub async fn recv_from(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<(usize, SocketAddr)> {
        match tokio::time::timeout(timeout, self.socket.recv_from(buf)).await {
            Ok(Ok((n, src))) => Ok((n, src)),
            Ok(Err(e)) => Err(Error::Io(format!("recv_from: {e}"))),
            Err(_) => Err(Error::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_and_round_trip() {
        let a = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let b = UdpTransport::bind("127.0.0.1:0").await.unwrap();

        a.send_to(b"snapshot", b.local_addr()).await.unwrap();

        let mut buf = [0u8; 64];
        let (n, src) = b
            .recv_from(&mut buf, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"snapshot");
        assert_eq!(src, a.local_addr());
    }

    #[tokio::test]
    async fn recv_times_out() {
        let sock = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let mut buf = [0u8; 8];
        let r = sock.recv_from(&mut buf, Duration::from_millis(20)).await;
        assert!(matches!(r, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn multicast_ttl_settable() {
        let sock = UdpTransport::bind("0.0.0.0:0").await.unwrap();
        sock.set_multicast_ttl_v4(1).unwrap();
        sock.set_broadcast(true).unwrap();
    }
}
