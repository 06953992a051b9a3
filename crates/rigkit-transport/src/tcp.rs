//! TCP transport for rig communication.
//!
//! [`TcpTransport`] implements the [`Transport`] trait for network
//! endpoints: rig control daemons (the `rigkitd`/rigctld line protocol)
//! and network-attached transceivers.

use async_trait::async_trait;
use rigkit_core::error::{Error, Result};
use rigkit_core::transport::Transport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default connection timeout (5 seconds).
///
/// Generous enough for LAN connections and most internet links, but short
/// enough to avoid hanging when an endpoint is unreachable.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP transport for rig communication.
///
/// The connection is established eagerly via [`connect`](TcpTransport::connect)
/// or [`connect_with_timeout`](TcpTransport::connect_with_timeout).
#[derive(Debug)]
pub struct TcpTransport {
    /// The underlying TCP stream, `None` after `close()` is called.
    stream: Option<TcpStream>,
    /// The address string for logging/debugging.
    addr: String,
}

impl TcpTransport {
    /// Connect to a TCP endpoint using the default timeout.
    ///
    /// The `addr` parameter should be a `host:port` string, e.g.
    /// `"localhost:4532"`.
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to a TCP endpoint with a specified timeout.
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        tracing::debug!(addr = %addr, timeout_ms = timeout.as_millis(), "Connecting to TCP endpoint");

        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                tracing::error!(addr = %addr, "TCP connection timed out");
                Error::Timeout
            })?
            .map_err(|e| {
                tracing::error!(addr = %addr, error = %e, "TCP connection failed");
                Error::Io(format!("connect to {addr}: {e}"))
            })?;

        // Disable Nagle's algorithm; rig commands are small and
        // latency-sensitive.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "Failed to set TCP_NODELAY (continuing anyway)");
        }

        tracing::info!(addr = %addr, "TCP connection established");

        Ok(Self {
            stream: Some(stream),
            addr: addr.to_string(),
        })
    }

    /// Wrap an existing `TcpStream` as a `TcpTransport`.
    ///
    /// Useful when a connection has already been established externally
    /// (e.g. accepted from a listener in tests).
    pub fn from_stream(stream: TcpStream, addr: String) -> Self {
        tracing::debug!(addr = %addr, "Wrapping existing TCP stream");
        Self {
            stream: Some(stream),
            addr,
        }
    }

    /// The address this transport was connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::Io("TCP stream not connected".into()))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let addr = self.addr.clone();
        let stream = self.stream_mut()?;

        tracing::trace!(addr = %addr, bytes = data.len(), "Sending data");

        stream
            .write_all(data)
            .await
            .map_err(|e| Error::Io(format!("TCP write to {addr}: {e}")))?;
        stream
            .flush()
            .await
            .map_err(|e| Error::Io(format!("TCP flush to {addr}: {e}")))?;
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let addr = self.addr.clone();
        let stream = self.stream_mut()?;

        match tokio::time::timeout(timeout, stream.read(buf)).await {
            Ok(Ok(0)) => Err(Error::Io(format!("connection to {addr} closed by peer"))),
            Ok(Ok(n)) => {
                tracing::trace!(addr = %addr, bytes = n, "Received data");
                Ok(n)
            }
            Ok(Err(e)) => Err(Error::Io(format!("TCP read from {addr}: {e}"))),
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn flush_input(&mut self) -> Result<()> {
        let stream = self.stream_mut()?;
        let mut buf = [0u8; 512];
        // Drain whatever is already buffered without blocking on more.
        loop {
            match tokio::time::timeout(Duration::from_millis(1), stream.read(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    tracing::trace!(bytes = n, "Discarded stale input");
                }
                Ok(Err(_)) | Err(_) => break,
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!(addr = %self.addr, "Closing TCP connection");
            let _ = stream.shutdown().await;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connect_and_echo() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 16];
            let n = sock.read(&mut buf).await.unwrap();
            sock.write_all(&buf[..n]).await.unwrap();
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        assert!(transport.is_connected());

        transport.send(b"f\n").await.unwrap();
        let mut buf = [0u8; 16];
        let n = transport
            .receive(&mut buf, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"f\n");

        transport.close().await.unwrap();
        assert!(!transport.is_connected());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn receive_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        let mut buf = [0u8; 16];
        let r = transport.receive(&mut buf, Duration::from_millis(50)).await;
        assert!(matches!(r, Err(Error::Timeout)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn send_after_close_is_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        transport.close().await.unwrap();
        let r = transport.send(b"x").await;
        assert!(matches!(r, Err(Error::Io(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn read_until_newline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"14074000\nextra").await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        let line = transport
            .read_until(b"\n", 64, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(line, b"14074000\n");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_refused_is_io_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let r = TcpTransport::connect(&addr).await;
        assert!(matches!(r, Err(Error::Io(_))));
    }
}
