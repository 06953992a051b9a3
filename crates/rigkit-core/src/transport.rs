//! Transport trait for rig communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a device:
//! serial ports, TCP streams, and mock transports for testing. Backends
//! operate on a `Transport` rather than directly on a port, enabling both
//! real hardware control and deterministic unit testing.
//!
//! A transport surfaces failures but never retries them: a timeout is
//! retried by the calling layer up to its configured retry count, and an
//! I/O error propagates unmodified because only the layer above knows
//! whether reopening mid-transaction is safe.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{Error, Result};

/// Hard ceiling on `read_until` accumulation, to bound memory on a
/// babbling device.
pub const MAX_READ_UNTIL: usize = 8192;

/// Asynchronous byte-level transport to a device.
///
/// Implementations handle buffering and error mapping at the physical
/// layer. Protocol concerns (framing, command structure) live in the
/// backends that consume this trait.
#[async_trait]
pub trait Transport: Send {
    /// Send raw bytes, blocking until all bytes are written.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes into `buf`, waiting up to `timeout`.
    ///
    /// Returns the number of bytes read, or [`Error::Timeout`] if nothing
    /// arrived within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Read until any byte in `terminators` is seen, accumulating at most
    /// `max_len` bytes within `timeout`.
    ///
    /// Returns the accumulated bytes including the terminator. The default
    /// implementation layers on [`receive`](Transport::receive); stream
    /// transports may override with something smarter.
    async fn read_until(
        &mut self,
        terminators: &[u8],
        max_len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let max_len = max_len.min(MAX_READ_UNTIL);
        let deadline = tokio::time::Instant::now() + timeout;
        let mut out = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let n = self.receive(&mut byte, deadline - now).await?;
            if n == 0 {
                continue;
            }
            out.push(byte[0]);
            if terminators.contains(&byte[0]) {
                return Ok(out);
            }
            if out.len() >= max_len {
                return Err(Error::Protocol(format!(
                    "no terminator within {max_len} bytes"
                )));
            }
        }
    }

    /// Discard any unread input.
    ///
    /// Called before a command to drop stray bytes left over from a prior
    /// timed-out exchange.
    async fn flush_input(&mut self) -> Result<()>;

    /// Drive the RTS line (auxiliary PTT keying).
    async fn set_rts(&mut self, _on: bool) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Drive the DTR line (auxiliary PTT keying).
    async fn set_dtr(&mut self, _on: bool) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Read the CD line (auxiliary DCD sensing).
    async fn read_cd(&mut self) -> Result<bool> {
        Err(Error::NotImplemented)
    }

    /// Read the CTS line (auxiliary DCD sensing).
    async fn read_cts(&mut self) -> Result<bool> {
        Err(Error::NotImplemented)
    }

    /// Close the transport. Subsequent sends and receives return
    /// [`Error::Io`].
    async fn close(&mut self) -> Result<()>;

    /// Whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
