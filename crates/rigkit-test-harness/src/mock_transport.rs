//! Mock transport for deterministic testing without hardware.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. This lets you test command generation and
//! response parsing without a radio or a network.
//!
//! # Example
//!
//! ```
//! use rigkit_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the client sends this request, return this response.
//! mock.expect(b"f\n", b"14074000\n");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use rigkit_core::error::{Error, Result};
use rigkit_core::transport::Transport;

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes to return when the matching request is received.
    response: Vec<u8>,
}

/// A mock [`Transport`] for testing protocol engines without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation. The
/// corresponding response is then returned by subsequent `receive()`
/// calls.
///
/// If no expectation matches or the queue is exhausted, an error is
/// returned.
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Ordered queue of expected request/response pairs.
    expectations: VecDeque<Expectation>,
    /// The response data pending for the next `receive()` call.
    pending_response: Option<Vec<u8>>,
    /// Cursor into the pending response.
    response_cursor: usize,
    /// Whether the transport is "connected".
    connected: bool,
    /// Log of all bytes sent through this transport.
    sent_log: Vec<Vec<u8>>,
    /// Count of `flush_input` calls, for asserting flush-before-command
    /// discipline.
    flushes: u32,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            connected: true,
            ..MockTransport::default()
        }
    }

    /// Add an expected request/response pair.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// All data sent through this transport, one element per `send()`.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Number of expectations not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Number of `flush_input` calls observed.
    pub fn flush_count(&self) -> u32 {
        self.flushes
    }

    /// Force the connected state.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::Io("mock transport disconnected".into()));
        }

        self.sent_log.push(data.to_vec());

        if let Some(expectation) = self.expectations.pop_front() {
            if data != expectation.request.as_slice() {
                return Err(Error::Protocol(format!(
                    "unexpected send data: expected {:02X?}, got {:02X?}",
                    expectation.request, data
                )));
            }
            self.pending_response = Some(expectation.response);
            self.response_cursor = 0;
            Ok(())
        } else {
            Err(Error::Protocol(
                "no more expectations in mock transport".into(),
            ))
        }
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::Io("mock transport disconnected".into()));
        }

        if let Some(ref response) = self.pending_response {
            let remaining = &response[self.response_cursor..];
            if remaining.is_empty() {
                self.pending_response = None;
                self.response_cursor = 0;
                return Err(Error::Timeout);
            }
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.response_cursor += n;
            if self.response_cursor >= response.len() {
                self.pending_response = None;
                self.response_cursor = 0;
            }
            Ok(n)
        } else {
            Err(Error::Timeout)
        }
    }

    async fn flush_input(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Error::Io("mock transport disconnected".into()));
        }
        self.flushes += 1;
        // Discard any unread response bytes, like a real flush would.
        self.pending_response = None;
        self.response_cursor = 0;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.pending_response = None;
        self.response_cursor = 0;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn basic_send_receive() {
        let mut mock = MockTransport::new();
        mock.expect(b"f\n", b"14074000\n");

        mock.send(b"f\n").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"14074000\n");
    }

    #[tokio::test]
    async fn tracks_sent_data() {
        let mut mock = MockTransport::new();
        mock.expect(b"f\n", b"1\n");
        mock.expect(b"m\n", b"USB\n2400\n");

        mock.send(b"f\n").await.unwrap();
        let mut buf = [0u8; 8];
        let _ = mock.receive(&mut buf, Duration::from_millis(10)).await;
        mock.send(b"m\n").await.unwrap();

        assert_eq!(mock.sent_data().len(), 2);
        assert_eq!(mock.sent_data()[0], b"f\n");
        assert_eq!(mock.sent_data()[1], b"m\n");
    }

    #[tokio::test]
    async fn wrong_data_errors() {
        let mut mock = MockTransport::new();
        mock.expect(b"f\n", b"1\n");

        let result = mock.send(b"t\n").await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn no_expectations_errors() {
        let mut mock = MockTransport::new();
        let result = mock.send(b"f\n").await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn receive_without_send_times_out() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 64];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn flush_discards_pending_response() {
        let mut mock = MockTransport::new();
        mock.expect(b"f\n", b"stale\n");
        mock.send(b"f\n").await.unwrap();

        mock.flush_input().await.unwrap();
        assert_eq!(mock.flush_count(), 1);

        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn disconnect_fails_operations() {
        let mut mock = MockTransport::new();
        mock.close().await.unwrap();
        assert!(!mock.is_connected());

        let result = mock.send(b"f\n").await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn partial_receive() {
        let mut mock = MockTransport::new();
        mock.expect(b"f\n", b"14074000\n");
        mock.send(b"f\n").await.unwrap();

        let mut buf = [0u8; 4];
        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"1407");
        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"4000");
    }

    #[tokio::test]
    async fn read_until_line() {
        let mut mock = MockTransport::new();
        mock.expect(b"f\n", b"14074000\n");
        mock.send(b"f\n").await.unwrap();

        let line = mock
            .read_until(b"\n", 64, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(line, b"14074000\n");
    }
}
