//! Mock line-protocol server for client-side testing.
//!
//! [`MockRigServer`] is a lightweight TCP listener pre-loaded with
//! scripted command/response exchanges, enabling deterministic testing of
//! the network client backend without a running daemon.
//!
//! Unlike a byte-exact mock, expectations are matched per *line*: the
//! server reads one `\n`-terminated command, compares it after trimming,
//! and writes back the scripted response text (which may span several
//! lines, e.g. a `dump_state` payload).

use std::collections::VecDeque;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use rigkit_core::error::{Error, Result};

/// A scripted exchange: one command line in, a response payload out.
#[derive(Debug, Clone)]
struct Exchange {
    /// The expected command line (without terminator).
    request: String,
    /// The full response text to write back (caller includes newlines).
    response: String,
}

/// A mock rig-control server speaking the line protocol.
///
/// The server listens on a random localhost port, accepts a single
/// connection, and processes exchanges in order. A command that does not
/// match the next expectation fails the server task, which
/// [`wait`](MockRigServer::wait) reports.
pub struct MockRigServer {
    addr: String,
    exchanges: VecDeque<Exchange>,
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
    listener: Option<TcpListener>,
}

impl MockRigServer {
    /// Bind a new mock server on a random port.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Io(format!("bind mock server: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| Error::Io(format!("local_addr: {e}")))?
            .to_string();
        Ok(Self {
            addr,
            exchanges: VecDeque::new(),
            server_handle: None,
            listener: Some(listener),
        })
    }

    /// Script one exchange: `request` (a command line, no terminator) and
    /// the exact response text to send back.
    pub fn expect(&mut self, request: &str, response: &str) {
        self.exchanges.push_back(Exchange {
            request: request.to_string(),
            response: response.to_string(),
        });
    }

    /// The `host:port` the server is listening on.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Start serving. Returns a channel that fires once the accept loop
    /// is running, so clients cannot race the listener.
    pub fn start(&mut self) -> oneshot::Receiver<()> {
        let exchanges: Vec<Exchange> = self.exchanges.drain(..).collect();
        let listener = self.listener.take().expect("server already started");
        let (ready_tx, ready_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let _ = ready_tx.send(());

            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| format!("accept: {e}"))?;
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);

            for (i, exchange) in exchanges.iter().enumerate() {
                let mut line = String::new();
                let n = reader
                    .read_line(&mut line)
                    .await
                    .map_err(|e| format!("exchange {i}: read error: {e}"))?;
                if n == 0 {
                    return Err(format!(
                        "exchange {i}: client disconnected, expected {:?}",
                        exchange.request
                    ));
                }
                let got = line.trim_end_matches(['\r', '\n']);
                if got != exchange.request {
                    return Err(format!(
                        "exchange {i}: expected {:?}, got {got:?}",
                        exchange.request
                    ));
                }
                write_half
                    .write_all(exchange.response.as_bytes())
                    .await
                    .map_err(|e| format!("exchange {i}: write error: {e}"))?;
                write_half
                    .flush()
                    .await
                    .map_err(|e| format!("exchange {i}: flush error: {e}"))?;
            }

            Ok(())
        });

        self.server_handle = Some(handle);
        ready_rx
    }

    /// Wait for the server task and surface any scripting mismatch.
    pub async fn wait(self) -> std::result::Result<(), String> {
        if let Some(handle) = self.server_handle {
            handle
                .await
                .map_err(|e| format!("server task panicked: {e}"))?
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn scripted_exchange() {
        let mut server = MockRigServer::new().await.unwrap();
        server.expect("f", "14074000\n");
        server.expect("q", "RPRT 0\n");
        let addr = server.addr().to_string();
        let ready = server.start();
        ready.await.unwrap();

        let mut client = TcpStream::connect(&addr).await.unwrap();
        client.write_all(b"f\n").await.unwrap();
        let mut buf = [0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"14074000\n");

        client.write_all(b"q\n").await.unwrap();
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"RPRT 0\n");

        server.wait().await.unwrap();
    }

    #[tokio::test]
    async fn mismatch_is_reported() {
        let mut server = MockRigServer::new().await.unwrap();
        server.expect("f", "14074000\n");
        let addr = server.addr().to_string();
        let ready = server.start();
        ready.await.unwrap();

        let mut client = TcpStream::connect(&addr).await.unwrap();
        client.write_all(b"t\n").await.unwrap();

        let err = server.wait().await.unwrap_err();
        assert!(err.contains("expected"), "unexpected error text: {err}");
    }
}
