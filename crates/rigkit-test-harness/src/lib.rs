//! rigkit-test-harness: mock transports, a scripted line-protocol
//! server, and an instrumented backend for testing rigkit without
//! hardware.
//!
//! - [`MockTransport`]: byte-exact request/response transport for
//!   protocol engines;
//! - [`MockRigServer`]: a scripted TCP server speaking the line protocol,
//!   for testing the network client backend;
//! - [`StubBackend`]/[`StubStats`]: an in-memory backend with call
//!   counters, failure injection, and transaction-overlap detection, for
//!   dispatch and daemon tests.

pub mod mock_server;
pub mod mock_transport;
pub mod stub_backend;

pub use mock_server::MockRigServer;
pub use mock_transport::MockTransport;
pub use stub_backend::{StubBackend, StubStats};
