//! Transport implementations for rigkit.
//!
//! This crate provides concrete implementations of the
//! [`Transport`](rigkit_core::Transport) trait from `rigkit-core` for the
//! physical connection types the core consumes:
//!
//! - [`SerialTransport`]: USB virtual COM ports and RS-232 serial
//!   connections, with RTS/DTR line control for auxiliary PTT keying
//! - [`TcpTransport`]: TCP connections to rig control daemons and
//!   network-attached rigs
//! - [`UdpTransport`]: datagram sockets for multicast telemetry and
//!   UDP-framed control
//!
//! # Example
//!
//! ```no_run
//! use rigkit_transport::TcpTransport;
//! use rigkit_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> rigkit_core::Result<()> {
//! // Connect to a rig control daemon
//! let mut transport = TcpTransport::connect("localhost:4532").await?;
//!
//! // Send a command
//! transport.send(b"f\n").await?;
//!
//! // Receive the reply line
//! let line = transport.read_until(b"\n", 64, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;
pub mod tcp;
pub mod udp;

pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits};
pub use tcp::TcpTransport;
pub use udp::UdpTransport;
