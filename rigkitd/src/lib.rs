//! rigkitd library: the control daemon's moving parts.
//!
//! The binary in `main.rs` is a thin clap wrapper around this library so
//! integration tests can run a real daemon in-process:
//!
//! - [`settings`]: runtime configuration;
//! - [`server`]: listeners, the shared device handle and its lock
//!   discipline, and the reopen-on-error policy;
//! - [`session`]: the per-connection command loop;
//! - [`publisher`]: the fire-and-forget multicast telemetry channel.

pub mod publisher;
pub mod server;
pub mod session;
pub mod settings;

pub use publisher::{PublisherConfig, TelemetryPacket};
pub use server::{Server, SharedRig};
pub use settings::Settings;
