//! rigkit-sim: a simulated in-memory rig backend.
//!
//! [`SimRig`] implements the full backend contract against plain memory:
//! no transport, no hardware, deterministic behavior. It serves three
//! jobs:
//!
//! - the default model for running the daemon without a radio attached;
//! - a realistic fixture for integration tests across the workspace;
//! - a reference for backend authors, since every operation class is
//!   exercised here in its simplest form.
//!
//! The simulator keeps honest semantics where it matters: keying PTT
//! while the virtual rig is powered off is refused, VFO operations move
//! real state, and power conversions follow the capability table.

mod rig;

pub use rig::{sim_caps, SimRig, SIM_MODEL_ID};
