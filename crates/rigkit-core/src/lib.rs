//! rigkit-core: capability tables, the `Rig` device handle, dispatch,
//! caching and VFO resolution.
//!
//! This crate is the hub of the rigkit workspace. It defines:
//!
//! - [`RigCaps`]: the immutable per-model capability table, including the
//!   [`OpMask`] of operations the backend implements;
//! - [`Backend`]: the async trait every hardware driver implements;
//! - [`Rig`]: the device handle tying one backend to its capability table
//!   and mutable runtime state, with capability-gated dispatch, a
//!   lifecycle state machine, per-field caching and logical-VFO
//!   resolution;
//! - [`Transport`]: the byte-level link abstraction implemented by
//!   `rigkit-transport`;
//! - [`Registry`]: explicit model registry (no global state);
//! - [`Error`]: the error taxonomy shared across the workspace, with
//!   stable wire status codes.
//!
//! Backends live in their own crates (`rigkit-sim`, `rigkit-netrig`) and
//! plug in purely through [`Backend`] and [`RigCaps`].

pub mod backend;
pub mod cache;
pub mod caps;
pub mod error;
pub mod events;
pub mod helpers;
pub mod registry;
pub mod rig;
pub mod transport;
pub mod types;

pub use backend::Backend;
pub use cache::{Cache, CacheField, CachePolicy, TwiddleGuard, ALL_CACHE_FIELDS};
pub use caps::{Op, OpMask, RigCaps};
pub use error::{Error, Result};
pub use events::RigEvent;
pub use helpers::{format_freq_mhz, mw2power_linear, power2mw_linear};
pub use registry::{BackendFactory, ModelEntry, Registry};
pub use rig::{Phase, Rig, RigState};
pub use transport::{Transport, MAX_READ_UNTIL};
pub use types::{
    AgcLevel, DcdType, FilterEntry, FreqRange, Func, Level, Mode, Parm, PortConfig, PowerStat,
    PttType, TuningStep, Vfo, VfoOp, ALL_FUNCS, ALL_LEVELS, ALL_MODES, ALL_PARMS,
};
