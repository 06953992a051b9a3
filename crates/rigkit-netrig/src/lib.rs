//! rigkit-netrig: the network client backend.
//!
//! [`NetRig`] implements the backend contract by relaying every operation
//! over the line protocol to a remote control daemon (`rigkitd` or any
//! rigctld-compatible server). It is deliberately the mirror image of the
//! daemon: the wire protocol is a serialization of the dispatch API, and
//! this backend closes the loop -- a `Rig` over a `NetRig` over a daemon
//! over another `Rig` behaves like the local handle.
//!
//! On `open` the client performs the handshake: `\chk_vfo` negotiates
//! per-command VFO qualifiers, then `\dump_state` transfers the server's
//! full capability snapshot. Operations the server reported absent are
//! refused locally with `NotImplemented`, without touching the network.

mod rig;

pub use rig::{netrig_caps, NetRig, NETRIG_MODEL_ID};
