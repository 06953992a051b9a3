//! Asynchronous rig event types.
//!
//! Events are emitted through a [`tokio::sync::broadcast`] channel when rig
//! state changes -- either because a dispatch call changed it, or because a
//! backend observed an out-of-band change (transceive push, operator
//! twiddling the dial). The daemon's telemetry publisher subscribes to this
//! stream and re-broadcasts it over multicast.

use crate::types::{Mode, PowerStat, Vfo};

/// An event emitted when rig state changes.
///
/// Delivered on a best-effort basis through a bounded broadcast channel;
/// slow consumers may miss events under heavy load (e.g. rapid VFO knob
/// movement).
#[derive(Debug, Clone)]
pub enum RigEvent {
    /// The frequency of a VFO changed.
    FreqChanged {
        /// Which VFO changed.
        vfo: Vfo,
        /// New frequency in hertz.
        freq_hz: u64,
    },

    /// The operating mode of a VFO changed.
    ModeChanged {
        /// Which VFO changed.
        vfo: Vfo,
        /// New operating mode.
        mode: Mode,
        /// New passband in hertz.
        passband_hz: u64,
    },

    /// The active VFO changed.
    VfoChanged {
        /// Newly selected VFO.
        vfo: Vfo,
    },

    /// Push-to-talk state changed (TX/RX transition).
    PttChanged {
        /// `true` if transmitting.
        on: bool,
    },

    /// Split operation state changed.
    SplitChanged {
        /// `true` if split is enabled.
        on: bool,
        /// The transmit VFO while split is on.
        tx_vfo: Vfo,
    },

    /// The rig's power state changed.
    PowerStatChanged {
        /// New power state.
        status: PowerStat,
    },

    /// A spectrum scope frame from the rig.
    ///
    /// Payload layout is backend-specific; the core and the telemetry
    /// publisher treat it as opaque bytes.
    SpectrumFrame {
        /// Raw frame data.
        data: Vec<u8>,
    },

    /// The device was opened.
    Opened,

    /// The device was closed.
    Closed,
}
