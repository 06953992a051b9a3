//! Capability tables.
//!
//! A [`RigCaps`] describes one rig model: identity, frequency coverage,
//! mode/level/function/parameter support, filter and tuning-step tables,
//! port-timing defaults, and — centrally — the [`OpMask`] of operations the
//! backend actually implements.
//!
//! Capability tables are built once at registry construction, shared via
//! `Arc`, and never mutated. The dispatch core consults `ops` before every
//! backend call: an absent operation fails with `NotImplemented` without
//! touching the transport, which keeps "not implemented" distinct from
//! "implemented but refused" (`Rejected`).

use crate::types::{AgcLevel, FilterEntry, FreqRange, TuningStep};

/// A dispatchable operation, one bit per operation in an [`OpMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    SetFreq,
    GetFreq,
    SetMode,
    GetMode,
    SetVfo,
    GetVfo,
    SetPtt,
    GetPtt,
    GetDcd,
    SetSplitVfo,
    GetSplitVfo,
    SetSplitFreq,
    GetSplitFreq,
    SetSplitMode,
    GetSplitMode,
    SetRit,
    GetRit,
    SetXit,
    GetXit,
    SetTuningStep,
    GetTuningStep,
    SetLevel,
    GetLevel,
    SetFunc,
    GetFunc,
    SetParm,
    GetParm,
    SetAnt,
    GetAnt,
    SetMem,
    GetMem,
    SetCtcss,
    GetCtcss,
    SetDcs,
    GetDcs,
    SendDtmf,
    SendMorse,
    SetPowerStat,
    GetPowerStat,
    Power2Mw,
    Mw2Power,
    VfoOp,
    SetLockMode,
    GetLockMode,
}

impl Op {
    /// The mask bit for this operation.
    pub fn bit(&self) -> u64 {
        1u64 << (*self as u64)
    }
}

/// A sparse presence map of implemented operations.
///
/// Absence of a bit is the "not implemented" signal the dispatch core
/// turns into [`Error::NotImplemented`](crate::error::Error::NotImplemented)
/// before any transport traffic happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpMask(u64);

impl OpMask {
    /// The empty mask: no operations implemented.
    pub const EMPTY: OpMask = OpMask(0);

    /// Build a mask from a slice of operations.
    pub fn from_ops(ops: &[Op]) -> Self {
        OpMask(ops.iter().fold(0, |m, op| m | op.bit()))
    }

    /// Whether `op` is present.
    pub fn contains(&self, op: Op) -> bool {
        self.0 & op.bit() != 0
    }

    /// Return a copy with `op` added.
    pub fn with(self, op: Op) -> Self {
        OpMask(self.0 | op.bit())
    }

    /// Return a copy with `op` removed.
    pub fn without(self, op: Op) -> Self {
        OpMask(self.0 & !op.bit())
    }

    /// Union of two masks.
    pub fn union(self, other: OpMask) -> Self {
        OpMask(self.0 | other.0)
    }

    /// Number of operations present.
    pub fn len(&self) -> u32 {
        self.0.count_ones()
    }

    /// Whether no operations are present.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Capabilities and limits of a specific rig model.
///
/// One instance exists per model, shared read-only by every handle of that
/// model. Backends populate this at registration time; the dispatch core,
/// the daemon's `dump_state` encoder, and the network client's negotiated
/// view all consume it.
#[derive(Debug, Clone)]
pub struct RigCaps {
    /// Numeric model identifier, unique within a registry.
    pub model_id: u32,
    /// Human-readable model name (e.g. "Simulator", "Network rig").
    pub model_name: &'static str,
    /// Manufacturer name.
    pub mfg_name: &'static str,
    /// ITU region the range tables describe (1, 2 or 3).
    pub itu_region: u8,
    /// Receive frequency coverage.
    pub rx_ranges: Vec<FreqRange>,
    /// Transmit frequency coverage.
    pub tx_ranges: Vec<FreqRange>,
    /// Tuning steps per mode set.
    pub tuning_steps: Vec<TuningStep>,
    /// Available filters per mode set.
    pub filters: Vec<FilterEntry>,
    /// Maximum RIT offset in hertz (0 = no RIT).
    pub max_rit_hz: i32,
    /// Maximum XIT offset in hertz (0 = no XIT).
    pub max_xit_hz: i32,
    /// Maximum IF shift in hertz (0 = no IF shift).
    pub max_if_shift_hz: i32,
    /// Announce capability mask (0 = none).
    pub announces: u32,
    /// Preamp gain steps in dB, strongest last.
    pub preamps: Vec<u8>,
    /// Attenuator steps in dB, strongest last.
    pub attenuators: Vec<u8>,
    /// CTCSS tones in tenths of hertz (e.g. 885 for 88.5 Hz).
    pub ctcss_tones: Vec<u32>,
    /// DCS codes.
    pub dcs_codes: Vec<u32>,
    /// AGC settings this model supports.
    pub agc_levels: Vec<AgcLevel>,
    /// Mask of functions readable via `get_func` ([`Func::bit`](crate::types::Func::bit)).
    pub has_get_func: u64,
    /// Mask of functions settable via `set_func`.
    pub has_set_func: u64,
    /// Mask of levels readable via `get_level` ([`Level::bit`](crate::types::Level::bit)).
    pub has_get_level: u64,
    /// Mask of levels settable via `set_level`.
    pub has_set_level: u64,
    /// Mask of parameters readable via `get_parm` ([`Parm::bit`](crate::types::Parm::bit)).
    pub has_get_parm: u64,
    /// Mask of parameters settable via `set_parm`.
    pub has_set_parm: u64,
    /// Mask of supported VFO operations ([`VfoOp::bit`](crate::types::VfoOp::bit)).
    pub vfo_ops: u32,
    /// Mask of VFOs that can be targeted without switching ([`Vfo::bit`](crate::types::Vfo::bit)).
    pub targetable_vfo: u32,
    /// Number of antenna ports (0 = no antenna switching).
    pub antenna_count: u8,
    /// Number of memory channels (0 = none).
    pub memory_channels: u32,
    /// Default response timeout in milliseconds.
    pub timeout_ms: u64,
    /// Default retry count on timeout.
    pub retries: u32,
    /// Default inter-chunk write pacing in milliseconds.
    pub write_delay_ms: u64,
    /// Default post-command write delay in milliseconds.
    pub post_write_delay_ms: u64,
    /// Default serial baud rate (0 for network backends).
    pub default_baud_rate: u32,
    /// The operations this model's backend implements.
    pub ops: OpMask,
}

impl Default for RigCaps {
    fn default() -> Self {
        RigCaps {
            model_id: 0,
            model_name: "Unknown",
            mfg_name: "Unknown",
            itu_region: 2,
            rx_ranges: Vec::new(),
            tx_ranges: Vec::new(),
            tuning_steps: Vec::new(),
            filters: Vec::new(),
            max_rit_hz: 0,
            max_xit_hz: 0,
            max_if_shift_hz: 0,
            announces: 0,
            preamps: Vec::new(),
            attenuators: Vec::new(),
            ctcss_tones: Vec::new(),
            dcs_codes: Vec::new(),
            agc_levels: Vec::new(),
            has_get_func: 0,
            has_set_func: 0,
            has_get_level: 0,
            has_set_level: 0,
            has_get_parm: 0,
            has_set_parm: 0,
            vfo_ops: 0,
            targetable_vfo: 0,
            antenna_count: 0,
            memory_channels: 0,
            timeout_ms: 500,
            retries: 3,
            write_delay_ms: 0,
            post_write_delay_ms: 0,
            default_baud_rate: 0,
            ops: OpMask::EMPTY,
        }
    }
}

impl RigCaps {
    /// Whether the backend implements `op`.
    pub fn supports(&self, op: Op) -> bool {
        self.ops.contains(op)
    }

    /// Whether `freq_hz` is receivable on this model.
    pub fn rx_in_range(&self, freq_hz: u64) -> bool {
        self.rx_ranges.iter().any(|r| r.contains(freq_hz))
    }

    /// Whether `freq_hz` is transmittable on this model.
    pub fn tx_in_range(&self, freq_hz: u64) -> bool {
        self.tx_ranges.iter().any(|r| r.contains(freq_hz))
    }

    /// Whether `freq_hz` is tunable at all (receive or transmit).
    pub fn in_range(&self, freq_hz: u64) -> bool {
        self.rx_in_range(freq_hz) || self.tx_in_range(freq_hz)
    }

    /// Maximum transmit power in milliwatts at `freq_hz`, if any TX range
    /// covers it.
    pub fn max_power_mw(&self, freq_hz: u64) -> Option<i64> {
        self.tx_ranges
            .iter()
            .find(|r| r.contains(freq_hz) && r.high_power_mw > 0)
            .map(|r| r.high_power_mw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Mode, ALL_MODES};

    #[test]
    fn op_bits_are_distinct() {
        let all = [
            Op::SetFreq,
            Op::GetFreq,
            Op::SetMode,
            Op::GetMode,
            Op::SetVfo,
            Op::GetVfo,
            Op::SetPtt,
            Op::GetPtt,
            Op::GetDcd,
            Op::SetSplitVfo,
            Op::GetSplitVfo,
            Op::SetSplitFreq,
            Op::GetSplitFreq,
            Op::SetSplitMode,
            Op::GetSplitMode,
            Op::SetRit,
            Op::GetRit,
            Op::SetXit,
            Op::GetXit,
            Op::SetTuningStep,
            Op::GetTuningStep,
            Op::SetLevel,
            Op::GetLevel,
            Op::SetFunc,
            Op::GetFunc,
            Op::SetParm,
            Op::GetParm,
            Op::SetAnt,
            Op::GetAnt,
            Op::SetMem,
            Op::GetMem,
            Op::SetCtcss,
            Op::GetCtcss,
            Op::SetDcs,
            Op::GetDcs,
            Op::SendDtmf,
            Op::SendMorse,
            Op::SetPowerStat,
            Op::GetPowerStat,
            Op::Power2Mw,
            Op::Mw2Power,
            Op::VfoOp,
            Op::SetLockMode,
            Op::GetLockMode,
        ];
        let mask = OpMask::from_ops(&all);
        assert_eq!(mask.len() as usize, all.len());
    }

    #[test]
    fn op_mask_contains() {
        let mask = OpMask::from_ops(&[Op::SetFreq, Op::GetFreq]);
        assert!(mask.contains(Op::SetFreq));
        assert!(mask.contains(Op::GetFreq));
        assert!(!mask.contains(Op::SetPtt));
    }

    #[test]
    fn op_mask_with_without() {
        let mask = OpMask::EMPTY.with(Op::SetFreq).with(Op::SetPtt);
        assert!(mask.contains(Op::SetFreq));
        assert!(mask.without(Op::SetFreq).contains(Op::SetPtt));
        assert!(!mask.without(Op::SetFreq).contains(Op::SetFreq));
    }

    #[test]
    fn op_mask_union() {
        let a = OpMask::from_ops(&[Op::SetFreq]);
        let b = OpMask::from_ops(&[Op::GetFreq]);
        let u = a.union(b);
        assert!(u.contains(Op::SetFreq));
        assert!(u.contains(Op::GetFreq));
        assert_eq!(u.len(), 2);
    }

    #[test]
    fn empty_mask() {
        assert!(OpMask::EMPTY.is_empty());
        assert_eq!(OpMask::EMPTY.len(), 0);
        assert!(!OpMask::EMPTY.contains(Op::SetFreq));
    }

    fn hf_caps() -> RigCaps {
        RigCaps {
            rx_ranges: vec![FreqRange {
                start_hz: 100_000,
                end_hz: 30_000_000,
                modes: Mode::mask(ALL_MODES),
                low_power_mw: -1,
                high_power_mw: -1,
                vfos: 0x3,
                antennas: 0x1,
            }],
            tx_ranges: vec![FreqRange {
                start_hz: 14_000_000,
                end_hz: 14_350_000,
                modes: Mode::mask(ALL_MODES),
                low_power_mw: 5_000,
                high_power_mw: 100_000,
                vfos: 0x3,
                antennas: 0x1,
            }],
            ..RigCaps::default()
        }
    }

    #[test]
    fn range_queries() {
        let caps = hf_caps();
        assert!(caps.rx_in_range(7_100_000));
        assert!(!caps.tx_in_range(7_100_000));
        assert!(caps.tx_in_range(14_074_000));
        assert!(caps.in_range(7_100_000));
        assert!(!caps.in_range(50_000_000));
    }

    #[test]
    fn max_power_lookup() {
        let caps = hf_caps();
        assert_eq!(caps.max_power_mw(14_074_000), Some(100_000));
        assert_eq!(caps.max_power_mw(7_100_000), None);
    }

    #[test]
    fn default_caps_support_nothing() {
        let caps = RigCaps::default();
        assert!(!caps.supports(Op::SetFreq));
        assert!(!caps.supports(Op::GetPowerStat));
    }
}
