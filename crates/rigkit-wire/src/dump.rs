//! The `dump_state` capability snapshot.
//!
//! On connect, a client asks the server for a full capability/state dump.
//! Protocol version 0 is a fixed-order sequence of numeric lines:
//!
//! 1. protocol version, model id, ITU region (one line each);
//! 2. receive ranges, one `start end 0xmodes low_mw high_mw 0xvfos 0xant`
//!    line per range, terminated by a sentinel line of seven zeros;
//! 3. transmit ranges, same shape and sentinel;
//! 4. tuning steps then filters, one `0xmodes value` line each,
//!    terminated by `0 0`;
//! 5. max RIT / max XIT / max IF-shift / announce mask (one line each);
//! 6. preamp and attenuator lists (one space-separated line each,
//!    possibly empty);
//! 7. six hex masks: get/set functions, get/set levels, get/set
//!    parameters.
//!
//! Version >= 1 appends `key=value` lines terminated by a literal `done`.
//! Unknown keys are forward-compatible no-ops: the authoritative key set
//! belongs to the server, and a client must never fail on a key it does
//! not recognize.

use rigkit_core::caps::{Op, OpMask, RigCaps};
use rigkit_core::error::{Error, Result};
use rigkit_core::types::{AgcLevel, FilterEntry, FreqRange, PttType, TuningStep};

use crate::response::{parse_hex_u64, parse_i32, parse_u32, parse_u64};

/// The protocol version this implementation speaks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Terminator line for the `key=value` extension section.
const EXT_DONE: &str = "done";

/// A parsed (or to-be-encoded) capability snapshot.
#[derive(Debug, Clone)]
pub struct StateDump {
    pub protocol_ver: u32,
    pub model_id: u32,
    pub itu_region: u8,
    pub rx_ranges: Vec<FreqRange>,
    pub tx_ranges: Vec<FreqRange>,
    pub tuning_steps: Vec<TuningStep>,
    pub filters: Vec<FilterEntry>,
    pub max_rit_hz: i32,
    pub max_xit_hz: i32,
    pub max_if_shift_hz: i32,
    pub announces: u32,
    pub preamps: Vec<u8>,
    pub attenuators: Vec<u8>,
    pub has_get_func: u64,
    pub has_set_func: u64,
    pub has_get_level: u64,
    pub has_set_level: u64,
    pub has_get_parm: u64,
    pub has_set_parm: u64,
    // --- version >= 1 extension tags ---
    pub vfo_ops: u32,
    pub ptt_type: PttType,
    pub targetable_vfo: u32,
    pub has_set_vfo: bool,
    pub has_get_vfo: bool,
    pub has_set_freq: bool,
    pub has_get_freq: bool,
    pub has_set_ptt: bool,
    pub has_get_ptt: bool,
    pub has_set_split: bool,
    pub ctcss_tones: Vec<u32>,
    pub dcs_codes: Vec<u32>,
    pub agc_levels: Vec<AgcLevel>,
    pub timeout_ms: u64,
}

impl Default for StateDump {
    fn default() -> Self {
        StateDump {
            protocol_ver: 0,
            model_id: 0,
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
            has_get_func: 0,
            has_set_func: 0,
            has_get_level: 0,
            has_set_level: 0,
            has_get_parm: 0,
            has_set_parm: 0,
            vfo_ops: 0,
            ptt_type: PttType::Rig,
            targetable_vfo: 0,
            // A version-0 server cannot report feature presence; assume
            // everything and let individual calls fail.
            has_set_vfo: true,
            has_get_vfo: true,
            has_set_freq: true,
            has_get_freq: true,
            has_set_ptt: true,
            has_get_ptt: true,
            has_set_split: true,
            ctcss_tones: Vec::new(),
            dcs_codes: Vec::new(),
            agc_levels: Vec::new(),
            timeout_ms: 0,
        }
    }
}

impl StateDump {
    /// Build a snapshot of a capability table for the server side.
    pub fn from_caps(caps: &RigCaps, protocol_ver: u32, ptt_type: PttType) -> Self {
        StateDump {
            protocol_ver,
            model_id: caps.model_id,
            itu_region: caps.itu_region,
            rx_ranges: caps.rx_ranges.clone(),
            tx_ranges: caps.tx_ranges.clone(),
            tuning_steps: caps.tuning_steps.clone(),
            filters: caps.filters.clone(),
            max_rit_hz: caps.max_rit_hz,
            max_xit_hz: caps.max_xit_hz,
            max_if_shift_hz: caps.max_if_shift_hz,
            announces: caps.announces,
            preamps: caps.preamps.clone(),
            attenuators: caps.attenuators.clone(),
            has_get_func: caps.has_get_func,
            has_set_func: caps.has_set_func,
            has_get_level: caps.has_get_level,
            has_set_level: caps.has_set_level,
            has_get_parm: caps.has_get_parm,
            has_set_parm: caps.has_set_parm,
            vfo_ops: caps.vfo_ops,
            ptt_type,
            targetable_vfo: caps.targetable_vfo,
            has_set_vfo: caps.supports(Op::SetVfo),
            has_get_vfo: caps.supports(Op::GetVfo),
            has_set_freq: caps.supports(Op::SetFreq),
            has_get_freq: caps.supports(Op::GetFreq),
            has_set_ptt: caps.supports(Op::SetPtt),
            has_get_ptt: caps.supports(Op::GetPtt),
            has_set_split: caps.supports(Op::SetSplitVfo),
            ctcss_tones: caps.ctcss_tones.clone(),
            dcs_codes: caps.dcs_codes.clone(),
            agc_levels: caps.agc_levels.clone(),
            timeout_ms: caps.timeout_ms,
        }
    }

    /// Render the dump as protocol lines (each `\n`-terminated).
    pub fn encode(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(out, "{}", self.protocol_ver);
        let _ = writeln!(out, "{}", self.model_id);
        let _ = writeln!(out, "{}", self.itu_region);

        for r in &self.rx_ranges {
            let _ = writeln!(
                out,
                "{} {} 0x{:x} {} {} 0x{:x} 0x{:x}",
                r.start_hz, r.end_hz, r.modes, r.low_power_mw, r.high_power_mw, r.vfos, r.antennas
            );
        }
        let _ = writeln!(out, "0 0 0 0 0 0 0");
        for r in &self.tx_ranges {
            let _ = writeln!(
                out,
                "{} {} 0x{:x} {} {} 0x{:x} 0x{:x}",
                r.start_hz, r.end_hz, r.modes, r.low_power_mw, r.high_power_mw, r.vfos, r.antennas
            );
        }
        let _ = writeln!(out, "0 0 0 0 0 0 0");

        for t in &self.tuning_steps {
            let _ = writeln!(out, "0x{:x} {}", t.modes, t.step_hz);
        }
        let _ = writeln!(out, "0 0");
        for f in &self.filters {
            let _ = writeln!(out, "0x{:x} {}", f.modes, f.width_hz);
        }
        let _ = writeln!(out, "0 0");

        let _ = writeln!(out, "{}", self.max_rit_hz);
        let _ = writeln!(out, "{}", self.max_xit_hz);
        let _ = writeln!(out, "{}", self.max_if_shift_hz);
        let _ = writeln!(out, "{}", self.announces);

        let preamps: Vec<String> = self.preamps.iter().map(|p| p.to_string()).collect();
        let _ = writeln!(out, "{}", preamps.join(" "));
        let attens: Vec<String> = self.attenuators.iter().map(|a| a.to_string()).collect();
        let _ = writeln!(out, "{}", attens.join(" "));

        let _ = writeln!(out, "0x{:x}", self.has_get_func);
        let _ = writeln!(out, "0x{:x}", self.has_set_func);
        let _ = writeln!(out, "0x{:x}", self.has_get_level);
        let _ = writeln!(out, "0x{:x}", self.has_set_level);
        let _ = writeln!(out, "0x{:x}", self.has_get_parm);
        let _ = writeln!(out, "0x{:x}", self.has_set_parm);

        if self.protocol_ver >= 1 {
            let _ = writeln!(out, "vfo_ops=0x{:x}", self.vfo_ops);
            let _ = writeln!(out, "ptt_type={}", self.ptt_type);
            let _ = writeln!(out, "targetable_vfo=0x{:x}", self.targetable_vfo);
            let _ = writeln!(out, "has_set_vfo={}", self.has_set_vfo as u8);
            let _ = writeln!(out, "has_get_vfo={}", self.has_get_vfo as u8);
            let _ = writeln!(out, "has_set_freq={}", self.has_set_freq as u8);
            let _ = writeln!(out, "has_get_freq={}", self.has_get_freq as u8);
            let _ = writeln!(out, "has_set_ptt={}", self.has_set_ptt as u8);
            let _ = writeln!(out, "has_get_ptt={}", self.has_get_ptt as u8);
            let _ = writeln!(out, "has_set_split={}", self.has_set_split as u8);
            if !self.ctcss_tones.is_empty() {
                let tones: Vec<String> =
                    self.ctcss_tones.iter().map(|t| t.to_string()).collect();
                let _ = writeln!(out, "ctcss_list={}", tones.join(" "));
            }
            if !self.dcs_codes.is_empty() {
                let codes: Vec<String> =
                    self.dcs_codes.iter().map(|c| c.to_string()).collect();
                let _ = writeln!(out, "dcs_list={}", codes.join(" "));
            }
            if !self.agc_levels.is_empty() {
                let agcs: Vec<String> = self
                    .agc_levels
                    .iter()
                    .map(|a| format!("{}={}", a.code(), a))
                    .collect();
                let _ = writeln!(out, "agc_levels={}", agcs.join(" "));
            }
            let _ = writeln!(out, "timeout={}", self.timeout_ms);
            let _ = writeln!(out, "{EXT_DONE}");
        }

        out
    }

    /// Reconstruct an effective capability table from a negotiated dump.
    ///
    /// Operations a version >= 1 server reported absent are left out of
    /// the mask so the client can refuse them locally without network
    /// traffic. Operations the dump cannot describe (memory, antenna,
    /// keying, power state, conversions, lock) are assumed present --
    /// they relay and fail remotely if unsupported.
    pub fn to_caps(&self) -> RigCaps {
        let mut ops = OpMask::from_ops(&[
            Op::SetMode,
            Op::GetMode,
            Op::GetDcd,
            Op::SetMem,
            Op::GetMem,
            Op::SetAnt,
            Op::GetAnt,
            Op::SendDtmf,
            Op::SendMorse,
            Op::SetPowerStat,
            Op::GetPowerStat,
            Op::Power2Mw,
            Op::Mw2Power,
            Op::SetLockMode,
            Op::GetLockMode,
        ]);

        if self.has_set_freq {
            ops = ops.with(Op::SetFreq);
        }
        if self.has_get_freq {
            ops = ops.with(Op::GetFreq);
        }
        if self.has_set_vfo {
            ops = ops.with(Op::SetVfo);
        }
        if self.has_get_vfo {
            ops = ops.with(Op::GetVfo);
        }
        if self.has_set_ptt {
            ops = ops.with(Op::SetPtt);
        }
        if self.has_get_ptt {
            ops = ops.with(Op::GetPtt);
        }
        if self.has_set_split {
            ops = ops
                .with(Op::SetSplitVfo)
                .with(Op::GetSplitVfo)
                .with(Op::SetSplitFreq)
                .with(Op::GetSplitFreq)
                .with(Op::SetSplitMode)
                .with(Op::GetSplitMode);
        }
        if self.has_set_level != 0 {
            ops = ops.with(Op::SetLevel);
        }
        if self.has_get_level != 0 {
            ops = ops.with(Op::GetLevel);
        }
        if self.has_set_func != 0 {
            ops = ops.with(Op::SetFunc);
        }
        if self.has_get_func != 0 {
            ops = ops.with(Op::GetFunc);
        }
        if self.has_set_parm != 0 {
            ops = ops.with(Op::SetParm);
        }
        if self.has_get_parm != 0 {
            ops = ops.with(Op::GetParm);
        }
        if self.max_rit_hz > 0 {
            ops = ops.with(Op::SetRit).with(Op::GetRit);
        }
        if self.max_xit_hz > 0 {
            ops = ops.with(Op::SetXit).with(Op::GetXit);
        }
        if !self.tuning_steps.is_empty() {
            ops = ops.with(Op::SetTuningStep).with(Op::GetTuningStep);
        }
        if !self.ctcss_tones.is_empty() {
            ops = ops.with(Op::SetCtcss).with(Op::GetCtcss);
        }
        if !self.dcs_codes.is_empty() {
            ops = ops.with(Op::SetDcs).with(Op::GetDcs);
        }
        if self.vfo_ops != 0 {
            ops = ops.with(Op::VfoOp);
        }

        RigCaps {
            model_id: self.model_id,
            model_name: "Network rig",
            mfg_name: "rigkit",
            itu_region: self.itu_region,
            rx_ranges: self.rx_ranges.clone(),
            tx_ranges: self.tx_ranges.clone(),
            tuning_steps: self.tuning_steps.clone(),
            filters: self.filters.clone(),
            max_rit_hz: self.max_rit_hz,
            max_xit_hz: self.max_xit_hz,
            max_if_shift_hz: self.max_if_shift_hz,
            announces: self.announces,
            preamps: self.preamps.clone(),
            attenuators: self.attenuators.clone(),
            ctcss_tones: self.ctcss_tones.clone(),
            dcs_codes: self.dcs_codes.clone(),
            agc_levels: self.agc_levels.clone(),
            has_get_func: self.has_get_func,
            has_set_func: self.has_set_func,
            has_get_level: self.has_get_level,
            has_set_level: self.has_set_level,
            has_get_parm: self.has_get_parm,
            has_set_parm: self.has_set_parm,
            vfo_ops: self.vfo_ops,
            targetable_vfo: self.targetable_vfo,
            antenna_count: 4,
            memory_channels: 0,
            timeout_ms: if self.timeout_ms > 0 { self.timeout_ms } else { 500 },
            ops,
            ..RigCaps::default()
        }
    }
}

/// Parser section ordering for the fixed part of the dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    ProtocolVer,
    ModelId,
    ItuRegion,
    RxRanges,
    TxRanges,
    TuningSteps,
    Filters,
    MaxRit,
    MaxXit,
    MaxIfShift,
    Announces,
    Preamps,
    Attenuators,
    GetFunc,
    SetFunc,
    GetLevel,
    SetLevel,
    GetParm,
    SetParm,
    Ext,
    Done,
}

/// Incremental `dump_state` parser.
///
/// Feed lines one at a time; [`feed`](DumpStateParser::feed) returns
/// `true` once the dump is complete. A version-0 dump completes at the
/// last fixed-order line and never consumes extension lines; a
/// version >= 1 dump completes at `done`.
#[derive(Debug)]
pub struct DumpStateParser {
    section: Section,
    dump: StateDump,
}

impl Default for DumpStateParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DumpStateParser {
    /// Create a parser awaiting the protocol version line.
    pub fn new() -> Self {
        DumpStateParser {
            section: Section::ProtocolVer,
            dump: StateDump::default(),
        }
    }

    /// Whether the dump is complete.
    pub fn is_complete(&self) -> bool {
        self.section == Section::Done
    }

    /// Consume the parser, returning the dump.
    pub fn finish(self) -> Result<StateDump> {
        if self.section != Section::Done {
            return Err(Error::Protocol(format!(
                "dump_state truncated in section {:?}",
                self.section
            )));
        }
        Ok(self.dump)
    }

    fn parse_range(line: &str) -> Result<Option<FreqRange>> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 7 {
            return Err(Error::Protocol(format!("bad range line: {line:?}")));
        }
        if fields.iter().all(|f| *f == "0") {
            return Ok(None); // sentinel
        }
        Ok(Some(FreqRange {
            start_hz: parse_u64(fields[0])?,
            end_hz: parse_u64(fields[1])?,
            modes: parse_hex_u64(fields[2])?,
            low_power_mw: parse_i32(fields[3])? as i64,
            high_power_mw: parse_i32(fields[4])? as i64,
            vfos: parse_hex_u64(fields[5])? as u32,
            antennas: parse_hex_u64(fields[6])? as u32,
        }))
    }

    /// `0xmodes value` pair lines (tuning steps and filters); `0 0` is
    /// the sentinel.
    fn parse_pair(line: &str) -> Result<Option<(u64, u64)>> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(Error::Protocol(format!("bad pair line: {line:?}")));
        }
        if fields[0] == "0" && fields[1] == "0" {
            return Ok(None);
        }
        Ok(Some((parse_hex_u64(fields[0])?, parse_u64(fields[1])?)))
    }

    fn parse_db_list(line: &str) -> Result<Vec<u8>> {
        line.split_whitespace()
            .map(|f| {
                f.parse::<u8>()
                    .map_err(|_| Error::Protocol(format!("bad dB list entry: {f:?}")))
            })
            .collect()
    }

    fn apply_ext(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "vfo_ops" => self.dump.vfo_ops = parse_hex_u64(value)? as u32,
            "ptt_type" => {
                // Unknown PTT tokens are tolerated like unknown keys.
                if let Ok(t) = value.parse::<PttType>() {
                    self.dump.ptt_type = t;
                }
            }
            "targetable_vfo" => self.dump.targetable_vfo = parse_hex_u64(value)? as u32,
            "has_set_vfo" => self.dump.has_set_vfo = value.trim() != "0",
            "has_get_vfo" => self.dump.has_get_vfo = value.trim() != "0",
            "has_set_freq" => self.dump.has_set_freq = value.trim() != "0",
            "has_get_freq" => self.dump.has_get_freq = value.trim() != "0",
            "has_set_ptt" => self.dump.has_set_ptt = value.trim() != "0",
            "has_get_ptt" => self.dump.has_get_ptt = value.trim() != "0",
            "has_set_split" => self.dump.has_set_split = value.trim() != "0",
            "ctcss_list" => {
                self.dump.ctcss_tones = value
                    .split_whitespace()
                    .map(parse_u32)
                    .collect::<Result<Vec<_>>>()?;
            }
            "dcs_list" => {
                self.dump.dcs_codes = value
                    .split_whitespace()
                    .map(parse_u32)
                    .collect::<Result<Vec<_>>>()?;
            }
            "agc_levels" => {
                let mut levels = Vec::new();
                for entry in value.split_whitespace() {
                    let code = entry.split('=').next().unwrap_or(entry);
                    if let Some(agc) = code
                        .parse::<u8>()
                        .ok()
                        .and_then(AgcLevel::from_code)
                    {
                        levels.push(agc);
                    }
                }
                self.dump.agc_levels = levels;
            }
            "timeout" => self.dump.timeout_ms = parse_u64(value)?,
            unknown => {
                // Forward-compatible: newer servers send keys we have
                // never heard of.
                tracing::debug!(key = unknown, "ignoring unknown dump_state key");
            }
        }
        Ok(())
    }

    /// Feed one line (without its terminator). Returns `true` when the
    /// dump is complete.
    pub fn feed(&mut self, line: &str) -> Result<bool> {
        match self.section {
            Section::ProtocolVer => {
                self.dump.protocol_ver = parse_u32(line)?;
                self.section = Section::ModelId;
            }
            Section::ModelId => {
                self.dump.model_id = parse_u32(line)?;
                self.section = Section::ItuRegion;
            }
            Section::ItuRegion => {
                let region = parse_u32(line)?;
                self.dump.itu_region = u8::try_from(region)
                    .map_err(|_| Error::Protocol(format!("bad ITU region: {region}")))?;
                self.section = Section::RxRanges;
            }
            Section::RxRanges => match Self::parse_range(line)? {
                Some(range) => self.dump.rx_ranges.push(range),
                None => self.section = Section::TxRanges,
            },
            Section::TxRanges => match Self::parse_range(line)? {
                Some(range) => self.dump.tx_ranges.push(range),
                None => self.section = Section::TuningSteps,
            },
            Section::TuningSteps => match Self::parse_pair(line)? {
                Some((modes, step_hz)) => {
                    self.dump.tuning_steps.push(TuningStep { modes, step_hz })
                }
                None => self.section = Section::Filters,
            },
            Section::Filters => match Self::parse_pair(line)? {
                Some((modes, width_hz)) => {
                    self.dump.filters.push(FilterEntry { modes, width_hz })
                }
                None => self.section = Section::MaxRit,
            },
            Section::MaxRit => {
                self.dump.max_rit_hz = parse_i32(line)?;
                self.section = Section::MaxXit;
            }
            Section::MaxXit => {
                self.dump.max_xit_hz = parse_i32(line)?;
                self.section = Section::MaxIfShift;
            }
            Section::MaxIfShift => {
                self.dump.max_if_shift_hz = parse_i32(line)?;
                self.section = Section::Announces;
            }
            Section::Announces => {
                self.dump.announces = parse_u32(line)?;
                self.section = Section::Preamps;
            }
            Section::Preamps => {
                self.dump.preamps = Self::parse_db_list(line)?;
                self.section = Section::Attenuators;
            }
            Section::Attenuators => {
                self.dump.attenuators = Self::parse_db_list(line)?;
                self.section = Section::GetFunc;
            }
            Section::GetFunc => {
                self.dump.has_get_func = parse_hex_u64(line)?;
                self.section = Section::SetFunc;
            }
            Section::SetFunc => {
                self.dump.has_set_func = parse_hex_u64(line)?;
                self.section = Section::GetLevel;
            }
            Section::GetLevel => {
                self.dump.has_get_level = parse_hex_u64(line)?;
                self.section = Section::SetLevel;
            }
            Section::SetLevel => {
                self.dump.has_set_level = parse_hex_u64(line)?;
                self.section = Section::GetParm;
            }
            Section::GetParm => {
                self.dump.has_get_parm = parse_hex_u64(line)?;
                self.section = Section::SetParm;
            }
            Section::SetParm => {
                self.dump.has_set_parm = parse_hex_u64(line)?;
                // A version-0 dump ends here; newer versions continue
                // with key=value lines until `done`.
                self.section = if self.dump.protocol_ver >= 1 {
                    Section::Ext
                } else {
                    Section::Done
                };
            }
            Section::Ext => {
                let trimmed = line.trim();
                if trimmed == EXT_DONE {
                    self.section = Section::Done;
                } else if let Some((key, value)) = trimmed.split_once('=') {
                    self.apply_ext(key, value)?;
                } else if !trimmed.is_empty() {
                    tracing::debug!(line = trimmed, "ignoring malformed dump_state line");
                }
            }
            Section::Done => {
                return Err(Error::Protocol("dump_state already complete".into()))
            }
        }
        Ok(self.section == Section::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigkit_core::types::{Mode, Vfo, VfoOp, ALL_MODES};

    fn sample_caps() -> RigCaps {
        RigCaps {
            model_id: 1,
            model_name: "Simulator",
            mfg_name: "rigkit",
            itu_region: 2,
            rx_ranges: vec![FreqRange {
                start_hz: 100_000,
                end_hz: 30_000_000,
                modes: Mode::mask(ALL_MODES),
                low_power_mw: -1,
                high_power_mw: -1,
                vfos: Vfo::A.bit() | Vfo::B.bit(),
                antennas: 0x3,
            }],
            tx_ranges: vec![FreqRange {
                start_hz: 1_800_000,
                end_hz: 29_700_000,
                modes: Mode::mask(ALL_MODES),
                low_power_mw: 1_000,
                high_power_mw: 100_000,
                vfos: Vfo::A.bit() | Vfo::B.bit(),
                antennas: 0x3,
            }],
            tuning_steps: vec![TuningStep {
                modes: Mode::mask(ALL_MODES),
                step_hz: 10,
            }],
            filters: vec![
                FilterEntry {
                    modes: Mode::CW.bit(),
                    width_hz: 500,
                },
                FilterEntry {
                    modes: Mode::USB.bit() | Mode::LSB.bit(),
                    width_hz: 2400,
                },
            ],
            max_rit_hz: 9999,
            max_xit_hz: 9999,
            max_if_shift_hz: 1200,
            preamps: vec![10, 20],
            attenuators: vec![6, 12, 18],
            ctcss_tones: vec![670, 885, 1000],
            dcs_codes: vec![23, 25, 26],
            agc_levels: vec![AgcLevel::Off, AgcLevel::Fast, AgcLevel::Slow],
            has_get_level: 0x7fff,
            has_set_level: 0x0fff,
            has_get_func: 0xfff,
            has_set_func: 0xfff,
            vfo_ops: VfoOp::mask(&[VfoOp::Copy, VfoOp::Exchange]),
            targetable_vfo: Vfo::A.bit() | Vfo::B.bit(),
            timeout_ms: 500,
            ops: OpMask::from_ops(&[
                Op::SetFreq,
                Op::GetFreq,
                Op::SetVfo,
                Op::GetVfo,
                Op::SetPtt,
                Op::GetPtt,
                Op::SetSplitVfo,
            ]),
            ..RigCaps::default()
        }
    }

    fn parse_all(text: &str) -> DumpStateParser {
        let mut parser = DumpStateParser::new();
        for line in text.lines() {
            if parser.is_complete() {
                break;
            }
            parser.feed(line).unwrap();
        }
        parser
    }

    #[test]
    fn v1_encode_parse_round_trip() {
        let dump = StateDump::from_caps(&sample_caps(), 1, PttType::Rig);
        let text = dump.encode();

        let parser = parse_all(&text);
        assert!(parser.is_complete());
        let parsed = parser.finish().unwrap();

        assert_eq!(parsed.protocol_ver, 1);
        assert_eq!(parsed.model_id, 1);
        assert_eq!(parsed.itu_region, 2);
        assert_eq!(parsed.rx_ranges, dump.rx_ranges);
        assert_eq!(parsed.tx_ranges, dump.tx_ranges);
        assert_eq!(parsed.tuning_steps, dump.tuning_steps);
        assert_eq!(parsed.filters, dump.filters);
        assert_eq!(parsed.max_rit_hz, 9999);
        assert_eq!(parsed.preamps, vec![10, 20]);
        assert_eq!(parsed.attenuators, vec![6, 12, 18]);
        assert_eq!(parsed.has_get_level, 0x7fff);
        assert_eq!(parsed.has_set_level, 0x0fff);
        assert_eq!(parsed.vfo_ops, dump.vfo_ops);
        assert_eq!(parsed.ctcss_tones, vec![670, 885, 1000]);
        assert_eq!(parsed.dcs_codes, vec![23, 25, 26]);
        assert_eq!(
            parsed.agc_levels,
            vec![AgcLevel::Off, AgcLevel::Fast, AgcLevel::Slow]
        );
        assert_eq!(parsed.timeout_ms, 500);
        assert!(parsed.has_set_freq);
        assert!(parsed.has_set_split);
    }

    #[test]
    fn v0_dump_stops_before_extensions() {
        let dump = StateDump::from_caps(&sample_caps(), 0, PttType::Rig);
        let text = dump.encode();
        assert!(!text.contains("done"), "v0 dump carries no extension lines");

        let mut parser = DumpStateParser::new();
        let mut complete_at = None;
        for (i, line) in text.lines().enumerate() {
            if parser.feed(line).unwrap() {
                complete_at = Some(i);
                break;
            }
        }
        // Completes exactly at the last fixed-order line.
        assert_eq!(complete_at, Some(text.lines().count() - 1));

        let parsed = parser.finish().unwrap();
        // v0 cannot report feature absence; the defaults assume presence.
        assert!(parsed.has_set_vfo);
        assert!(parsed.has_set_ptt);
        assert!(parsed.ctcss_tones.is_empty());
    }

    #[test]
    fn v1_ignores_unknown_keys() {
        let dump = StateDump::from_caps(&sample_caps(), 1, PttType::Rig);
        let mut text = dump.encode();
        // Splice unknown keys ahead of the terminator.
        text = text.replace("done\n", "snazzy_new_feature=42\nrit_steps=1 5 10\ndone\n");

        let parser = parse_all(&text);
        assert!(parser.is_complete());
        let parsed = parser.finish().unwrap();
        assert_eq!(parsed.timeout_ms, 500, "known keys still applied");
    }

    #[test]
    fn truncated_dump_is_an_error() {
        let dump = StateDump::from_caps(&sample_caps(), 1, PttType::Rig);
        let text = dump.encode();
        let mut parser = DumpStateParser::new();
        for line in text.lines().take(5) {
            parser.feed(line).unwrap();
        }
        assert!(!parser.is_complete());
        assert!(parser.finish().is_err());
    }

    #[test]
    fn empty_db_lists_parse() {
        let caps = RigCaps {
            model_id: 3,
            ..RigCaps::default()
        };
        let dump = StateDump::from_caps(&caps, 0, PttType::Rig);
        let text = dump.encode();
        let parser = parse_all(&text);
        let parsed = parser.finish().unwrap();
        assert!(parsed.preamps.is_empty());
        assert!(parsed.attenuators.is_empty());
    }

    #[test]
    fn to_caps_gates_reported_absences() {
        let mut dump = StateDump::from_caps(&sample_caps(), 1, PttType::Rig);
        dump.has_set_vfo = false;
        dump.has_set_split = false;

        let caps = dump.to_caps();
        assert!(!caps.supports(Op::SetVfo));
        assert!(!caps.supports(Op::SetSplitVfo));
        assert!(!caps.supports(Op::GetSplitFreq));
        assert!(caps.supports(Op::SetFreq));
        assert!(caps.supports(Op::SetLevel));
        assert!(caps.supports(Op::SetRit), "max_rit > 0 implies RIT");
        assert!(caps.supports(Op::VfoOp));
        assert!(caps.supports(Op::SetCtcss));
    }

    #[test]
    fn bad_range_line_is_protocol_error() {
        let mut parser = DumpStateParser::new();
        parser.feed("1").unwrap();
        parser.feed("2").unwrap();
        parser.feed("2").unwrap();
        let r = parser.feed("not a range");
        assert!(matches!(r, Err(Error::Protocol(_))));
    }
}
