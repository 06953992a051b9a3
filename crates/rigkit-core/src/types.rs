//! Core types used throughout rigkit.
//!
//! These types provide a model-agnostic vocabulary shared by the dispatch
//! core, the transports, the wire protocol and the backends: VFO selectors,
//! operating modes, level/function/parameter settings and their bitmask
//! encodings, frequency ranges, and port configuration.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A VFO selector.
///
/// Concrete selectors name a real tuning channel on the radio; logical
/// selectors (`Current`, `Rx`, `Tx`) are resolved against runtime state by
/// the dispatch layer before a backend ever sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vfo {
    /// VFO A.
    A,
    /// VFO B.
    B,
    /// Main receiver (dual-watch rigs).
    Main,
    /// Sub receiver (dual-watch rigs).
    Sub,
    /// Memory channel mode.
    Mem,
    /// Whatever VFO the rig currently has selected (logical).
    Current,
    /// The configured receive VFO (logical).
    Rx,
    /// The configured transmit VFO (logical).
    Tx,
}

impl Vfo {
    /// Whether this selector is logical and must be resolved before
    /// reaching a backend.
    pub fn is_logical(&self) -> bool {
        matches!(self, Vfo::Current | Vfo::Rx | Vfo::Tx)
    }

    /// Bit position used in capability masks (`targetable_vfo`, range
    /// `vfos` fields). Logical selectors have no bit.
    pub fn bit(&self) -> u32 {
        match self {
            Vfo::A => 1 << 0,
            Vfo::B => 1 << 1,
            Vfo::Main => 1 << 2,
            Vfo::Sub => 1 << 3,
            Vfo::Mem => 1 << 4,
            Vfo::Current | Vfo::Rx | Vfo::Tx => 0,
        }
    }
}

impl fmt::Display for Vfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Vfo::A => "VFOA",
            Vfo::B => "VFOB",
            Vfo::Main => "Main",
            Vfo::Sub => "Sub",
            Vfo::Mem => "MEM",
            Vfo::Current => "currVFO",
            Vfo::Rx => "RX",
            Vfo::Tx => "TX",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Vfo {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "VFOA" | "A" => Ok(Vfo::A),
            "VFOB" | "B" => Ok(Vfo::B),
            "MAIN" => Ok(Vfo::Main),
            "SUB" => Ok(Vfo::Sub),
            "MEM" => Ok(Vfo::Mem),
            "CURRVFO" | "CURR" => Ok(Vfo::Current),
            "RX" => Ok(Vfo::Rx),
            "TX" => Ok(Vfo::Tx),
            _ => Err(Error::InvalidArgument(format!("unknown VFO: {s}"))),
        }
    }
}

/// Operating mode of the transceiver.
///
/// Covers standard analog modes plus data sub-modes used by digital
/// software (WSJT-X, fldigi, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Upper sideband voice.
    USB,
    /// Lower sideband voice.
    LSB,
    /// CW (morse), typically with upper sideband offset.
    CW,
    /// CW reverse (lower sideband offset).
    CWR,
    /// Amplitude modulation.
    AM,
    /// Frequency modulation.
    FM,
    /// Radio teletype (FSK), upper sideband.
    RTTY,
    /// Radio teletype (FSK), reverse / lower sideband.
    RTTYR,
    /// Data mode using upper sideband (AFSK, sound-card digital).
    DataUSB,
    /// Data mode using lower sideband.
    DataLSB,
    /// Data mode using FM.
    DataFM,
    /// Data mode using AM.
    DataAM,
}

/// All modes, in mask-bit order.
pub const ALL_MODES: &[Mode] = &[
    Mode::USB,
    Mode::LSB,
    Mode::CW,
    Mode::CWR,
    Mode::AM,
    Mode::FM,
    Mode::RTTY,
    Mode::RTTYR,
    Mode::DataUSB,
    Mode::DataLSB,
    Mode::DataFM,
    Mode::DataAM,
];

impl Mode {
    /// Bit position used in mode masks (frequency ranges, tuning steps,
    /// filter tables, `dump_state` lines).
    pub fn bit(&self) -> u64 {
        match self {
            Mode::USB => 1 << 0,
            Mode::LSB => 1 << 1,
            Mode::CW => 1 << 2,
            Mode::CWR => 1 << 3,
            Mode::AM => 1 << 4,
            Mode::FM => 1 << 5,
            Mode::RTTY => 1 << 6,
            Mode::RTTYR => 1 << 7,
            Mode::DataUSB => 1 << 8,
            Mode::DataLSB => 1 << 9,
            Mode::DataFM => 1 << 10,
            Mode::DataAM => 1 << 11,
        }
    }

    /// Build a mask covering all of `modes`.
    pub fn mask(modes: &[Mode]) -> u64 {
        modes.iter().fold(0, |m, mode| m | mode.bit())
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::USB => "USB",
            Mode::LSB => "LSB",
            Mode::CW => "CW",
            Mode::CWR => "CWR",
            Mode::AM => "AM",
            Mode::FM => "FM",
            Mode::RTTY => "RTTY",
            Mode::RTTYR => "RTTYR",
            Mode::DataUSB => "PKTUSB",
            Mode::DataLSB => "PKTLSB",
            Mode::DataFM => "PKTFM",
            Mode::DataAM => "PKTAM",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USB" => Ok(Mode::USB),
            "LSB" => Ok(Mode::LSB),
            "CW" => Ok(Mode::CW),
            "CWR" => Ok(Mode::CWR),
            "AM" => Ok(Mode::AM),
            "FM" => Ok(Mode::FM),
            "RTTY" => Ok(Mode::RTTY),
            "RTTYR" => Ok(Mode::RTTYR),
            "PKTUSB" | "DATA-USB" => Ok(Mode::DataUSB),
            "PKTLSB" | "DATA-LSB" => Ok(Mode::DataLSB),
            "PKTFM" | "DATA-FM" => Ok(Mode::DataFM),
            "PKTAM" | "DATA-AM" => Ok(Mode::DataAM),
            _ => Err(Error::InvalidArgument(format!("unknown mode: {s}"))),
        }
    }
}

/// An adjustable level setting.
///
/// Float levels carry a normalized 0.0–1.0 value on the wire; integer
/// levels carry whole numbers (dB, WPM, Hz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Preamp gain in dB.
    Preamp,
    /// Attenuator in dB.
    Att,
    /// AF (audio) gain, 0.0–1.0.
    Af,
    /// RF gain, 0.0–1.0.
    Rf,
    /// Squelch level, 0.0–1.0.
    Sql,
    /// CW sidetone pitch in Hz.
    CwPitch,
    /// Transmit power, 0.0–1.0 of maximum.
    RfPower,
    /// Microphone gain, 0.0–1.0.
    MicGain,
    /// Keyer speed in WPM.
    KeySpeed,
    /// Speech compressor level, 0.0–1.0.
    Comp,
    /// AGC setting (encoded [`AgcLevel`] code).
    Agc,
    /// VOX gain, 0.0–1.0.
    VoxGain,
    /// SWR reading (read-only on real rigs).
    Swr,
    /// ALC reading (read-only on real rigs).
    Alc,
    /// Signal strength in dB relative to S9.
    Strength,
}

/// All levels, in mask-bit order.
pub const ALL_LEVELS: &[Level] = &[
    Level::Preamp,
    Level::Att,
    Level::Af,
    Level::Rf,
    Level::Sql,
    Level::CwPitch,
    Level::RfPower,
    Level::MicGain,
    Level::KeySpeed,
    Level::Comp,
    Level::Agc,
    Level::VoxGain,
    Level::Swr,
    Level::Alc,
    Level::Strength,
];

impl Level {
    /// Bit position used in the capability get/set level masks.
    pub fn bit(&self) -> u64 {
        match self {
            Level::Preamp => 1 << 0,
            Level::Att => 1 << 1,
            Level::Af => 1 << 2,
            Level::Rf => 1 << 3,
            Level::Sql => 1 << 4,
            Level::CwPitch => 1 << 5,
            Level::RfPower => 1 << 6,
            Level::MicGain => 1 << 7,
            Level::KeySpeed => 1 << 8,
            Level::Comp => 1 << 9,
            Level::Agc => 1 << 10,
            Level::VoxGain => 1 << 11,
            Level::Swr => 1 << 12,
            Level::Alc => 1 << 13,
            Level::Strength => 1 << 14,
        }
    }

    /// Build a mask covering all of `levels`.
    pub fn mask(levels: &[Level]) -> u64 {
        levels.iter().fold(0, |m, l| m | l.bit())
    }

    /// Whether values for this level are normalized floats (0.0–1.0)
    /// rather than whole numbers.
    pub fn is_float(&self) -> bool {
        matches!(
            self,
            Level::Af
                | Level::Rf
                | Level::Sql
                | Level::RfPower
                | Level::MicGain
                | Level::Comp
                | Level::VoxGain
                | Level::Alc
        )
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Preamp => "PREAMP",
            Level::Att => "ATT",
            Level::Af => "AF",
            Level::Rf => "RF",
            Level::Sql => "SQL",
            Level::CwPitch => "CWPITCH",
            Level::RfPower => "RFPOWER",
            Level::MicGain => "MICGAIN",
            Level::KeySpeed => "KEYSPD",
            Level::Comp => "COMP",
            Level::Agc => "AGC",
            Level::VoxGain => "VOXGAIN",
            Level::Swr => "SWR",
            Level::Alc => "ALC",
            Level::Strength => "STRENGTH",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PREAMP" => Ok(Level::Preamp),
            "ATT" => Ok(Level::Att),
            "AF" => Ok(Level::Af),
            "RF" => Ok(Level::Rf),
            "SQL" => Ok(Level::Sql),
            "CWPITCH" => Ok(Level::CwPitch),
            "RFPOWER" => Ok(Level::RfPower),
            "MICGAIN" => Ok(Level::MicGain),
            "KEYSPD" => Ok(Level::KeySpeed),
            "COMP" => Ok(Level::Comp),
            "AGC" => Ok(Level::Agc),
            "VOXGAIN" => Ok(Level::VoxGain),
            "SWR" => Ok(Level::Swr),
            "ALC" => Ok(Level::Alc),
            "STRENGTH" => Ok(Level::Strength),
            _ => Err(Error::InvalidArgument(format!("unknown level: {s}"))),
        }
    }
}

/// A switchable function (on/off setting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Func {
    /// Fast AGC.
    Fagc,
    /// Noise blanker.
    Nb,
    /// Speech compressor.
    Comp,
    /// Voice-operated transmit.
    Vox,
    /// CTCSS tone on transmit.
    Tone,
    /// CTCSS tone squelch.
    Tsql,
    /// Automatic notch filter.
    Anf,
    /// Noise reduction.
    Nr,
    /// Transmit monitor.
    Mon,
    /// Front panel lock.
    Lock,
    /// Audio mute.
    Mute,
    /// Automatic antenna tuner.
    Tuner,
}

/// All functions, in mask-bit order.
pub const ALL_FUNCS: &[Func] = &[
    Func::Fagc,
    Func::Nb,
    Func::Comp,
    Func::Vox,
    Func::Tone,
    Func::Tsql,
    Func::Anf,
    Func::Nr,
    Func::Mon,
    Func::Lock,
    Func::Mute,
    Func::Tuner,
];

impl Func {
    /// Bit position used in the capability get/set function masks.
    pub fn bit(&self) -> u64 {
        match self {
            Func::Fagc => 1 << 0,
            Func::Nb => 1 << 1,
            Func::Comp => 1 << 2,
            Func::Vox => 1 << 3,
            Func::Tone => 1 << 4,
            Func::Tsql => 1 << 5,
            Func::Anf => 1 << 6,
            Func::Nr => 1 << 7,
            Func::Mon => 1 << 8,
            Func::Lock => 1 << 9,
            Func::Mute => 1 << 10,
            Func::Tuner => 1 << 11,
        }
    }

    /// Build a mask covering all of `funcs`.
    pub fn mask(funcs: &[Func]) -> u64 {
        funcs.iter().fold(0, |m, f| m | f.bit())
    }
}

impl fmt::Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Func::Fagc => "FAGC",
            Func::Nb => "NB",
            Func::Comp => "COMP",
            Func::Vox => "VOX",
            Func::Tone => "TONE",
            Func::Tsql => "TSQL",
            Func::Anf => "ANF",
            Func::Nr => "NR",
            Func::Mon => "MON",
            Func::Lock => "LOCK",
            Func::Mute => "MUTE",
            Func::Tuner => "TUNER",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Func {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FAGC" => Ok(Func::Fagc),
            "NB" => Ok(Func::Nb),
            "COMP" => Ok(Func::Comp),
            "VOX" => Ok(Func::Vox),
            "TONE" => Ok(Func::Tone),
            "TSQL" => Ok(Func::Tsql),
            "ANF" => Ok(Func::Anf),
            "NR" => Ok(Func::Nr),
            "MON" => Ok(Func::Mon),
            "LOCK" => Ok(Func::Lock),
            "MUTE" => Ok(Func::Mute),
            "TUNER" => Ok(Func::Tuner),
            _ => Err(Error::InvalidArgument(format!("unknown function: {s}"))),
        }
    }
}

/// A configuration parameter (rig-global, not per-VFO).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parm {
    /// Announce mode (speech synthesizer).
    Ann,
    /// Auto power-off timer in minutes.
    Apo,
    /// Display backlight brightness, 0.0–1.0.
    Backlight,
    /// Key beep on/off.
    Beep,
    /// Internal clock, seconds since midnight.
    Time,
    /// Battery level, 0.0–1.0.
    Bat,
    /// Key illumination on/off.
    KeyLight,
}

/// All parameters, in mask-bit order.
pub const ALL_PARMS: &[Parm] = &[
    Parm::Ann,
    Parm::Apo,
    Parm::Backlight,
    Parm::Beep,
    Parm::Time,
    Parm::Bat,
    Parm::KeyLight,
];

impl Parm {
    /// Bit position used in the capability get/set parameter masks.
    pub fn bit(&self) -> u64 {
        match self {
            Parm::Ann => 1 << 0,
            Parm::Apo => 1 << 1,
            Parm::Backlight => 1 << 2,
            Parm::Beep => 1 << 3,
            Parm::Time => 1 << 4,
            Parm::Bat => 1 << 5,
            Parm::KeyLight => 1 << 6,
        }
    }

    /// Build a mask covering all of `parms`.
    pub fn mask(parms: &[Parm]) -> u64 {
        parms.iter().fold(0, |m, p| m | p.bit())
    }
}

impl fmt::Display for Parm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Parm::Ann => "ANN",
            Parm::Apo => "APO",
            Parm::Backlight => "BACKLIGHT",
            Parm::Beep => "BEEP",
            Parm::Time => "TIME",
            Parm::Bat => "BAT",
            Parm::KeyLight => "KEYLIGHT",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Parm {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ANN" => Ok(Parm::Ann),
            "APO" => Ok(Parm::Apo),
            "BACKLIGHT" => Ok(Parm::Backlight),
            "BEEP" => Ok(Parm::Beep),
            "TIME" => Ok(Parm::Time),
            "BAT" => Ok(Parm::Bat),
            "KEYLIGHT" => Ok(Parm::KeyLight),
            _ => Err(Error::InvalidArgument(format!("unknown parameter: {s}"))),
        }
    }
}

/// AGC time constant, carried as the value of [`Level::Agc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgcLevel {
    /// AGC disabled.
    Off,
    /// Fast attack and release.
    Fast,
    /// Balanced for SSB voice.
    Medium,
    /// Long time constant.
    Slow,
    /// Rig-chosen automatic setting.
    Auto,
}

impl AgcLevel {
    /// Numeric code carried on the wire.
    pub fn code(&self) -> u8 {
        match self {
            AgcLevel::Off => 0,
            AgcLevel::Fast => 1,
            AgcLevel::Medium => 2,
            AgcLevel::Slow => 3,
            AgcLevel::Auto => 4,
        }
    }

    /// Decode a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(AgcLevel::Off),
            1 => Some(AgcLevel::Fast),
            2 => Some(AgcLevel::Medium),
            3 => Some(AgcLevel::Slow),
            4 => Some(AgcLevel::Auto),
            _ => None,
        }
    }
}

impl fmt::Display for AgcLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgcLevel::Off => "OFF",
            AgcLevel::Fast => "FAST",
            AgcLevel::Medium => "MEDIUM",
            AgcLevel::Slow => "SLOW",
            AgcLevel::Auto => "AUTO",
        };
        write!(f, "{s}")
    }
}

/// Power state of the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PowerStat {
    /// Powered off.
    Off,
    /// Powered on.
    #[default]
    On,
    /// Standby (receiver warm, transmitter inhibited).
    Standby,
}

impl PowerStat {
    /// Numeric code carried on the wire.
    pub fn code(&self) -> u8 {
        match self {
            PowerStat::Off => 0,
            PowerStat::On => 1,
            PowerStat::Standby => 2,
        }
    }

    /// Decode a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PowerStat::Off),
            1 => Some(PowerStat::On),
            2 => Some(PowerStat::Standby),
            _ => None,
        }
    }
}

/// A VFO memory/band operation with no value argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VfoOp {
    /// Copy the active VFO to the inactive one (A=B).
    Copy,
    /// Exchange VFO A and VFO B.
    Exchange,
    /// Step the VFO up by the current tuning step.
    Up,
    /// Step the VFO down by the current tuning step.
    Down,
    /// Toggle between VFO A and VFO B.
    Toggle,
}

impl VfoOp {
    /// Bit position used in the capability `vfo_ops` mask.
    pub fn bit(&self) -> u32 {
        match self {
            VfoOp::Copy => 1 << 0,
            VfoOp::Exchange => 1 << 1,
            VfoOp::Up => 1 << 2,
            VfoOp::Down => 1 << 3,
            VfoOp::Toggle => 1 << 4,
        }
    }

    /// Build a mask covering all of `ops`.
    pub fn mask(ops: &[VfoOp]) -> u32 {
        ops.iter().fold(0, |m, o| m | o.bit())
    }
}

impl fmt::Display for VfoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VfoOp::Copy => "CPY",
            VfoOp::Exchange => "XCHG",
            VfoOp::Up => "UP",
            VfoOp::Down => "DOWN",
            VfoOp::Toggle => "TOGGLE",
        };
        write!(f, "{s}")
    }
}

impl FromStr for VfoOp {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CPY" => Ok(VfoOp::Copy),
            "XCHG" => Ok(VfoOp::Exchange),
            "UP" => Ok(VfoOp::Up),
            "DOWN" => Ok(VfoOp::Down),
            "TOGGLE" => Ok(VfoOp::Toggle),
            _ => Err(Error::InvalidArgument(format!("unknown VFO op: {s}"))),
        }
    }
}

/// How PTT (push-to-talk) is keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PttType {
    /// Via the rig's own control protocol (default).
    #[default]
    Rig,
    /// Via the DTR line of a serial port.
    DtrSerial,
    /// Via the RTS line of a serial port.
    RtsSerial,
    /// PTT not available.
    None,
}

impl fmt::Display for PttType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PttType::Rig => "RIG",
            PttType::DtrSerial => "DTR",
            PttType::RtsSerial => "RTS",
            PttType::None => "NONE",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PttType {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RIG" => Ok(PttType::Rig),
            "DTR" => Ok(PttType::DtrSerial),
            "RTS" => Ok(PttType::RtsSerial),
            "NONE" => Ok(PttType::None),
            _ => Err(Error::InvalidArgument(format!("unknown PTT type: {s}"))),
        }
    }
}

/// How DCD (data carrier detect) is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DcdType {
    /// Via the rig's own control protocol (default).
    #[default]
    Rig,
    /// Via the CD line of a serial port.
    CdSerial,
    /// Via the CTS line of a serial port.
    CtsSerial,
    /// DCD not available.
    None,
}

/// A contiguous frequency range with the modes, VFOs and antennas usable
/// within it.
///
/// Power limits are in milliwatts; `-1` means "unspecified" on receive
/// ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreqRange {
    /// Lower bound in hertz (inclusive).
    pub start_hz: u64,
    /// Upper bound in hertz (inclusive).
    pub end_hz: u64,
    /// Mask of modes usable in this range ([`Mode::bit`]).
    pub modes: u64,
    /// Minimum transmit power in milliwatts, or -1.
    pub low_power_mw: i64,
    /// Maximum transmit power in milliwatts, or -1.
    pub high_power_mw: i64,
    /// Mask of VFOs usable in this range ([`Vfo::bit`]).
    pub vfos: u32,
    /// Mask of antenna ports usable in this range (bit N = ANT N+1).
    pub antennas: u32,
}

impl FreqRange {
    /// Check whether a frequency falls within this range (inclusive).
    pub fn contains(&self, freq_hz: u64) -> bool {
        freq_hz >= self.start_hz && freq_hz <= self.end_hz
    }
}

impl fmt::Display for FreqRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} Hz", self.start_hz, self.end_hz)
    }
}

/// A tuning step valid for a set of modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuningStep {
    /// Mask of modes this step applies to ([`Mode::bit`]).
    pub modes: u64,
    /// Step size in hertz.
    pub step_hz: u64,
}

/// A filter (passband width) valid for a set of modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterEntry {
    /// Mask of modes this filter applies to ([`Mode::bit`]).
    pub modes: u64,
    /// Passband width in hertz.
    pub width_hz: u64,
}

/// Port and timing configuration for a device handle.
///
/// `pathname` is a serial device path for hardware backends, or a
/// `host:port` string for network backends. Timing fields default from
/// the model's capability table and can be overridden per handle.
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Device path or `host:port`.
    pub pathname: String,
    /// Serial baud rate, where applicable.
    pub baud_rate: u32,
    /// Response timeout per exchange, in milliseconds.
    pub timeout_ms: u64,
    /// Retry count applied on timeout (not on I/O errors).
    pub retries: u32,
    /// Inter-chunk write pacing in milliseconds (0 = none).
    pub write_delay_ms: u64,
    /// Delay after each complete command write, in milliseconds.
    pub post_write_delay_ms: u64,
    /// How PTT is keyed.
    pub ptt_type: PttType,
    /// Separate PTT port path, when PTT uses a serial control line.
    pub ptt_pathname: Option<String>,
    /// How DCD is read.
    pub dcd_type: DcdType,
    /// Separate DCD port path, when DCD uses a serial control line.
    pub dcd_pathname: Option<String>,
    /// Free-form backend configuration overrides (`key=value` pairs from
    /// the command line).
    pub params: std::collections::HashMap<String, String>,
}

impl Default for PortConfig {
    fn default() -> Self {
        PortConfig {
            pathname: String::new(),
            baud_rate: 0,
            timeout_ms: 500,
            retries: 3,
            write_delay_ms: 0,
            post_write_delay_ms: 0,
            ptt_type: PttType::Rig,
            ptt_pathname: None,
            dcd_type: DcdType::Rig,
            dcd_pathname: None,
            params: std::collections::HashMap::new(),
        }
    }
}
