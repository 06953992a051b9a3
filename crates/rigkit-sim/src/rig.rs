//! The simulated rig backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use rigkit_core::backend::Backend;
use rigkit_core::caps::{Op, OpMask, RigCaps};
use rigkit_core::error::{Error, Result};
use rigkit_core::helpers::{mw2power_linear, power2mw_linear};
use rigkit_core::types::{
    AgcLevel, FilterEntry, FreqRange, Func, Level, Mode, Parm, PowerStat, TuningStep, Vfo, VfoOp,
    ALL_FUNCS, ALL_LEVELS, ALL_MODES, ALL_PARMS,
};

/// The registry model id of the simulator.
pub const SIM_MODEL_ID: u32 = 1;

/// Standard CTCSS tones in tenths of hertz (a representative subset).
const CTCSS_TONES: &[u32] = &[
    670, 693, 719, 744, 770, 797, 825, 854, 885, 915, 948, 974, 1000, 1035, 1072, 1109, 1148,
    1188, 1230, 1273, 1318, 1365, 1413, 1462, 1514, 1567, 1622, 1679, 1738, 1799, 1862, 1928,
    2035, 2107, 2181, 2257, 2336, 2418, 2503,
];

/// Standard DCS codes (a representative subset).
const DCS_CODES: &[u32] = &[
    23, 25, 26, 31, 32, 36, 43, 47, 51, 53, 54, 65, 71, 72, 73, 74, 114, 115, 116, 122, 125,
    131, 132, 134, 143, 145, 152, 155, 156, 162, 165, 172, 174, 205, 212, 223, 225, 226, 243,
    244, 245, 246, 251, 252, 255, 261, 263, 265, 266, 271, 274, 306, 311, 315, 325, 331, 332,
    343, 346, 351, 356, 364, 365, 371, 411, 412, 413, 423, 431, 432, 445, 446, 452, 454, 455,
    462, 464, 465, 466, 503, 506, 516, 523, 526, 532, 546, 565, 606, 612, 624, 627, 631, 632,
    654, 662, 664, 703, 712, 723, 731, 732, 734, 743, 754,
];

/// The capability table of the simulator.
///
/// Every operation is implemented, so the simulator doubles as the "all
/// features present" fixture in tests.
pub fn sim_caps() -> Arc<RigCaps> {
    let all_modes = Mode::mask(ALL_MODES);
    Arc::new(RigCaps {
        model_id: SIM_MODEL_ID,
        model_name: "Simulator",
        mfg_name: "rigkit",
        itu_region: 2,
        rx_ranges: vec![FreqRange {
            start_hz: 100_000,
            end_hz: 470_000_000,
            modes: all_modes,
            low_power_mw: -1,
            high_power_mw: -1,
            vfos: Vfo::A.bit() | Vfo::B.bit() | Vfo::Mem.bit(),
            antennas: 0x3,
        }],
        tx_ranges: vec![
            FreqRange {
                start_hz: 1_800_000,
                end_hz: 54_000_000,
                modes: all_modes,
                low_power_mw: 1_000,
                high_power_mw: 100_000,
                vfos: Vfo::A.bit() | Vfo::B.bit(),
                antennas: 0x3,
            },
            FreqRange {
                start_hz: 144_000_000,
                end_hz: 148_000_000,
                modes: all_modes,
                low_power_mw: 1_000,
                high_power_mw: 50_000,
                vfos: Vfo::A.bit() | Vfo::B.bit(),
                antennas: 0x3,
            },
        ],
        tuning_steps: vec![
            TuningStep {
                modes: all_modes,
                step_hz: 1,
            },
            TuningStep {
                modes: all_modes,
                step_hz: 10,
            },
            TuningStep {
                modes: all_modes,
                step_hz: 100,
            },
            TuningStep {
                modes: all_modes,
                step_hz: 1_000,
            },
        ],
        filters: vec![
            FilterEntry {
                modes: Mode::CW.bit() | Mode::CWR.bit(),
                width_hz: 500,
            },
            FilterEntry {
                modes: Mode::USB.bit() | Mode::LSB.bit() | Mode::DataUSB.bit() | Mode::DataLSB.bit(),
                width_hz: 2400,
            },
            FilterEntry {
                modes: Mode::AM.bit() | Mode::DataAM.bit(),
                width_hz: 6000,
            },
            FilterEntry {
                modes: Mode::FM.bit() | Mode::DataFM.bit(),
                width_hz: 12000,
            },
        ],
        max_rit_hz: 9_999,
        max_xit_hz: 9_999,
        max_if_shift_hz: 1_200,
        announces: 0,
        preamps: vec![10, 20],
        attenuators: vec![6, 12, 18],
        ctcss_tones: CTCSS_TONES.to_vec(),
        dcs_codes: DCS_CODES.to_vec(),
        agc_levels: vec![
            AgcLevel::Off,
            AgcLevel::Fast,
            AgcLevel::Medium,
            AgcLevel::Slow,
            AgcLevel::Auto,
        ],
        has_get_func: Func::mask(ALL_FUNCS),
        has_set_func: Func::mask(ALL_FUNCS),
        has_get_level: Level::mask(ALL_LEVELS),
        has_set_level: Level::mask(ALL_LEVELS),
        has_get_parm: Parm::mask(ALL_PARMS),
        has_set_parm: Parm::mask(ALL_PARMS),
        vfo_ops: VfoOp::mask(&[
            VfoOp::Copy,
            VfoOp::Exchange,
            VfoOp::Up,
            VfoOp::Down,
            VfoOp::Toggle,
        ]),
        targetable_vfo: Vfo::A.bit() | Vfo::B.bit(),
        antenna_count: 2,
        memory_channels: 100,
        timeout_ms: 200,
        retries: 3,
        write_delay_ms: 0,
        post_write_delay_ms: 0,
        default_baud_rate: 0,
        ops: OpMask::from_ops(&[
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
        ]),
    })
}

/// Per-VFO tuning state.
#[derive(Debug, Clone, Copy)]
struct VfoState {
    freq_hz: u64,
    mode: Mode,
    passband_hz: u64,
    rit_hz: i32,
    xit_hz: i32,
    step_hz: u64,
    ctcss: u32,
    dcs: u32,
    ant: u8,
}

impl Default for VfoState {
    fn default() -> Self {
        VfoState {
            freq_hz: 14_074_000,
            mode: Mode::USB,
            passband_hz: 2400,
            rit_hz: 0,
            xit_hz: 0,
            step_hz: 10,
            ctcss: 885,
            dcs: 131,
            ant: 1,
        }
    }
}

/// The simulated rig.
pub struct SimRig {
    caps: Arc<RigCaps>,
    vfos: HashMap<Vfo, VfoState>,
    current: Vfo,
    split: (bool, Vfo),
    ptt: bool,
    powerstat: PowerStat,
    levels: HashMap<(Vfo, Level), f32>,
    funcs: HashMap<(Vfo, Func), bool>,
    parms: HashMap<Parm, f32>,
    mem_channel: i32,
    locked: bool,
}

impl SimRig {
    /// Create a simulator with both VFOs on 20 m USB.
    pub fn new() -> Self {
        let mut vfos = HashMap::new();
        vfos.insert(Vfo::A, VfoState::default());
        vfos.insert(
            Vfo::B,
            VfoState {
                freq_hz: 14_080_000,
                ..VfoState::default()
            },
        );
        SimRig {
            caps: sim_caps(),
            vfos,
            current: Vfo::A,
            split: (false, Vfo::B),
            ptt: false,
            powerstat: PowerStat::On,
            levels: HashMap::new(),
            funcs: HashMap::new(),
            parms: HashMap::new(),
            mem_channel: 0,
            locked: false,
        }
    }

    fn vfo_state(&mut self, vfo: Vfo) -> &mut VfoState {
        self.vfos.entry(vfo).or_default()
    }

    fn powered(&self) -> Result<()> {
        if self.powerstat == PowerStat::Off {
            return Err(Error::Rejected("rig is powered off".into()));
        }
        Ok(())
    }
}

impl Default for SimRig {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for SimRig {
    async fn set_freq(&mut self, vfo: Vfo, freq_hz: u64) -> Result<()> {
        trace!(%vfo, freq_hz, "sim set_freq");
        self.vfo_state(vfo).freq_hz = freq_hz;
        Ok(())
    }

    async fn get_freq(&mut self, vfo: Vfo) -> Result<u64> {
        Ok(self.vfo_state(vfo).freq_hz)
    }

    async fn set_mode(&mut self, vfo: Vfo, mode: Mode, passband_hz: Option<u64>) -> Result<()> {
        let state = self.vfo_state(vfo);
        state.mode = mode;
        if let Some(pb) = passband_hz {
            state.passband_hz = pb;
        }
        Ok(())
    }

    async fn get_mode(&mut self, vfo: Vfo) -> Result<(Mode, u64)> {
        let state = self.vfo_state(vfo);
        Ok((state.mode, state.passband_hz))
    }

    async fn set_vfo(&mut self, vfo: Vfo) -> Result<()> {
        self.current = vfo;
        Ok(())
    }

    async fn get_vfo(&mut self) -> Result<Vfo> {
        Ok(self.current)
    }

    async fn set_ptt(&mut self, _vfo: Vfo, on: bool) -> Result<()> {
        // A powered-off rig understands the request but refuses it.
        self.powered()?;
        self.ptt = on;
        Ok(())
    }

    async fn get_ptt(&mut self, _vfo: Vfo) -> Result<bool> {
        Ok(self.ptt)
    }

    async fn get_dcd(&mut self, _vfo: Vfo) -> Result<bool> {
        // The simulated squelch is open while powered on.
        Ok(self.powerstat == PowerStat::On)
    }

    async fn set_split_vfo(&mut self, _vfo: Vfo, on: bool, tx_vfo: Vfo) -> Result<()> {
        self.split = (on, tx_vfo);
        Ok(())
    }

    async fn get_split_vfo(&mut self, _vfo: Vfo) -> Result<(bool, Vfo)> {
        Ok(self.split)
    }

    async fn set_split_freq(&mut self, vfo: Vfo, freq_hz: u64) -> Result<()> {
        self.vfo_state(vfo).freq_hz = freq_hz;
        Ok(())
    }

    async fn get_split_freq(&mut self, vfo: Vfo) -> Result<u64> {
        Ok(self.vfo_state(vfo).freq_hz)
    }

    async fn set_split_mode(
        &mut self,
        vfo: Vfo,
        mode: Mode,
        passband_hz: Option<u64>,
    ) -> Result<()> {
        self.set_mode(vfo, mode, passband_hz).await
    }

    async fn get_split_mode(&mut self, vfo: Vfo) -> Result<(Mode, u64)> {
        self.get_mode(vfo).await
    }

    async fn set_rit(&mut self, vfo: Vfo, offset_hz: i32) -> Result<()> {
        self.vfo_state(vfo).rit_hz = offset_hz;
        Ok(())
    }

    async fn get_rit(&mut self, vfo: Vfo) -> Result<i32> {
        Ok(self.vfo_state(vfo).rit_hz)
    }

    async fn set_xit(&mut self, vfo: Vfo, offset_hz: i32) -> Result<()> {
        self.vfo_state(vfo).xit_hz = offset_hz;
        Ok(())
    }

    async fn get_xit(&mut self, vfo: Vfo) -> Result<i32> {
        Ok(self.vfo_state(vfo).xit_hz)
    }

    async fn set_tuning_step(&mut self, vfo: Vfo, step_hz: u64) -> Result<()> {
        self.vfo_state(vfo).step_hz = step_hz;
        Ok(())
    }

    async fn get_tuning_step(&mut self, vfo: Vfo) -> Result<u64> {
        Ok(self.vfo_state(vfo).step_hz)
    }

    async fn set_level(&mut self, vfo: Vfo, level: Level, value: f32) -> Result<()> {
        self.levels.insert((vfo, level), value);
        Ok(())
    }

    async fn get_level(&mut self, vfo: Vfo, level: Level) -> Result<f32> {
        if let Some(v) = self.levels.get(&(vfo, level)) {
            return Ok(*v);
        }
        // Plausible idle readings for meters nobody has set.
        Ok(match level {
            Level::Swr => 1.0,
            Level::Strength => -54.0,
            Level::RfPower => 1.0,
            Level::Agc => AgcLevel::Medium.code() as f32,
            Level::KeySpeed => 20.0,
            Level::CwPitch => 600.0,
            _ => 0.0,
        })
    }

    async fn set_func(&mut self, vfo: Vfo, func: Func, on: bool) -> Result<()> {
        self.funcs.insert((vfo, func), on);
        Ok(())
    }

    async fn get_func(&mut self, vfo: Vfo, func: Func) -> Result<bool> {
        Ok(self.funcs.get(&(vfo, func)).copied().unwrap_or(false))
    }

    async fn set_parm(&mut self, parm: Parm, value: f32) -> Result<()> {
        self.parms.insert(parm, value);
        Ok(())
    }

    async fn get_parm(&mut self, parm: Parm) -> Result<f32> {
        Ok(self.parms.get(&parm).copied().unwrap_or(0.0))
    }

    async fn set_ant(&mut self, vfo: Vfo, antenna: u8) -> Result<()> {
        self.vfo_state(vfo).ant = antenna;
        Ok(())
    }

    async fn get_ant(&mut self, vfo: Vfo) -> Result<u8> {
        Ok(self.vfo_state(vfo).ant)
    }

    async fn set_mem(&mut self, _vfo: Vfo, channel: i32) -> Result<()> {
        self.mem_channel = channel;
        Ok(())
    }

    async fn get_mem(&mut self, _vfo: Vfo) -> Result<i32> {
        Ok(self.mem_channel)
    }

    async fn set_ctcss_tone(&mut self, vfo: Vfo, tone: u32) -> Result<()> {
        self.vfo_state(vfo).ctcss = tone;
        Ok(())
    }

    async fn get_ctcss_tone(&mut self, vfo: Vfo) -> Result<u32> {
        Ok(self.vfo_state(vfo).ctcss)
    }

    async fn set_dcs_code(&mut self, vfo: Vfo, code: u32) -> Result<()> {
        self.vfo_state(vfo).dcs = code;
        Ok(())
    }

    async fn get_dcs_code(&mut self, vfo: Vfo) -> Result<u32> {
        Ok(self.vfo_state(vfo).dcs)
    }

    async fn send_dtmf(&mut self, _vfo: Vfo, digits: &str) -> Result<()> {
        self.powered()?;
        trace!(digits, "sim send_dtmf");
        Ok(())
    }

    async fn send_morse(&mut self, _vfo: Vfo, message: &str) -> Result<()> {
        self.powered()?;
        trace!(message, "sim send_morse");
        Ok(())
    }

    async fn set_powerstat(&mut self, status: PowerStat) -> Result<()> {
        self.powerstat = status;
        if status != PowerStat::On {
            self.ptt = false;
        }
        Ok(())
    }

    async fn get_powerstat(&mut self) -> Result<PowerStat> {
        Ok(self.powerstat)
    }

    async fn power2mw(&mut self, power: f32, freq_hz: u64, _mode: Mode) -> Result<u64> {
        power2mw_linear(&self.caps, power, freq_hz)
    }

    async fn mw2power(&mut self, mw: u64, freq_hz: u64, _mode: Mode) -> Result<f32> {
        mw2power_linear(&self.caps, mw, freq_hz)
    }

    async fn vfo_op(&mut self, vfo: Vfo, op: VfoOp) -> Result<()> {
        match op {
            VfoOp::Copy => {
                let src = *self.vfo_state(self.current);
                let dst = if self.current == Vfo::A { Vfo::B } else { Vfo::A };
                self.vfos.insert(dst, src);
            }
            VfoOp::Exchange => {
                let a = *self.vfo_state(Vfo::A);
                let b = *self.vfo_state(Vfo::B);
                self.vfos.insert(Vfo::A, b);
                self.vfos.insert(Vfo::B, a);
            }
            VfoOp::Up => {
                let state = self.vfo_state(vfo);
                state.freq_hz += state.step_hz;
            }
            VfoOp::Down => {
                let state = self.vfo_state(vfo);
                state.freq_hz = state.freq_hz.saturating_sub(state.step_hz);
            }
            VfoOp::Toggle => {
                self.current = if self.current == Vfo::A { Vfo::B } else { Vfo::A };
            }
        }
        Ok(())
    }

    async fn set_lock_mode(&mut self, locked: bool) -> Result<()> {
        self.locked = locked;
        Ok(())
    }

    async fn get_lock_mode(&mut self) -> Result<bool> {
        Ok(self.locked)
    }
}
