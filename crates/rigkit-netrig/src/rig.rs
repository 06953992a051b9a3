//! The network client backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use rigkit_core::backend::Backend;
use rigkit_core::caps::{Op, OpMask, RigCaps};
use rigkit_core::error::{Error, Result};
use rigkit_core::transport::Transport;
use rigkit_core::types::{
    FreqRange, Func, Level, Mode, Parm, PowerStat, Vfo, VfoOp, ALL_FUNCS, ALL_LEVELS, ALL_MODES,
    ALL_PARMS,
};
use rigkit_transport::TcpTransport;
use rigkit_wire::command::{encode_line, Command};
use rigkit_wire::dump::{DumpStateParser, StateDump};
use rigkit_wire::response::{
    parse_bool, parse_f32, parse_i32, parse_status, parse_u32, parse_u64,
};

/// The registry model id of the network backend.
pub const NETRIG_MODEL_ID: u32 = 2;

/// Maximum length of one reply line.
const MAX_LINE: usize = 1024;

/// The static capability table registered for the network backend.
///
/// The network rig claims every operation: until a connection is made
/// nothing is known about the remote radio, and after `open` the
/// negotiated snapshot (not this table) gates individual calls.
pub fn netrig_caps() -> Arc<RigCaps> {
    Arc::new(RigCaps {
        model_id: NETRIG_MODEL_ID,
        model_name: "Network rig",
        mfg_name: "rigkit",
        rx_ranges: vec![FreqRange {
            start_hz: 0,
            end_hz: u64::MAX,
            modes: Mode::mask(ALL_MODES),
            low_power_mw: -1,
            high_power_mw: -1,
            vfos: Vfo::A.bit() | Vfo::B.bit() | Vfo::Mem.bit(),
            antennas: 0xf,
        }],
        tx_ranges: Vec::new(),
        has_get_level: Level::mask(ALL_LEVELS),
        has_set_level: Level::mask(ALL_LEVELS),
        has_get_func: Func::mask(ALL_FUNCS),
        has_set_func: Func::mask(ALL_FUNCS),
        has_get_parm: Parm::mask(ALL_PARMS),
        has_set_parm: Parm::mask(ALL_PARMS),
        max_rit_hz: 99_999,
        max_xit_hz: 99_999,
        vfo_ops: 0x1f,
        antenna_count: 4,
        memory_channels: 0,
        timeout_ms: 2_000,
        retries: 3,
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
        ..RigCaps::default()
    })
}

/// A backend that relays every operation to a remote control daemon.
pub struct NetRig {
    addr: String,
    timeout: Duration,
    retries: u32,
    password: Option<String>,
    transport: Option<Box<dyn Transport>>,
    /// Transport injected for tests; consumed by `open`.
    injected: Option<Box<dyn Transport>>,
    vfo_mode: bool,
    dump: Option<StateDump>,
    negotiated: Option<RigCaps>,
}

impl NetRig {
    /// Create a client for `host:port`.
    pub fn new(addr: &str) -> Self {
        NetRig {
            addr: addr.to_string(),
            timeout: Duration::from_millis(2_000),
            retries: 3,
            password: None,
            transport: None,
            injected: None,
            vfo_mode: false,
            dump: None,
            negotiated: None,
        }
    }

    /// Create a client over an already-built transport (tests, exotic
    /// links). `open` still performs the handshake.
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        NetRig {
            injected: Some(transport),
            ..NetRig::new("")
        }
    }

    /// Override the per-exchange timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the retry count applied on timeouts.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Shared secret sent via `\password` before the handshake, for
    /// servers with an auth gate.
    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    /// The capability snapshot negotiated at `open`, if any.
    pub fn negotiated_caps(&self) -> Option<&RigCaps> {
        self.negotiated.as_ref()
    }

    /// The raw `dump_state` payload negotiated at `open`, if any.
    pub fn dump_state(&self) -> Option<&StateDump> {
        self.dump.as_ref()
    }

    /// Whether per-command VFO qualifiers were negotiated.
    pub fn vfo_mode(&self) -> bool {
        self.vfo_mode
    }

    /// Refuse locally what the server reported absent.
    fn ensure(&self, op: Op) -> Result<()> {
        if let Some(caps) = &self.negotiated {
            if !caps.supports(op) {
                return Err(Error::NotImplemented);
            }
        }
        Ok(())
    }

    fn transport_mut(&mut self) -> Result<&mut Box<dyn Transport>> {
        self.transport
            .as_mut()
            .ok_or_else(|| Error::Io("netrig not open".into()))
    }

    async fn read_line(&mut self) -> Result<String> {
        let timeout = self.timeout;
        let t = self.transport_mut()?;
        let bytes = t.read_until(b"\n", MAX_LINE, timeout).await?;
        let s = std::str::from_utf8(&bytes)
            .map_err(|_| Error::Protocol("non-UTF-8 reply line".into()))?;
        Ok(s.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read one reply: either a status line, or `expect` data lines.
    async fn read_reply(&mut self, expect: usize) -> Result<Vec<String>> {
        let first = self.read_line().await?;
        if let Some(code) = parse_status(&first) {
            return if code == 0 {
                Ok(Vec::new())
            } else {
                Err(Error::from_status_code(code))
            };
        }
        if expect == 0 {
            return Err(Error::Protocol(format!(
                "expected status line, got {first:?}"
            )));
        }
        let mut lines = vec![first];
        while lines.len() < expect {
            lines.push(self.read_line().await?);
        }
        Ok(lines)
    }

    /// One command/reply exchange, with flush-before-send and retry on
    /// timeout.
    async fn exchange(&mut self, command: &Command, vfo: Vfo) -> Result<Vec<String>> {
        let line = encode_line(command, self.vfo_mode, vfo);
        let expect = command.reply_lines();

        for attempt in 0..=self.retries {
            if attempt > 0 {
                debug!(attempt, cmd = %line.trim_end(), "netrig retry");
            }
            {
                let t = self.transport_mut()?;
                // Drop stray bytes from a previous timed-out exchange.
                t.flush_input().await?;
                t.send(line.as_bytes()).await?;
            }
            match self.read_reply(expect).await {
                Ok(lines) => return Ok(lines),
                Err(Error::Timeout) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::Timeout)
    }

    async fn exchange_set(&mut self, command: &Command, vfo: Vfo) -> Result<()> {
        self.exchange(command, vfo).await.map(|_| ())
    }

    async fn exchange_one(&mut self, command: &Command, vfo: Vfo) -> Result<String> {
        let lines = self.exchange(command, vfo).await?;
        lines
            .into_iter()
            .next()
            .ok_or_else(|| Error::Protocol("empty reply to query".into()))
    }

    /// Negotiate VFO mode: `\chk_vfo` returns `CHKVFO 0|1`.
    async fn negotiate_vfo_mode(&mut self) -> Result<()> {
        match self.exchange_one(&Command::ChkVfo, Vfo::Current).await {
            Ok(reply) => {
                let token = reply
                    .strip_prefix("CHKVFO")
                    .map(str::trim)
                    .ok_or_else(|| Error::Protocol(format!("bad chk_vfo reply: {reply:?}")))?;
                self.vfo_mode = parse_bool(token)?;
            }
            Err(Error::NotImplemented) | Err(Error::InvalidArgument(_)) => {
                // Pre-chk_vfo server; stay in plain mode.
                self.vfo_mode = false;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Fetch and parse the capability snapshot.
    async fn fetch_dump_state(&mut self) -> Result<()> {
        let line = encode_line(&Command::DumpState, self.vfo_mode, Vfo::Current);
        {
            let t = self.transport_mut()?;
            t.flush_input().await?;
            t.send(line.as_bytes()).await?;
        }

        let mut parser = DumpStateParser::new();
        loop {
            let reply = self.read_line().await?;
            if let Some(code) = parse_status(&reply) {
                return Err(Error::from_status_code(code));
            }
            if parser.feed(&reply)? {
                break;
            }
        }
        let dump = parser.finish()?;
        debug!(
            protocol_ver = dump.protocol_ver,
            model_id = dump.model_id,
            "negotiated dump_state"
        );
        self.negotiated = Some(dump.to_caps());
        self.dump = Some(dump);
        Ok(())
    }
}

#[async_trait]
impl Backend for NetRig {
    async fn open(&mut self) -> Result<()> {
        let transport: Box<dyn Transport> = match self.injected.take() {
            Some(t) => t,
            None => Box::new(TcpTransport::connect_with_timeout(&self.addr, self.timeout).await?),
        };
        self.transport = Some(transport);

        // Authenticate first: a gated server refuses everything else.
        if let Some(password) = self.password.clone() {
            self.exchange_set(&Command::Password(password), Vfo::Current)
                .await?;
        }

        self.negotiate_vfo_mode().await?;
        self.fetch_dump_state().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.transport.is_some() {
            // Best-effort sign-off; the server closes the session on `q`.
            let line = encode_line(&Command::Quit, false, Vfo::Current);
            if let Ok(t) = self.transport_mut() {
                if let Err(e) = t.send(line.as_bytes()).await {
                    warn!(error = %e, "netrig sign-off failed");
                }
            }
            if let Some(mut t) = self.transport.take() {
                let _ = t.close().await;
            }
        }
        Ok(())
    }

    async fn set_freq(&mut self, vfo: Vfo, freq_hz: u64) -> Result<()> {
        self.ensure(Op::SetFreq)?;
        self.exchange_set(&Command::SetFreq(freq_hz), vfo).await
    }

    async fn get_freq(&mut self, vfo: Vfo) -> Result<u64> {
        self.ensure(Op::GetFreq)?;
        let line = self.exchange_one(&Command::GetFreq, vfo).await?;
        parse_u64(&line)
    }

    async fn set_mode(&mut self, vfo: Vfo, mode: Mode, passband_hz: Option<u64>) -> Result<()> {
        self.ensure(Op::SetMode)?;
        self.exchange_set(&Command::SetMode { mode, passband_hz }, vfo)
            .await
    }

    async fn get_mode(&mut self, vfo: Vfo) -> Result<(Mode, u64)> {
        self.ensure(Op::GetMode)?;
        let lines = self.exchange(&Command::GetMode, vfo).await?;
        if lines.len() != 2 {
            return Err(Error::Protocol("get_mode needs two reply lines".into()));
        }
        Ok((lines[0].parse()?, parse_u64(&lines[1])?))
    }

    async fn set_vfo(&mut self, vfo: Vfo) -> Result<()> {
        self.ensure(Op::SetVfo)?;
        self.exchange_set(&Command::SetVfo(vfo), Vfo::Current).await
    }

    async fn get_vfo(&mut self) -> Result<Vfo> {
        self.ensure(Op::GetVfo)?;
        let line = self.exchange_one(&Command::GetVfo, Vfo::Current).await?;
        line.parse()
    }

    async fn set_ptt(&mut self, vfo: Vfo, on: bool) -> Result<()> {
        self.ensure(Op::SetPtt)?;
        self.exchange_set(&Command::SetPtt(on), vfo).await
    }

    async fn get_ptt(&mut self, vfo: Vfo) -> Result<bool> {
        self.ensure(Op::GetPtt)?;
        let line = self.exchange_one(&Command::GetPtt, vfo).await?;
        parse_bool(&line)
    }

    async fn get_dcd(&mut self, vfo: Vfo) -> Result<bool> {
        self.ensure(Op::GetDcd)?;
        let line = self.exchange_one(&Command::GetDcd, vfo).await?;
        parse_bool(&line)
    }

    async fn set_split_vfo(&mut self, vfo: Vfo, on: bool, tx_vfo: Vfo) -> Result<()> {
        self.ensure(Op::SetSplitVfo)?;
        self.exchange_set(&Command::SetSplitVfo { on, tx_vfo }, vfo)
            .await
    }

    async fn get_split_vfo(&mut self, vfo: Vfo) -> Result<(bool, Vfo)> {
        self.ensure(Op::GetSplitVfo)?;
        let lines = self.exchange(&Command::GetSplitVfo, vfo).await?;
        if lines.len() != 2 {
            return Err(Error::Protocol("get_split_vfo needs two reply lines".into()));
        }
        Ok((parse_bool(&lines[0])?, lines[1].parse()?))
    }

    async fn set_split_freq(&mut self, vfo: Vfo, freq_hz: u64) -> Result<()> {
        self.ensure(Op::SetSplitFreq)?;
        self.exchange_set(&Command::SetSplitFreq(freq_hz), vfo).await
    }

    async fn get_split_freq(&mut self, vfo: Vfo) -> Result<u64> {
        self.ensure(Op::GetSplitFreq)?;
        let line = self.exchange_one(&Command::GetSplitFreq, vfo).await?;
        parse_u64(&line)
    }

    async fn set_split_mode(
        &mut self,
        vfo: Vfo,
        mode: Mode,
        passband_hz: Option<u64>,
    ) -> Result<()> {
        self.ensure(Op::SetSplitMode)?;
        self.exchange_set(&Command::SetSplitMode { mode, passband_hz }, vfo)
            .await
    }

    async fn get_split_mode(&mut self, vfo: Vfo) -> Result<(Mode, u64)> {
        self.ensure(Op::GetSplitMode)?;
        let lines = self.exchange(&Command::GetSplitMode, vfo).await?;
        if lines.len() != 2 {
            return Err(Error::Protocol("get_split_mode needs two reply lines".into()));
        }
        Ok((lines[0].parse()?, parse_u64(&lines[1])?))
    }

    async fn set_rit(&mut self, vfo: Vfo, offset_hz: i32) -> Result<()> {
        self.ensure(Op::SetRit)?;
        self.exchange_set(&Command::SetRit(offset_hz), vfo).await
    }

    async fn get_rit(&mut self, vfo: Vfo) -> Result<i32> {
        self.ensure(Op::GetRit)?;
        let line = self.exchange_one(&Command::GetRit, vfo).await?;
        parse_i32(&line)
    }

    async fn set_xit(&mut self, vfo: Vfo, offset_hz: i32) -> Result<()> {
        self.ensure(Op::SetXit)?;
        self.exchange_set(&Command::SetXit(offset_hz), vfo).await
    }

    async fn get_xit(&mut self, vfo: Vfo) -> Result<i32> {
        self.ensure(Op::GetXit)?;
        let line = self.exchange_one(&Command::GetXit, vfo).await?;
        parse_i32(&line)
    }

    async fn set_tuning_step(&mut self, vfo: Vfo, step_hz: u64) -> Result<()> {
        self.ensure(Op::SetTuningStep)?;
        self.exchange_set(&Command::SetTuningStep(step_hz), vfo).await
    }

    async fn get_tuning_step(&mut self, vfo: Vfo) -> Result<u64> {
        self.ensure(Op::GetTuningStep)?;
        let line = self.exchange_one(&Command::GetTuningStep, vfo).await?;
        parse_u64(&line)
    }

    async fn set_level(&mut self, vfo: Vfo, level: Level, value: f32) -> Result<()> {
        self.ensure(Op::SetLevel)?;
        self.exchange_set(&Command::SetLevel { level, value }, vfo)
            .await
    }

    async fn get_level(&mut self, vfo: Vfo, level: Level) -> Result<f32> {
        self.ensure(Op::GetLevel)?;
        let line = self.exchange_one(&Command::GetLevel(level), vfo).await?;
        parse_f32(&line)
    }

    async fn set_func(&mut self, vfo: Vfo, func: Func, on: bool) -> Result<()> {
        self.ensure(Op::SetFunc)?;
        self.exchange_set(&Command::SetFunc { func, on }, vfo).await
    }

    async fn get_func(&mut self, vfo: Vfo, func: Func) -> Result<bool> {
        self.ensure(Op::GetFunc)?;
        let line = self.exchange_one(&Command::GetFunc(func), vfo).await?;
        parse_bool(&line)
    }

    async fn set_parm(&mut self, parm: Parm, value: f32) -> Result<()> {
        self.ensure(Op::SetParm)?;
        self.exchange_set(&Command::SetParm { parm, value }, Vfo::Current)
            .await
    }

    async fn get_parm(&mut self, parm: Parm) -> Result<f32> {
        self.ensure(Op::GetParm)?;
        let line = self
            .exchange_one(&Command::GetParm(parm), Vfo::Current)
            .await?;
        parse_f32(&line)
    }

    async fn set_ant(&mut self, vfo: Vfo, antenna: u8) -> Result<()> {
        self.ensure(Op::SetAnt)?;
        self.exchange_set(&Command::SetAnt(antenna), vfo).await
    }

    async fn get_ant(&mut self, vfo: Vfo) -> Result<u8> {
        self.ensure(Op::GetAnt)?;
        let line = self.exchange_one(&Command::GetAnt, vfo).await?;
        let ant = parse_u32(&line)?;
        u8::try_from(ant).map_err(|_| Error::Protocol(format!("bad antenna reply: {ant}")))
    }

    async fn set_mem(&mut self, vfo: Vfo, channel: i32) -> Result<()> {
        self.ensure(Op::SetMem)?;
        self.exchange_set(&Command::SetMem(channel), vfo).await
    }

    async fn get_mem(&mut self, vfo: Vfo) -> Result<i32> {
        self.ensure(Op::GetMem)?;
        let line = self.exchange_one(&Command::GetMem, vfo).await?;
        parse_i32(&line)
    }

    async fn set_ctcss_tone(&mut self, vfo: Vfo, tone: u32) -> Result<()> {
        self.ensure(Op::SetCtcss)?;
        self.exchange_set(&Command::SetCtcss(tone), vfo).await
    }

    async fn get_ctcss_tone(&mut self, vfo: Vfo) -> Result<u32> {
        self.ensure(Op::GetCtcss)?;
        let line = self.exchange_one(&Command::GetCtcss, vfo).await?;
        parse_u32(&line)
    }

    async fn set_dcs_code(&mut self, vfo: Vfo, code: u32) -> Result<()> {
        self.ensure(Op::SetDcs)?;
        self.exchange_set(&Command::SetDcs(code), vfo).await
    }

    async fn get_dcs_code(&mut self, vfo: Vfo) -> Result<u32> {
        self.ensure(Op::GetDcs)?;
        let line = self.exchange_one(&Command::GetDcs, vfo).await?;
        parse_u32(&line)
    }

    async fn send_dtmf(&mut self, vfo: Vfo, digits: &str) -> Result<()> {
        self.ensure(Op::SendDtmf)?;
        self.exchange_set(&Command::SendDtmf(digits.to_string()), vfo)
            .await
    }

    async fn send_morse(&mut self, vfo: Vfo, message: &str) -> Result<()> {
        self.ensure(Op::SendMorse)?;
        self.exchange_set(&Command::SendMorse(message.to_string()), vfo)
            .await
    }

    async fn set_powerstat(&mut self, status: PowerStat) -> Result<()> {
        self.ensure(Op::SetPowerStat)?;
        self.exchange_set(&Command::SetPowerStat(status), Vfo::Current)
            .await
    }

    async fn get_powerstat(&mut self) -> Result<PowerStat> {
        self.ensure(Op::GetPowerStat)?;
        let line = self
            .exchange_one(&Command::GetPowerStat, Vfo::Current)
            .await?;
        let code = parse_u32(&line)?;
        u8::try_from(code)
            .ok()
            .and_then(PowerStat::from_code)
            .ok_or_else(|| Error::Protocol(format!("bad power state reply: {code}")))
    }

    async fn power2mw(&mut self, power: f32, freq_hz: u64, mode: Mode) -> Result<u64> {
        self.ensure(Op::Power2Mw)?;
        let line = self
            .exchange_one(
                &Command::Power2Mw {
                    power,
                    freq_hz,
                    mode,
                },
                Vfo::Current,
            )
            .await?;
        parse_u64(&line)
    }

    async fn mw2power(&mut self, mw: u64, freq_hz: u64, mode: Mode) -> Result<f32> {
        self.ensure(Op::Mw2Power)?;
        let line = self
            .exchange_one(&Command::Mw2Power { mw, freq_hz, mode }, Vfo::Current)
            .await?;
        parse_f32(&line)
    }

    async fn vfo_op(&mut self, vfo: Vfo, op: VfoOp) -> Result<()> {
        self.ensure(Op::VfoOp)?;
        self.exchange_set(&Command::VfoOp(op), vfo).await
    }

    async fn set_lock_mode(&mut self, locked: bool) -> Result<()> {
        self.ensure(Op::SetLockMode)?;
        self.exchange_set(&Command::SetLockMode(locked), Vfo::Current)
            .await
    }

    async fn get_lock_mode(&mut self) -> Result<bool> {
        self.ensure(Op::GetLockMode)?;
        let line = self
            .exchange_one(&Command::GetLockMode, Vfo::Current)
            .await?;
        parse_bool(&line)
    }
}
