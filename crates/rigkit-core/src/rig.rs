//! The `Rig` device handle -- capability-gated dispatch over a backend.
//!
//! A `Rig` ties together an immutable capability table, one backend, and
//! the mutable runtime state (lifecycle phase, current VFO, split state,
//! cache, twiddle guard). Every operation goes through the same funnel:
//!
//! 1. lifecycle check (`InvalidState` outside the valid phase),
//! 2. capability check (`NotImplemented` without touching the transport),
//! 3. logical-VFO resolution against runtime state,
//! 4. argument validation against the capability table,
//! 5. cache consultation (reads) or dispatch + write-through (writes).
//!
//! The handle is single-caller by construction: methods take `&mut self`,
//! and multi-client access (the daemon) serializes callers with one lock
//! around the whole handle.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::cache::{Cache, CacheField, CachePolicy, TwiddleGuard};
use crate::caps::{Op, RigCaps};
use crate::error::{Error, Result};
use crate::events::RigEvent;
use crate::transport::Transport;
use crate::types::{
    DcdType, Func, Level, Mode, Parm, PowerStat, PttType, Vfo, VfoOp,
};

/// Lifecycle phase of a device handle.
///
/// `open` is only valid from `Initialized` or `Closed`; every operation
/// other than lifecycle calls is only valid in `Opened`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created, backend-private state not yet allocated.
    Uninitialized,
    /// `init` done, transports not open.
    Initialized,
    /// Transports open, operations allowed.
    Opened,
    /// Transports closed, may be reopened.
    Closed,
    /// Backend-private state released; terminal.
    Cleaned,
}

/// Mutable runtime state owned by a [`Rig`].
#[derive(Debug)]
pub struct RigState {
    /// The concrete VFO the rig currently has selected.
    pub current_vfo: Vfo,
    /// The configured receive VFO.
    pub rx_vfo: Vfo,
    /// The configured transmit VFO while split is on.
    pub tx_vfo: Vfo,
    /// Whether split operation is on.
    pub split: bool,
    /// Whether the remote protocol negotiates per-command VFO qualifiers.
    pub vfo_mode: bool,
    /// Response timeout per exchange, milliseconds.
    pub timeout_ms: u64,
    /// Retry count applied on timeout.
    pub retries: u32,
}

impl Default for RigState {
    fn default() -> Self {
        RigState {
            current_vfo: Vfo::A,
            rx_vfo: Vfo::A,
            tx_vfo: Vfo::B,
            split: false,
            vfo_mode: false,
            timeout_ms: 500,
            retries: 3,
        }
    }
}

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A device handle: one backend, its capability table, and runtime state.
pub struct Rig {
    caps: Arc<RigCaps>,
    backend: Box<dyn Backend>,
    phase: Phase,
    state: RigState,
    cache: Cache,
    twiddle: TwiddleGuard,
    event_tx: broadcast::Sender<RigEvent>,
    /// Auxiliary PTT port when PTT is keyed via a serial control line.
    ptt_port: Option<Box<dyn Transport>>,
    ptt_type: PttType,
    /// Tracked state of a line-keyed PTT (the line cannot be read back).
    ptt_line_on: bool,
    /// Auxiliary DCD port when DCD is sensed via a serial control line.
    dcd_port: Option<Box<dyn Transport>>,
    dcd_type: DcdType,
}

impl Rig {
    /// Create a handle in the `Uninitialized` phase.
    pub fn new(caps: Arc<RigCaps>, backend: Box<dyn Backend>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = RigState {
            timeout_ms: caps.timeout_ms,
            retries: caps.retries,
            ..RigState::default()
        };
        Rig {
            caps,
            backend,
            phase: Phase::Uninitialized,
            state,
            cache: Cache::default(),
            twiddle: TwiddleGuard::default(),
            event_tx,
            ptt_port: None,
            ptt_type: PttType::Rig,
            ptt_line_on: false,
            dcd_port: None,
            dcd_type: DcdType::Rig,
        }
    }

    /// The capability table for this model.
    pub fn caps(&self) -> &RigCaps {
        &self.caps
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Read access to the runtime state.
    pub fn state(&self) -> &RigState {
        &self.state
    }

    /// Subscribe to state-change events.
    pub fn subscribe(&self) -> broadcast::Receiver<RigEvent> {
        self.event_tx.subscribe()
    }

    /// Enable or disable per-command VFO qualifiers (wire protocol VFO
    /// mode).
    pub fn set_vfo_mode(&mut self, on: bool) {
        self.state.vfo_mode = on;
    }

    /// Route PTT through a serial control line on a dedicated port.
    ///
    /// `ptt_type` must be [`PttType::DtrSerial`] or [`PttType::RtsSerial`];
    /// anything else keeps PTT on the rig's own protocol.
    pub fn set_ptt_port(&mut self, port: Box<dyn Transport>, ptt_type: PttType) {
        self.ptt_port = Some(port);
        self.ptt_type = ptt_type;
    }

    /// Sense DCD from a serial control line on a dedicated port.
    pub fn set_dcd_port(&mut self, port: Box<dyn Transport>, dcd_type: DcdType) {
        self.dcd_port = Some(port);
        self.dcd_type = dcd_type;
    }

    /// Reconfigure the cache timeout for one field.
    pub fn set_cache_timeout(&mut self, field: CacheField, timeout_ms: u64) {
        self.cache.policy_mut().set_field(field, timeout_ms);
    }

    /// Reconfigure the cache timeout for all fields at once.
    pub fn set_cache_timeout_all(&mut self, timeout_ms: u64) {
        self.cache.policy_mut().set_all(timeout_ms);
    }

    /// Replace the whole cache policy.
    pub fn set_cache_policy(&mut self, policy: CachePolicy) {
        self.cache = Cache::with_policy(policy);
    }

    /// Set the twiddle suppression window (0 disables).
    pub fn set_twiddle_window(&mut self, window_ms: u64) {
        self.twiddle.set_window(window_ms);
    }

    /// Record an out-of-band frequency change (transceive push, operator
    /// twiddling). Primes the cache, starts the suppression window, and
    /// emits an event.
    pub fn note_external_freq_change(&mut self, vfo: Vfo, freq_hz: u64) {
        let vfo = self.resolve_vfo(vfo);
        self.twiddle.note_change(vfo);
        self.cache.put_freq(vfo, freq_hz);
        self.emit(RigEvent::FreqChanged { vfo, freq_hz });
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Allocate backend-private state. Valid once, from `Uninitialized`.
    pub async fn init(&mut self) -> Result<()> {
        if self.phase != Phase::Uninitialized {
            return Err(Error::InvalidState(format!(
                "init from {:?}",
                self.phase
            )));
        }
        self.backend.init().await?;
        self.phase = Phase::Initialized;
        Ok(())
    }

    /// Open transports and handshake. Valid from `Initialized` or
    /// `Closed`.
    pub async fn open(&mut self) -> Result<()> {
        if self.phase != Phase::Initialized && self.phase != Phase::Closed {
            return Err(Error::InvalidState(format!(
                "open from {:?}",
                self.phase
            )));
        }
        self.backend.open().await?;
        self.phase = Phase::Opened;

        // Prime the current-VFO view where the backend can tell us.
        // Failure here is not fatal; the default (VFO A) stands.
        if self.caps.supports(Op::GetVfo) {
            match self.backend.get_vfo().await {
                Ok(vfo) => {
                    self.state.current_vfo = vfo;
                    self.cache.put_vfo(vfo);
                }
                Err(e) => debug!(error = %e, "could not prime current VFO"),
            }
        }

        self.emit(RigEvent::Opened);
        Ok(())
    }

    /// Sign off and close transports.
    ///
    /// Never fails fatally: a sign-off error is logged and the handle
    /// still transitions to `Closed`.
    pub async fn close(&mut self) -> Result<()> {
        if self.phase != Phase::Opened {
            return Err(Error::InvalidState(format!(
                "close from {:?}",
                self.phase
            )));
        }
        if let Err(e) = self.backend.close().await {
            warn!(error = %e, "backend close failed, continuing");
        }
        self.cache.invalidate_all();
        self.phase = Phase::Closed;
        self.emit(RigEvent::Closed);
        Ok(())
    }

    /// Release backend-private state. Terminal; closes first if still
    /// open. Valid from any phase after `init`.
    pub async fn cleanup(&mut self) -> Result<()> {
        match self.phase {
            Phase::Uninitialized => {
                return Err(Error::InvalidState("cleanup before init".into()))
            }
            Phase::Cleaned => {
                return Err(Error::InvalidState("cleanup after cleanup".into()))
            }
            Phase::Opened => {
                if let Err(e) = self.backend.close().await {
                    warn!(error = %e, "backend close failed during cleanup");
                }
            }
            Phase::Initialized | Phase::Closed => {}
        }
        self.backend.cleanup().await?;
        self.phase = Phase::Cleaned;
        Ok(())
    }

    // -----------------------------------------------------------------
    // VFO resolution
    // -----------------------------------------------------------------

    /// Resolve a logical VFO selector to a concrete VFO.
    ///
    /// Consults runtime state only -- never the transport. `Current` maps
    /// to the last known VFO, `Rx` to the configured receive VFO, and
    /// `Tx` to the configured transmit VFO in split (falling back to the
    /// current VFO otherwise). Concrete selectors pass through.
    pub fn resolve_vfo(&self, vfo: Vfo) -> Vfo {
        match vfo {
            Vfo::Current => self.state.current_vfo,
            Vfo::Rx => self.state.rx_vfo,
            Vfo::Tx => {
                if self.state.split {
                    self.state.tx_vfo
                } else {
                    self.state.current_vfo
                }
            }
            concrete => concrete,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.phase != Phase::Opened {
            return Err(Error::InvalidState(format!(
                "operation in {:?}",
                self.phase
            )));
        }
        Ok(())
    }

    fn ensure_op(&self, op: Op) -> Result<()> {
        if !self.caps.supports(op) {
            return Err(Error::NotImplemented);
        }
        Ok(())
    }

    fn emit(&self, event: RigEvent) {
        let _ = self.event_tx.send(event);
    }

    // -----------------------------------------------------------------
    // Frequency
    // -----------------------------------------------------------------

    /// Set the frequency of a VFO in hertz. Write-through: a subsequent
    /// `get_freq` is answered from cache.
    pub async fn set_freq(&mut self, vfo: Vfo, freq_hz: u64) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetFreq)?;
        let vfo = self.resolve_vfo(vfo);
        if !self.caps.rx_ranges.is_empty() && !self.caps.in_range(freq_hz) {
            return Err(Error::InvalidArgument(format!(
                "{freq_hz} Hz outside rig range"
            )));
        }
        match self.backend.set_freq(vfo, freq_hz).await {
            Ok(()) => {
                self.cache.put_freq(vfo, freq_hz);
                self.emit(RigEvent::FreqChanged { vfo, freq_hz });
                Ok(())
            }
            Err(e) => {
                self.cache.invalidate(CacheField::Freq, vfo);
                Err(e)
            }
        }
    }

    /// Get the frequency of a VFO in hertz, serving from cache while
    /// fresh.
    pub async fn get_freq(&mut self, vfo: Vfo) -> Result<u64> {
        self.ensure_open()?;
        self.ensure_op(Op::GetFreq)?;
        let vfo = self.resolve_vfo(vfo);

        // An externally twiddled VFO is not polled inside the window;
        // the last known value is served even if the cache entry is
        // past its normal timeout.
        if self.twiddle.suppressed(vfo) {
            if let Some(freq) = self.cache.freq_any_age(vfo) {
                return Ok(freq);
            }
        }
        if let Some(freq) = self.cache.freq(vfo) {
            return Ok(freq);
        }
        match self.backend.get_freq(vfo).await {
            Ok(freq) => {
                self.cache.put_freq(vfo, freq);
                Ok(freq)
            }
            Err(e) => {
                self.cache.invalidate(CacheField::Freq, vfo);
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------
    // Mode
    // -----------------------------------------------------------------

    /// Set the operating mode (and optionally passband) of a VFO.
    pub async fn set_mode(
        &mut self,
        vfo: Vfo,
        mode: Mode,
        passband_hz: Option<u64>,
    ) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetMode)?;
        let vfo = self.resolve_vfo(vfo);
        let supported = self.supported_mode_mask();
        if supported != 0 && supported & mode.bit() == 0 {
            return Err(Error::InvalidArgument(format!(
                "mode {mode} not supported by this model"
            )));
        }
        match self.backend.set_mode(vfo, mode, passband_hz).await {
            Ok(()) => {
                let pb = passband_hz.unwrap_or_else(|| self.default_passband(mode));
                self.cache.put_mode(vfo, mode, pb);
                self.emit(RigEvent::ModeChanged {
                    vfo,
                    mode,
                    passband_hz: pb,
                });
                Ok(())
            }
            Err(e) => {
                self.cache.invalidate(CacheField::Mode, vfo);
                Err(e)
            }
        }
    }

    /// Get the operating mode and passband of a VFO.
    pub async fn get_mode(&mut self, vfo: Vfo) -> Result<(Mode, u64)> {
        self.ensure_open()?;
        self.ensure_op(Op::GetMode)?;
        let vfo = self.resolve_vfo(vfo);
        if let Some(entry) = self.cache.mode(vfo) {
            return Ok(entry);
        }
        match self.backend.get_mode(vfo).await {
            Ok((mode, pb)) => {
                self.cache.put_mode(vfo, mode, pb);
                Ok((mode, pb))
            }
            Err(e) => {
                self.cache.invalidate(CacheField::Mode, vfo);
                Err(e)
            }
        }
    }

    /// Union of mode masks across all frequency ranges.
    fn supported_mode_mask(&self) -> u64 {
        self.caps
            .rx_ranges
            .iter()
            .chain(self.caps.tx_ranges.iter())
            .fold(0, |m, r| m | r.modes)
    }

    /// The narrowest filter listed for a mode, or 0 when the table is
    /// empty.
    fn default_passband(&self, mode: Mode) -> u64 {
        self.caps
            .filters
            .iter()
            .filter(|f| f.modes & mode.bit() != 0)
            .map(|f| f.width_hz)
            .min()
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------
    // VFO selection
    // -----------------------------------------------------------------

    /// Select the active VFO.
    pub async fn set_vfo(&mut self, vfo: Vfo) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetVfo)?;
        let vfo = self.resolve_vfo(vfo);
        match self.backend.set_vfo(vfo).await {
            Ok(()) => {
                self.state.current_vfo = vfo;
                self.cache.put_vfo(vfo);
                self.emit(RigEvent::VfoChanged { vfo });
                Ok(())
            }
            Err(e) => {
                self.cache.invalidate(CacheField::Vfo, vfo);
                Err(e)
            }
        }
    }

    /// Query the active VFO. Always returns a concrete VFO.
    pub async fn get_vfo(&mut self) -> Result<Vfo> {
        self.ensure_open()?;
        self.ensure_op(Op::GetVfo)?;
        if let Some(vfo) = self.cache.vfo() {
            return Ok(vfo);
        }
        match self.backend.get_vfo().await {
            Ok(vfo) => {
                self.state.current_vfo = vfo;
                self.cache.put_vfo(vfo);
                Ok(vfo)
            }
            Err(e) => {
                self.cache.invalidate(CacheField::Vfo, Vfo::Current);
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------
    // PTT / DCD
    // -----------------------------------------------------------------

    /// Key or unkey the transmitter.
    ///
    /// When a PTT port is configured, the serial control line is driven
    /// instead of the rig's protocol.
    pub async fn set_ptt(&mut self, vfo: Vfo, on: bool) -> Result<()> {
        self.ensure_open()?;
        let vfo = self.resolve_vfo(vfo);
        match (self.ptt_type, self.ptt_port.as_mut()) {
            (PttType::DtrSerial, Some(port)) => {
                port.set_dtr(on).await?;
                self.ptt_line_on = on;
            }
            (PttType::RtsSerial, Some(port)) => {
                port.set_rts(on).await?;
                self.ptt_line_on = on;
            }
            (PttType::None, _) => return Err(Error::NotImplemented),
            _ => {
                self.ensure_op(Op::SetPtt)?;
                if let Err(e) = self.backend.set_ptt(vfo, on).await {
                    self.cache.invalidate(CacheField::Ptt, vfo);
                    return Err(e);
                }
            }
        }
        self.cache.put_ptt(vfo, on);
        self.emit(RigEvent::PttChanged { on });
        Ok(())
    }

    /// Query the PTT state.
    pub async fn get_ptt(&mut self, vfo: Vfo) -> Result<bool> {
        self.ensure_open()?;
        let vfo = self.resolve_vfo(vfo);
        if matches!(self.ptt_type, PttType::DtrSerial | PttType::RtsSerial)
            && self.ptt_port.is_some()
        {
            // A keying line has no read-back; report the driven state.
            return Ok(self.ptt_line_on);
        }
        self.ensure_op(Op::GetPtt)?;
        if let Some(on) = self.cache.ptt(vfo) {
            return Ok(on);
        }
        match self.backend.get_ptt(vfo).await {
            Ok(on) => {
                self.cache.put_ptt(vfo, on);
                Ok(on)
            }
            Err(e) => {
                self.cache.invalidate(CacheField::Ptt, vfo);
                Err(e)
            }
        }
    }

    /// Read the squelch/data-carrier-detect state.
    pub async fn get_dcd(&mut self, vfo: Vfo) -> Result<bool> {
        self.ensure_open()?;
        let vfo = self.resolve_vfo(vfo);
        match (self.dcd_type, self.dcd_port.as_mut()) {
            (DcdType::CdSerial, Some(port)) => port.read_cd().await,
            (DcdType::CtsSerial, Some(port)) => port.read_cts().await,
            (DcdType::None, _) => Err(Error::NotImplemented),
            _ => {
                self.ensure_op(Op::GetDcd)?;
                self.backend.get_dcd(vfo).await
            }
        }
    }

    // -----------------------------------------------------------------
    // Split
    // -----------------------------------------------------------------

    /// Enable or disable split operation and select the TX VFO.
    pub async fn set_split_vfo(&mut self, vfo: Vfo, on: bool, tx_vfo: Vfo) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetSplitVfo)?;
        let vfo = self.resolve_vfo(vfo);
        let tx_vfo = self.resolve_vfo(tx_vfo);
        match self.backend.set_split_vfo(vfo, on, tx_vfo).await {
            Ok(()) => {
                self.state.split = on;
                self.state.tx_vfo = tx_vfo;
                self.cache.put_split(vfo, on, tx_vfo);
                self.emit(RigEvent::SplitChanged { on, tx_vfo });
                Ok(())
            }
            Err(e) => {
                self.cache.invalidate(CacheField::Split, vfo);
                Err(e)
            }
        }
    }

    /// Query split state and TX VFO.
    pub async fn get_split_vfo(&mut self, vfo: Vfo) -> Result<(bool, Vfo)> {
        self.ensure_open()?;
        self.ensure_op(Op::GetSplitVfo)?;
        let vfo = self.resolve_vfo(vfo);
        if let Some(entry) = self.cache.split(vfo) {
            return Ok(entry);
        }
        match self.backend.get_split_vfo(vfo).await {
            Ok((on, tx_vfo)) => {
                self.state.split = on;
                self.state.tx_vfo = tx_vfo;
                self.cache.put_split(vfo, on, tx_vfo);
                Ok((on, tx_vfo))
            }
            Err(e) => {
                self.cache.invalidate(CacheField::Split, vfo);
                Err(e)
            }
        }
    }

    /// Set the transmit frequency for split operation.
    pub async fn set_split_freq(&mut self, vfo: Vfo, freq_hz: u64) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetSplitFreq)?;
        let tx = if vfo == Vfo::Current {
            // Split frequency always targets the transmit side.
            self.resolve_vfo(Vfo::Tx)
        } else {
            self.resolve_vfo(vfo)
        };
        if !self.caps.tx_ranges.is_empty() && !self.caps.tx_in_range(freq_hz) {
            return Err(Error::InvalidArgument(format!(
                "{freq_hz} Hz outside transmit range"
            )));
        }
        match self.backend.set_split_freq(tx, freq_hz).await {
            Ok(()) => {
                self.cache.put_freq(tx, freq_hz);
                Ok(())
            }
            Err(e) => {
                self.cache.invalidate(CacheField::Freq, tx);
                Err(e)
            }
        }
    }

    /// Get the transmit frequency for split operation.
    pub async fn get_split_freq(&mut self, vfo: Vfo) -> Result<u64> {
        self.ensure_open()?;
        self.ensure_op(Op::GetSplitFreq)?;
        let tx = if vfo == Vfo::Current {
            self.resolve_vfo(Vfo::Tx)
        } else {
            self.resolve_vfo(vfo)
        };
        if let Some(freq) = self.cache.freq(tx) {
            return Ok(freq);
        }
        match self.backend.get_split_freq(tx).await {
            Ok(freq) => {
                self.cache.put_freq(tx, freq);
                Ok(freq)
            }
            Err(e) => {
                self.cache.invalidate(CacheField::Freq, tx);
                Err(e)
            }
        }
    }

    /// Set the transmit mode for split operation.
    pub async fn set_split_mode(
        &mut self,
        vfo: Vfo,
        mode: Mode,
        passband_hz: Option<u64>,
    ) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetSplitMode)?;
        let tx = if vfo == Vfo::Current {
            self.resolve_vfo(Vfo::Tx)
        } else {
            self.resolve_vfo(vfo)
        };
        match self.backend.set_split_mode(tx, mode, passband_hz).await {
            Ok(()) => {
                let pb = passband_hz.unwrap_or_else(|| self.default_passband(mode));
                self.cache.put_mode(tx, mode, pb);
                Ok(())
            }
            Err(e) => {
                self.cache.invalidate(CacheField::Mode, tx);
                Err(e)
            }
        }
    }

    /// Get the transmit mode for split operation.
    pub async fn get_split_mode(&mut self, vfo: Vfo) -> Result<(Mode, u64)> {
        self.ensure_open()?;
        self.ensure_op(Op::GetSplitMode)?;
        let tx = if vfo == Vfo::Current {
            self.resolve_vfo(Vfo::Tx)
        } else {
            self.resolve_vfo(vfo)
        };
        if let Some(entry) = self.cache.mode(tx) {
            return Ok(entry);
        }
        match self.backend.get_split_mode(tx).await {
            Ok((mode, pb)) => {
                self.cache.put_mode(tx, mode, pb);
                Ok((mode, pb))
            }
            Err(e) => {
                self.cache.invalidate(CacheField::Mode, tx);
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------
    // RIT / XIT / tuning step
    // -----------------------------------------------------------------

    /// Set the RIT offset in hertz (0 disables RIT).
    pub async fn set_rit(&mut self, vfo: Vfo, offset_hz: i32) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetRit)?;
        let vfo = self.resolve_vfo(vfo);
        if self.caps.max_rit_hz > 0 && offset_hz.abs() > self.caps.max_rit_hz {
            return Err(Error::InvalidArgument(format!(
                "RIT offset {offset_hz} exceeds ±{}",
                self.caps.max_rit_hz
            )));
        }
        self.backend.set_rit(vfo, offset_hz).await
    }

    /// Get the RIT offset in hertz.
    pub async fn get_rit(&mut self, vfo: Vfo) -> Result<i32> {
        self.ensure_open()?;
        self.ensure_op(Op::GetRit)?;
        let vfo = self.resolve_vfo(vfo);
        self.backend.get_rit(vfo).await
    }

    /// Set the XIT offset in hertz (0 disables XIT).
    pub async fn set_xit(&mut self, vfo: Vfo, offset_hz: i32) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetXit)?;
        let vfo = self.resolve_vfo(vfo);
        if self.caps.max_xit_hz > 0 && offset_hz.abs() > self.caps.max_xit_hz {
            return Err(Error::InvalidArgument(format!(
                "XIT offset {offset_hz} exceeds ±{}",
                self.caps.max_xit_hz
            )));
        }
        self.backend.set_xit(vfo, offset_hz).await
    }

    /// Get the XIT offset in hertz.
    pub async fn get_xit(&mut self, vfo: Vfo) -> Result<i32> {
        self.ensure_open()?;
        self.ensure_op(Op::GetXit)?;
        let vfo = self.resolve_vfo(vfo);
        self.backend.get_xit(vfo).await
    }

    /// Set the tuning step in hertz.
    pub async fn set_tuning_step(&mut self, vfo: Vfo, step_hz: u64) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetTuningStep)?;
        let vfo = self.resolve_vfo(vfo);
        if !self.caps.tuning_steps.is_empty()
            && !self.caps.tuning_steps.iter().any(|t| t.step_hz == step_hz)
        {
            return Err(Error::InvalidArgument(format!(
                "unsupported tuning step {step_hz} Hz"
            )));
        }
        self.backend.set_tuning_step(vfo, step_hz).await
    }

    /// Get the tuning step in hertz.
    pub async fn get_tuning_step(&mut self, vfo: Vfo) -> Result<u64> {
        self.ensure_open()?;
        self.ensure_op(Op::GetTuningStep)?;
        let vfo = self.resolve_vfo(vfo);
        self.backend.get_tuning_step(vfo).await
    }

    // -----------------------------------------------------------------
    // Levels / functions / parameters
    // -----------------------------------------------------------------

    /// Set a level.
    pub async fn set_level(&mut self, vfo: Vfo, level: Level, value: f32) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetLevel)?;
        if self.caps.has_set_level & level.bit() == 0 {
            return Err(Error::NotImplemented);
        }
        if level.is_float() && !(0.0..=1.0).contains(&value) {
            return Err(Error::InvalidArgument(format!(
                "level {level} value {value} outside 0.0–1.0"
            )));
        }
        let vfo = self.resolve_vfo(vfo);
        self.backend.set_level(vfo, level, value).await
    }

    /// Read a level.
    pub async fn get_level(&mut self, vfo: Vfo, level: Level) -> Result<f32> {
        self.ensure_open()?;
        self.ensure_op(Op::GetLevel)?;
        if self.caps.has_get_level & level.bit() == 0 {
            return Err(Error::NotImplemented);
        }
        let vfo = self.resolve_vfo(vfo);
        self.backend.get_level(vfo, level).await
    }

    /// Switch a function on or off.
    pub async fn set_func(&mut self, vfo: Vfo, func: Func, on: bool) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetFunc)?;
        if self.caps.has_set_func & func.bit() == 0 {
            return Err(Error::NotImplemented);
        }
        let vfo = self.resolve_vfo(vfo);
        self.backend.set_func(vfo, func, on).await
    }

    /// Query a function state.
    pub async fn get_func(&mut self, vfo: Vfo, func: Func) -> Result<bool> {
        self.ensure_open()?;
        self.ensure_op(Op::GetFunc)?;
        if self.caps.has_get_func & func.bit() == 0 {
            return Err(Error::NotImplemented);
        }
        let vfo = self.resolve_vfo(vfo);
        self.backend.get_func(vfo, func).await
    }

    /// Set a rig-global parameter.
    pub async fn set_parm(&mut self, parm: Parm, value: f32) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetParm)?;
        if self.caps.has_set_parm & parm.bit() == 0 {
            return Err(Error::NotImplemented);
        }
        self.backend.set_parm(parm, value).await
    }

    /// Read a rig-global parameter.
    pub async fn get_parm(&mut self, parm: Parm) -> Result<f32> {
        self.ensure_open()?;
        self.ensure_op(Op::GetParm)?;
        if self.caps.has_get_parm & parm.bit() == 0 {
            return Err(Error::NotImplemented);
        }
        self.backend.get_parm(parm).await
    }

    // -----------------------------------------------------------------
    // Antenna / memory
    // -----------------------------------------------------------------

    /// Select an antenna port (1-based).
    pub async fn set_ant(&mut self, vfo: Vfo, antenna: u8) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetAnt)?;
        if antenna == 0 || antenna > self.caps.antenna_count {
            return Err(Error::InvalidArgument(format!(
                "antenna {antenna} of {}",
                self.caps.antenna_count
            )));
        }
        let vfo = self.resolve_vfo(vfo);
        self.backend.set_ant(vfo, antenna).await
    }

    /// Query the selected antenna port.
    pub async fn get_ant(&mut self, vfo: Vfo) -> Result<u8> {
        self.ensure_open()?;
        self.ensure_op(Op::GetAnt)?;
        let vfo = self.resolve_vfo(vfo);
        self.backend.get_ant(vfo).await
    }

    /// Recall a memory channel.
    pub async fn set_mem(&mut self, vfo: Vfo, channel: i32) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetMem)?;
        if channel < 0
            || (self.caps.memory_channels > 0 && channel as u32 >= self.caps.memory_channels)
        {
            return Err(Error::InvalidArgument(format!(
                "memory channel {channel} out of range"
            )));
        }
        let vfo = self.resolve_vfo(vfo);
        self.backend.set_mem(vfo, channel).await
    }

    /// Query the current memory channel.
    pub async fn get_mem(&mut self, vfo: Vfo) -> Result<i32> {
        self.ensure_open()?;
        self.ensure_op(Op::GetMem)?;
        let vfo = self.resolve_vfo(vfo);
        self.backend.get_mem(vfo).await
    }

    // -----------------------------------------------------------------
    // Tones
    // -----------------------------------------------------------------

    /// Set the CTCSS tone in tenths of hertz.
    pub async fn set_ctcss_tone(&mut self, vfo: Vfo, tone: u32) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetCtcss)?;
        if !self.caps.ctcss_tones.is_empty() && !self.caps.ctcss_tones.contains(&tone) {
            return Err(Error::InvalidArgument(format!(
                "CTCSS tone {tone} not in tone list"
            )));
        }
        let vfo = self.resolve_vfo(vfo);
        self.backend.set_ctcss_tone(vfo, tone).await
    }

    /// Get the CTCSS tone in tenths of hertz.
    pub async fn get_ctcss_tone(&mut self, vfo: Vfo) -> Result<u32> {
        self.ensure_open()?;
        self.ensure_op(Op::GetCtcss)?;
        let vfo = self.resolve_vfo(vfo);
        self.backend.get_ctcss_tone(vfo).await
    }

    /// Set the DCS code.
    pub async fn set_dcs_code(&mut self, vfo: Vfo, code: u32) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetDcs)?;
        if !self.caps.dcs_codes.is_empty() && !self.caps.dcs_codes.contains(&code) {
            return Err(Error::InvalidArgument(format!(
                "DCS code {code} not in code list"
            )));
        }
        let vfo = self.resolve_vfo(vfo);
        self.backend.set_dcs_code(vfo, code).await
    }

    /// Get the DCS code.
    pub async fn get_dcs_code(&mut self, vfo: Vfo) -> Result<u32> {
        self.ensure_open()?;
        self.ensure_op(Op::GetDcs)?;
        let vfo = self.resolve_vfo(vfo);
        self.backend.get_dcs_code(vfo).await
    }

    // -----------------------------------------------------------------
    // Keying
    // -----------------------------------------------------------------

    /// Send a DTMF digit string.
    pub async fn send_dtmf(&mut self, vfo: Vfo, digits: &str) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SendDtmf)?;
        if digits.is_empty()
            || !digits
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, 'A'..='D' | '*' | '#'))
        {
            return Err(Error::InvalidArgument(format!(
                "bad DTMF digit string: {digits:?}"
            )));
        }
        let vfo = self.resolve_vfo(vfo);
        self.backend.send_dtmf(vfo, digits).await
    }

    /// Send a text message as Morse via the rig's keyer.
    pub async fn send_morse(&mut self, vfo: Vfo, message: &str) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SendMorse)?;
        if message.is_empty() {
            return Err(Error::InvalidArgument("empty Morse message".into()));
        }
        let vfo = self.resolve_vfo(vfo);
        self.backend.send_morse(vfo, message).await
    }

    // -----------------------------------------------------------------
    // Power state
    // -----------------------------------------------------------------

    /// Set the rig's power state.
    pub async fn set_powerstat(&mut self, status: PowerStat) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetPowerStat)?;
        match self.backend.set_powerstat(status).await {
            Ok(()) => {
                self.cache.put_powerstat(status);
                self.emit(RigEvent::PowerStatChanged { status });
                Ok(())
            }
            Err(e) => {
                self.cache.invalidate(CacheField::PowerStat, Vfo::Current);
                Err(e)
            }
        }
    }

    /// Query the rig's power state.
    pub async fn get_powerstat(&mut self) -> Result<PowerStat> {
        self.ensure_open()?;
        self.ensure_op(Op::GetPowerStat)?;
        if let Some(status) = self.cache.powerstat() {
            return Ok(status);
        }
        match self.backend.get_powerstat().await {
            Ok(status) => {
                self.cache.put_powerstat(status);
                Ok(status)
            }
            Err(e) => {
                self.cache.invalidate(CacheField::PowerStat, Vfo::Current);
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------
    // Conversions / VFO ops / lock
    // -----------------------------------------------------------------

    /// Convert a normalized power setting (0.0–1.0) to milliwatts.
    pub async fn power2mw(&mut self, power: f32, freq_hz: u64, mode: Mode) -> Result<u64> {
        self.ensure_open()?;
        self.ensure_op(Op::Power2Mw)?;
        if !(0.0..=1.0).contains(&power) {
            return Err(Error::InvalidArgument(format!(
                "power {power} outside 0.0–1.0"
            )));
        }
        self.backend.power2mw(power, freq_hz, mode).await
    }

    /// Convert milliwatts to a normalized power setting (0.0–1.0).
    pub async fn mw2power(&mut self, mw: u64, freq_hz: u64, mode: Mode) -> Result<f32> {
        self.ensure_open()?;
        self.ensure_op(Op::Mw2Power)?;
        self.backend.mw2power(mw, freq_hz, mode).await
    }

    /// Perform a VFO memory/band operation.
    pub async fn vfo_op(&mut self, vfo: Vfo, op: VfoOp) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::VfoOp)?;
        if self.caps.vfo_ops & op.bit() == 0 {
            return Err(Error::NotImplemented);
        }
        let vfo = self.resolve_vfo(vfo);
        let result = self.backend.vfo_op(vfo, op).await;
        if result.is_ok() {
            // Frequencies moved underneath us; drop what we think we know.
            self.cache.invalidate(CacheField::Freq, Vfo::A);
            self.cache.invalidate(CacheField::Freq, Vfo::B);
            self.cache.invalidate(CacheField::Freq, vfo);
        }
        result
    }

    /// Lock or unlock the front panel / remote set commands.
    pub async fn set_lock_mode(&mut self, locked: bool) -> Result<()> {
        self.ensure_open()?;
        self.ensure_op(Op::SetLockMode)?;
        self.backend.set_lock_mode(locked).await
    }

    /// Query the lock state.
    pub async fn get_lock_mode(&mut self) -> Result<bool> {
        self.ensure_open()?;
        self.ensure_op(Op::GetLockMode)?;
        self.backend.get_lock_mode().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::time::{advance, Duration};

    use crate::caps::OpMask;
    use crate::types::{FreqRange, ALL_MODES};

    /// Counting backend for dispatch-layer tests: remembers a frequency
    /// per VFO, counts calls, and can be told to fail.
    #[derive(Default)]
    struct CountingBackend {
        freq: std::collections::HashMap<Vfo, u64>,
        get_freq_calls: Arc<AtomicU32>,
        set_freq_calls: Arc<AtomicU32>,
        fail: Arc<AtomicBool>,
        close_fails: bool,
    }

    #[async_trait]
    impl Backend for CountingBackend {
        async fn set_freq(&mut self, vfo: Vfo, freq_hz: u64) -> Result<()> {
            self.set_freq_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Io("injected".into()));
            }
            self.freq.insert(vfo, freq_hz);
            Ok(())
        }

        async fn get_freq(&mut self, vfo: Vfo) -> Result<u64> {
            self.get_freq_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Io("injected".into()));
            }
            Ok(self.freq.get(&vfo).copied().unwrap_or(14_074_000))
        }

        async fn get_vfo(&mut self) -> Result<Vfo> {
            Ok(Vfo::A)
        }

        async fn set_vfo(&mut self, _vfo: Vfo) -> Result<()> {
            Ok(())
        }

        async fn set_split_vfo(&mut self, _vfo: Vfo, _on: bool, _tx: Vfo) -> Result<()> {
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            if self.close_fails {
                Err(Error::Io("sign-off failed".into()))
            } else {
                Ok(())
            }
        }
    }

    fn test_caps() -> Arc<RigCaps> {
        Arc::new(RigCaps {
            model_id: 9999,
            model_name: "Test",
            mfg_name: "Test",
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
                start_hz: 1_800_000,
                end_hz: 29_700_000,
                modes: Mode::mask(ALL_MODES),
                low_power_mw: 1_000,
                high_power_mw: 100_000,
                vfos: 0x3,
                antennas: 0x1,
            }],
            ops: OpMask::from_ops(&[
                Op::SetFreq,
                Op::GetFreq,
                Op::SetVfo,
                Op::GetVfo,
                Op::SetSplitVfo,
            ]),
            ..RigCaps::default()
        })
    }

    /// A rig already in the `Opened` phase, skipping the lifecycle calls.
    fn opened_rig(backend: CountingBackend) -> Rig {
        let mut rig = Rig::new(test_caps(), Box::new(backend));
        rig.phase = Phase::Opened;
        rig
    }

    #[tokio::test]
    async fn lifecycle_order_enforced() {
        let mut rig = Rig::new(test_caps(), Box::new(CountingBackend::default()));
        assert_eq!(rig.phase(), Phase::Uninitialized);

        // open before init is invalid
        assert!(matches!(rig.open().await, Err(Error::InvalidState(_))));
        // operations before open are invalid
        assert!(matches!(
            rig.get_freq(Vfo::A).await,
            Err(Error::InvalidState(_))
        ));

        rig.init().await.unwrap();
        assert_eq!(rig.phase(), Phase::Initialized);
        assert!(matches!(rig.init().await, Err(Error::InvalidState(_))));

        rig.open().await.unwrap();
        assert_eq!(rig.phase(), Phase::Opened);

        rig.close().await.unwrap();
        assert_eq!(rig.phase(), Phase::Closed);

        // reopen from Closed is allowed
        rig.open().await.unwrap();
        rig.close().await.unwrap();

        rig.cleanup().await.unwrap();
        assert_eq!(rig.phase(), Phase::Cleaned);
        assert!(matches!(rig.cleanup().await, Err(Error::InvalidState(_))));
        assert!(matches!(rig.open().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn close_never_fails_fatally() {
        let backend = CountingBackend {
            close_fails: true,
            ..CountingBackend::default()
        };
        let mut rig = Rig::new(test_caps(), Box::new(backend));
        rig.init().await.unwrap();
        rig.open().await.unwrap();
        assert!(rig.close().await.is_ok());
        assert_eq!(rig.phase(), Phase::Closed);
    }

    #[tokio::test]
    async fn unsupported_op_never_reaches_backend() {
        let backend = CountingBackend::default();
        let calls = backend.get_freq_calls.clone();
        let mut rig = opened_rig(backend);

        // GetPtt is not in the test caps.
        assert!(matches!(
            rig.get_ptt(Vfo::A).await,
            Err(Error::NotImplemented)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_serves_fresh_reads() {
        let backend = CountingBackend::default();
        let calls = backend.get_freq_calls.clone();
        let mut rig = opened_rig(backend);

        let f1 = rig.get_freq(Vfo::A).await.unwrap();
        let f2 = rig.get_freq(Vfo::A).await.unwrap();
        assert_eq!(f1, f2);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "second read from cache");

        advance(Duration::from_millis(600)).await;
        let _ = rig.get_freq(Vfo::A).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2, "stale read re-dispatches");
    }

    #[tokio::test(start_paused = true)]
    async fn set_freq_is_write_through() {
        let backend = CountingBackend::default();
        let gets = backend.get_freq_calls.clone();
        let mut rig = opened_rig(backend);

        rig.set_freq(Vfo::A, 7_040_000).await.unwrap();
        let f = rig.get_freq(Vfo::A).await.unwrap();
        assert_eq!(f, 7_040_000);
        assert_eq!(gets.load(Ordering::SeqCst), 0, "read served from write-through");
    }

    #[tokio::test(start_paused = true)]
    async fn backend_error_invalidates_cache() {
        let backend = CountingBackend::default();
        let fail = backend.fail.clone();
        let calls = backend.get_freq_calls.clone();
        let mut rig = opened_rig(backend);

        rig.set_freq(Vfo::A, 7_040_000).await.unwrap();
        advance(Duration::from_millis(600)).await;

        fail.store(true, Ordering::SeqCst);
        assert!(rig.get_freq(Vfo::A).await.is_err());

        fail.store(false, Ordering::SeqCst);
        let f = rig.get_freq(Vfo::A).await.unwrap();
        assert_eq!(f, 7_040_000);
        // Two real dispatches: the failed one and the recovery.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn set_freq_out_of_range_rejected_without_dispatch() {
        let backend = CountingBackend::default();
        let sets = backend.set_freq_calls.clone();
        let mut rig = opened_rig(backend);

        let r = rig.set_freq(Vfo::A, 1_296_000_000).await;
        assert!(matches!(r, Err(Error::InvalidArgument(_))));
        assert_eq!(sets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn resolve_vfo_always_concrete() {
        let mut rig = opened_rig(CountingBackend::default());

        assert_eq!(rig.resolve_vfo(Vfo::Current), Vfo::A);
        assert!(!rig.resolve_vfo(Vfo::Current).is_logical());
        assert_eq!(rig.resolve_vfo(Vfo::Rx), Vfo::A);
        // Not in split: TX resolves to the current VFO.
        assert_eq!(rig.resolve_vfo(Vfo::Tx), Vfo::A);

        rig.set_vfo(Vfo::B).await.unwrap();
        assert_eq!(rig.resolve_vfo(Vfo::Current), Vfo::B);
    }

    #[tokio::test]
    async fn resolve_tx_in_split() {
        let mut rig = opened_rig(CountingBackend::default());
        rig.set_split_vfo(Vfo::A, true, Vfo::B).await.unwrap();
        assert_eq!(rig.resolve_vfo(Vfo::Tx), Vfo::B);

        rig.set_split_vfo(Vfo::A, false, Vfo::B).await.unwrap();
        assert_eq!(rig.resolve_vfo(Vfo::Tx), Vfo::A);
    }

    #[tokio::test(start_paused = true)]
    async fn twiddle_suppresses_polling() {
        let backend = CountingBackend::default();
        let calls = backend.get_freq_calls.clone();
        let mut rig = opened_rig(backend);
        rig.set_twiddle_window(3000);
        // Make the cache expire well before the twiddle window.
        rig.set_cache_timeout(CacheField::Freq, 100);

        rig.note_external_freq_change(Vfo::A, 14_200_000);

        advance(Duration::from_millis(200)).await;
        // Cache is stale, but the twiddle window still holds the last value.
        let f = rig.get_freq(Vfo::A).await.unwrap();
        assert_eq!(f, 14_200_000);
        assert_eq!(calls.load(Ordering::SeqCst), 0, "poll suppressed inside window");

        advance(Duration::from_millis(3000)).await;
        let _ = rig.get_freq(Vfo::A).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1, "poll resumes after window");
    }

    #[tokio::test(start_paused = true)]
    async fn twiddle_note_refreshes_cache_entry() {
        let mut rig = opened_rig(CountingBackend::default());
        rig.set_twiddle_window(3000);
        rig.note_external_freq_change(Vfo::B, 7_030_000);
        assert_eq!(rig.get_freq(Vfo::B).await.unwrap(), 7_030_000);
    }

    #[tokio::test]
    async fn events_emitted_on_set() {
        let mut rig = opened_rig(CountingBackend::default());
        let mut events = rig.subscribe();

        rig.set_freq(Vfo::A, 14_074_000).await.unwrap();
        match events.try_recv().unwrap() {
            RigEvent::FreqChanged { vfo, freq_hz } => {
                assert_eq!(vfo, Vfo::A);
                assert_eq!(freq_hz, 14_074_000);
            }
            other => panic!("expected FreqChanged, got {other:?}"),
        }
    }
}
