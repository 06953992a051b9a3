//! Instrumented backend for dispatch- and daemon-level testing.
//!
//! [`StubBackend`] implements enough of the backend contract to exercise
//! the dispatch core and the daemon, while exposing shared [`StubStats`]
//! the test keeps after the backend moves into a `Rig`:
//!
//! - call counters per operation class;
//! - injectable failures (`fail_open_times`, `fail_dispatch_times`);
//! - transaction-overlap detection: every dispatch marks an in-flight
//!   window (with an optional artificial delay), and a second dispatch
//!   entering that window trips `overlap_detected`. This is how the
//!   daemon's mutual-exclusion discipline is verified.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use rigkit_core::backend::Backend;
use rigkit_core::caps::{Op, OpMask, RigCaps};
use rigkit_core::error::{Error, Result};
use rigkit_core::types::{
    FilterEntry, FreqRange, Func, Level, Mode, Parm, PowerStat, TuningStep, Vfo, ALL_MODES,
};

/// Shared observation point for a [`StubBackend`] that has been moved
/// into a `Rig`.
#[derive(Debug, Default)]
pub struct StubStats {
    /// `open` calls.
    pub open_calls: AtomicU32,
    /// `close` calls.
    pub close_calls: AtomicU32,
    /// `set_freq` calls.
    pub set_freq_calls: AtomicU32,
    /// `get_freq` calls.
    pub get_freq_calls: AtomicU32,
    /// Remaining injected `open` failures.
    pub fail_open_times: AtomicU32,
    /// Remaining injected dispatch failures (set/get freq).
    pub fail_dispatch_times: AtomicU32,
    /// Set if two dispatches ever overlapped in time.
    pub overlap_detected: AtomicBool,
    in_flight: AtomicBool,
}

impl StubStats {
    /// Inject `n` upcoming dispatch failures (surfaced as hard `Io`
    /// errors).
    pub fn fail_dispatches(&self, n: u32) {
        self.fail_dispatch_times.store(n, Ordering::SeqCst);
    }

    /// Inject `n` upcoming `open` failures.
    pub fn fail_opens(&self, n: u32) {
        self.fail_open_times.store(n, Ordering::SeqCst);
    }

    fn take_failure(&self, counter: &AtomicU32) -> bool {
        loop {
            let n = counter.load(Ordering::SeqCst);
            if n == 0 {
                return false;
            }
            if counter
                .compare_exchange(n, n - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }
}

/// An in-memory, instrumented backend.
pub struct StubBackend {
    stats: Arc<StubStats>,
    /// Artificial time spent inside each dispatch, to widen the window
    /// the overlap detector watches.
    dispatch_delay: Duration,
    freq: HashMap<Vfo, u64>,
    mode: HashMap<Vfo, (Mode, u64)>,
    vfo: Vfo,
    ptt: bool,
    split: (bool, Vfo),
    powerstat: PowerStat,
}

impl StubBackend {
    /// Create a stub and the stats handle observing it.
    pub fn new() -> (Self, Arc<StubStats>) {
        Self::with_dispatch_delay(Duration::ZERO)
    }

    /// Create a stub whose dispatches take `delay` of wall time.
    pub fn with_dispatch_delay(delay: Duration) -> (Self, Arc<StubStats>) {
        let stats = Arc::new(StubStats::default());
        let backend = StubBackend {
            stats: stats.clone(),
            dispatch_delay: delay,
            freq: HashMap::new(),
            mode: HashMap::new(),
            vfo: Vfo::A,
            ptt: false,
            split: (false, Vfo::B),
            powerstat: PowerStat::On,
        };
        (backend, stats)
    }

    /// A capability table advertising everything the stub implements.
    pub fn caps() -> Arc<RigCaps> {
        Arc::new(RigCaps {
            model_id: 9990,
            model_name: "Stub",
            mfg_name: "rigkit-test-harness",
            rx_ranges: vec![FreqRange {
                start_hz: 100_000,
                end_hz: 470_000_000,
                modes: Mode::mask(ALL_MODES),
                low_power_mw: -1,
                high_power_mw: -1,
                vfos: Vfo::A.bit() | Vfo::B.bit(),
                antennas: 0x1,
            }],
            tx_ranges: vec![FreqRange {
                start_hz: 1_800_000,
                end_hz: 450_000_000,
                modes: Mode::mask(ALL_MODES),
                low_power_mw: 1_000,
                high_power_mw: 100_000,
                vfos: Vfo::A.bit() | Vfo::B.bit(),
                antennas: 0x1,
            }],
            tuning_steps: vec![TuningStep {
                modes: Mode::mask(ALL_MODES),
                step_hz: 10,
            }],
            filters: vec![FilterEntry {
                modes: Mode::mask(ALL_MODES),
                width_hz: 2400,
            }],
            has_get_level: Level::mask(rigkit_core::types::ALL_LEVELS),
            has_set_level: Level::mask(rigkit_core::types::ALL_LEVELS),
            has_get_func: Func::mask(rigkit_core::types::ALL_FUNCS),
            has_set_func: Func::mask(rigkit_core::types::ALL_FUNCS),
            has_get_parm: Parm::mask(rigkit_core::types::ALL_PARMS),
            has_set_parm: Parm::mask(rigkit_core::types::ALL_PARMS),
            ops: OpMask::from_ops(&[
                Op::SetFreq,
                Op::GetFreq,
                Op::SetMode,
                Op::GetMode,
                Op::SetVfo,
                Op::GetVfo,
                Op::SetPtt,
                Op::GetPtt,
                Op::SetSplitVfo,
                Op::GetSplitVfo,
                Op::SetPowerStat,
                Op::GetPowerStat,
            ]),
            ..RigCaps::default()
        })
    }

    /// Enter the instrumented dispatch window; trip the overlap flag if
    /// someone else is already inside.
    async fn dispatch_window(&self) {
        if self.stats.in_flight.swap(true, Ordering::SeqCst) {
            self.stats.overlap_detected.store(true, Ordering::SeqCst);
        }
        if !self.dispatch_delay.is_zero() {
            tokio::time::sleep(self.dispatch_delay).await;
        }
    }

    fn leave_window(&self) {
        self.stats.in_flight.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Backend for StubBackend {
    async fn open(&mut self) -> Result<()> {
        self.stats.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.stats.take_failure(&self.stats.fail_open_times) {
            return Err(Error::Io("injected open failure".into()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.stats.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_freq(&mut self, vfo: Vfo, freq_hz: u64) -> Result<()> {
        self.dispatch_window().await;
        self.stats.set_freq_calls.fetch_add(1, Ordering::SeqCst);
        let failed = self.stats.take_failure(&self.stats.fail_dispatch_times);
        if !failed {
            self.freq.insert(vfo, freq_hz);
        }
        self.leave_window();
        if failed {
            return Err(Error::Io("injected dispatch failure".into()));
        }
        Ok(())
    }

    async fn get_freq(&mut self, vfo: Vfo) -> Result<u64> {
        self.dispatch_window().await;
        self.stats.get_freq_calls.fetch_add(1, Ordering::SeqCst);
        let failed = self.stats.take_failure(&self.stats.fail_dispatch_times);
        let freq = self.freq.get(&vfo).copied().unwrap_or(14_074_000);
        self.leave_window();
        if failed {
            return Err(Error::Io("injected dispatch failure".into()));
        }
        Ok(freq)
    }

    async fn set_mode(&mut self, vfo: Vfo, mode: Mode, passband_hz: Option<u64>) -> Result<()> {
        self.mode.insert(vfo, (mode, passband_hz.unwrap_or(2400)));
        Ok(())
    }

    async fn get_mode(&mut self, vfo: Vfo) -> Result<(Mode, u64)> {
        Ok(self.mode.get(&vfo).copied().unwrap_or((Mode::USB, 2400)))
    }

    async fn set_vfo(&mut self, vfo: Vfo) -> Result<()> {
        self.vfo = vfo;
        Ok(())
    }

    async fn get_vfo(&mut self) -> Result<Vfo> {
        Ok(self.vfo)
    }

    async fn set_ptt(&mut self, _vfo: Vfo, on: bool) -> Result<()> {
        self.ptt = on;
        Ok(())
    }

    async fn get_ptt(&mut self, _vfo: Vfo) -> Result<bool> {
        Ok(self.ptt)
    }

    async fn set_split_vfo(&mut self, _vfo: Vfo, on: bool, tx_vfo: Vfo) -> Result<()> {
        self.split = (on, tx_vfo);
        Ok(())
    }

    async fn get_split_vfo(&mut self, _vfo: Vfo) -> Result<(bool, Vfo)> {
        Ok(self.split)
    }

    async fn set_powerstat(&mut self, status: PowerStat) -> Result<()> {
        self.powerstat = status;
        Ok(())
    }

    async fn get_powerstat(&mut self) -> Result<PowerStat> {
        Ok(self.powerstat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counters_track_calls() {
        let (mut stub, stats) = StubBackend::new();
        stub.open().await.unwrap();
        stub.set_freq(Vfo::A, 7_000_000).await.unwrap();
        let f = stub.get_freq(Vfo::A).await.unwrap();
        assert_eq!(f, 7_000_000);
        assert_eq!(stats.open_calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.set_freq_calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.get_freq_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let (mut stub, stats) = StubBackend::new();
        stats.fail_dispatches(2);

        assert!(stub.set_freq(Vfo::A, 1_900_000).await.is_err());
        assert!(stub.set_freq(Vfo::A, 1_900_000).await.is_err());
        assert!(stub.set_freq(Vfo::A, 1_900_000).await.is_ok());
    }

    #[tokio::test]
    async fn open_failures_are_consumed() {
        let (mut stub, stats) = StubBackend::new();
        stats.fail_opens(1);
        assert!(stub.open().await.is_err());
        assert!(stub.open().await.is_ok());
        assert_eq!(stats.open_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn sequential_dispatches_do_not_overlap() {
        let (mut stub, stats) = StubBackend::with_dispatch_delay(Duration::from_millis(5));
        stub.set_freq(Vfo::A, 7_000_000).await.unwrap();
        stub.get_freq(Vfo::A).await.unwrap();
        assert!(!stats.overlap_detected.load(Ordering::SeqCst));
    }
}
