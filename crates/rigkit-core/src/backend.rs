//! The `Backend` trait -- the contract between the dispatch core and a
//! hardware driver.
//!
//! A backend is one model family's command/response encoder. It owns its
//! transport(s) and any driver-private state; both are created in
//! [`init`](Backend::init)/[`open`](Backend::open) and released in
//! [`close`](Backend::close)/[`cleanup`](Backend::cleanup). The core never
//! inspects backend internals -- it only calls through this trait, and only
//! for operations listed in the model's [`OpMask`](crate::caps::OpMask).
//!
//! Every default method body returns `NotImplemented` as a backstop, but
//! the dispatch core checks the capability table first, so a correctly
//! registered backend never receives a call for an operation it did not
//! declare.
//!
//! Methods take `&mut self`: a handle is driven by exactly one caller at a
//! time (the daemon serializes connections with a single lock), so backends
//! need no interior locking of their own.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{Func, Level, Mode, Parm, PowerStat, Vfo, VfoOp};

/// One model family's driver: a command/response encoder behind the
/// dispatch core.
///
/// All VFO arguments are concrete by the time a backend sees them --
/// logical selectors (`currVFO`, `RX`, `TX`) are resolved by the dispatch
/// layer. A backend must not block longer than its configured
/// timeout × retry budget.
#[async_trait]
pub trait Backend: Send {
    /// Allocate driver-private state. Called exactly once per handle,
    /// before `open`.
    async fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Open transports and perform any protocol handshake.
    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Sign off and close transports.
    ///
    /// Sign-off failures are reported so the caller can log them, but the
    /// dispatch layer treats `close` as non-fatal.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release driver-private state. Always succeeds after `init`.
    async fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set the frequency of a VFO in hertz.
    async fn set_freq(&mut self, _vfo: Vfo, _freq_hz: u64) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Get the frequency of a VFO in hertz.
    async fn get_freq(&mut self, _vfo: Vfo) -> Result<u64> {
        Err(Error::NotImplemented)
    }

    /// Set the operating mode and passband of a VFO.
    ///
    /// `passband_hz` of `None` selects the rig's default filter for the
    /// mode.
    async fn set_mode(&mut self, _vfo: Vfo, _mode: Mode, _passband_hz: Option<u64>) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Get the operating mode and passband of a VFO.
    async fn get_mode(&mut self, _vfo: Vfo) -> Result<(Mode, u64)> {
        Err(Error::NotImplemented)
    }

    /// Select the active VFO.
    async fn set_vfo(&mut self, _vfo: Vfo) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Query the active VFO.
    async fn get_vfo(&mut self) -> Result<Vfo> {
        Err(Error::NotImplemented)
    }

    /// Key or unkey the transmitter.
    async fn set_ptt(&mut self, _vfo: Vfo, _on: bool) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Query the PTT state.
    async fn get_ptt(&mut self, _vfo: Vfo) -> Result<bool> {
        Err(Error::NotImplemented)
    }

    /// Read the squelch/data-carrier-detect state.
    async fn get_dcd(&mut self, _vfo: Vfo) -> Result<bool> {
        Err(Error::NotImplemented)
    }

    /// Enable or disable split operation and select the TX VFO.
    async fn set_split_vfo(&mut self, _vfo: Vfo, _on: bool, _tx_vfo: Vfo) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Query split state and TX VFO.
    async fn get_split_vfo(&mut self, _vfo: Vfo) -> Result<(bool, Vfo)> {
        Err(Error::NotImplemented)
    }

    /// Set the transmit frequency for split operation.
    async fn set_split_freq(&mut self, _vfo: Vfo, _freq_hz: u64) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Get the transmit frequency for split operation.
    async fn get_split_freq(&mut self, _vfo: Vfo) -> Result<u64> {
        Err(Error::NotImplemented)
    }

    /// Set the transmit mode for split operation.
    async fn set_split_mode(
        &mut self,
        _vfo: Vfo,
        _mode: Mode,
        _passband_hz: Option<u64>,
    ) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Get the transmit mode for split operation.
    async fn get_split_mode(&mut self, _vfo: Vfo) -> Result<(Mode, u64)> {
        Err(Error::NotImplemented)
    }

    /// Set the RIT offset in hertz (0 disables).
    async fn set_rit(&mut self, _vfo: Vfo, _offset_hz: i32) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Get the RIT offset in hertz.
    async fn get_rit(&mut self, _vfo: Vfo) -> Result<i32> {
        Err(Error::NotImplemented)
    }

    /// Set the XIT offset in hertz (0 disables).
    async fn set_xit(&mut self, _vfo: Vfo, _offset_hz: i32) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Get the XIT offset in hertz.
    async fn get_xit(&mut self, _vfo: Vfo) -> Result<i32> {
        Err(Error::NotImplemented)
    }

    /// Set the tuning step in hertz.
    async fn set_tuning_step(&mut self, _vfo: Vfo, _step_hz: u64) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Get the tuning step in hertz.
    async fn get_tuning_step(&mut self, _vfo: Vfo) -> Result<u64> {
        Err(Error::NotImplemented)
    }

    /// Set a level. Float levels are normalized 0.0–1.0; integer levels
    /// carry whole numbers.
    async fn set_level(&mut self, _vfo: Vfo, _level: Level, _value: f32) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Read a level.
    async fn get_level(&mut self, _vfo: Vfo, _level: Level) -> Result<f32> {
        Err(Error::NotImplemented)
    }

    /// Switch a function on or off.
    async fn set_func(&mut self, _vfo: Vfo, _func: Func, _on: bool) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Query a function state.
    async fn get_func(&mut self, _vfo: Vfo, _func: Func) -> Result<bool> {
        Err(Error::NotImplemented)
    }

    /// Set a rig-global parameter.
    async fn set_parm(&mut self, _parm: Parm, _value: f32) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Read a rig-global parameter.
    async fn get_parm(&mut self, _parm: Parm) -> Result<f32> {
        Err(Error::NotImplemented)
    }

    /// Select an antenna port (1-based).
    async fn set_ant(&mut self, _vfo: Vfo, _antenna: u8) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Query the selected antenna port.
    async fn get_ant(&mut self, _vfo: Vfo) -> Result<u8> {
        Err(Error::NotImplemented)
    }

    /// Recall a memory channel.
    async fn set_mem(&mut self, _vfo: Vfo, _channel: i32) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Query the current memory channel.
    async fn get_mem(&mut self, _vfo: Vfo) -> Result<i32> {
        Err(Error::NotImplemented)
    }

    /// Set the CTCSS tone in tenths of hertz.
    async fn set_ctcss_tone(&mut self, _vfo: Vfo, _tone: u32) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Get the CTCSS tone in tenths of hertz.
    async fn get_ctcss_tone(&mut self, _vfo: Vfo) -> Result<u32> {
        Err(Error::NotImplemented)
    }

    /// Set the DCS code.
    async fn set_dcs_code(&mut self, _vfo: Vfo, _code: u32) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Get the DCS code.
    async fn get_dcs_code(&mut self, _vfo: Vfo) -> Result<u32> {
        Err(Error::NotImplemented)
    }

    /// Send a DTMF digit string.
    async fn send_dtmf(&mut self, _vfo: Vfo, _digits: &str) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Send a text message as Morse via the rig's keyer.
    async fn send_morse(&mut self, _vfo: Vfo, _message: &str) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Set the rig's power state.
    async fn set_powerstat(&mut self, _status: PowerStat) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Query the rig's power state.
    async fn get_powerstat(&mut self) -> Result<PowerStat> {
        Err(Error::NotImplemented)
    }

    /// Convert a normalized power setting (0.0–1.0) to milliwatts at the
    /// given frequency and mode.
    async fn power2mw(&mut self, _power: f32, _freq_hz: u64, _mode: Mode) -> Result<u64> {
        Err(Error::NotImplemented)
    }

    /// Convert milliwatts to a normalized power setting (0.0–1.0) at the
    /// given frequency and mode.
    async fn mw2power(&mut self, _mw: u64, _freq_hz: u64, _mode: Mode) -> Result<f32> {
        Err(Error::NotImplemented)
    }

    /// Perform a VFO memory/band operation (A=B, exchange, step up/down).
    async fn vfo_op(&mut self, _vfo: Vfo, _op: VfoOp) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Lock or unlock the front panel / remote set commands.
    async fn set_lock_mode(&mut self, _locked: bool) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Query the lock state.
    async fn get_lock_mode(&mut self) -> Result<bool> {
        Err(Error::NotImplemented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BareBackend;

    #[async_trait]
    impl Backend for BareBackend {}

    #[tokio::test]
    async fn defaults_return_not_implemented() {
        let mut b = BareBackend;
        assert!(matches!(b.init().await, Ok(())));
        assert!(matches!(b.open().await, Ok(())));
        assert!(matches!(
            b.set_freq(Vfo::A, 14_074_000).await,
            Err(Error::NotImplemented)
        ));
        assert!(matches!(b.get_vfo().await, Err(Error::NotImplemented)));
        assert!(matches!(
            b.send_morse(Vfo::A, "CQ TEST").await,
            Err(Error::NotImplemented)
        ));
        assert!(matches!(b.close().await, Ok(())));
        assert!(matches!(b.cleanup().await, Ok(())));
    }

    #[test]
    fn backend_is_object_safe() {
        fn assert_object(_b: &dyn Backend) {}
        let b = BareBackend;
        assert_object(&b);
    }
}
