//! Formatting and conversion helpers.
//!
//! Small utilities that most consumers (the daemon, CLI tools, loggers)
//! need: frequency display and power conversions driven by a capability
//! table.

use crate::caps::RigCaps;
use crate::error::{Error, Result};

/// Format a frequency in hertz as a human-readable MHz string.
///
/// Returns a string like `"14.074000 MHz"` with six decimal places,
/// which is the standard display precision for amateur radio frequencies.
///
/// # Example
///
/// ```
/// use rigkit_core::format_freq_mhz;
///
/// assert_eq!(format_freq_mhz(14_074_000), "14.074000 MHz");
/// assert_eq!(format_freq_mhz(432_100_000), "432.100000 MHz");
/// ```
pub fn format_freq_mhz(freq_hz: u64) -> String {
    let mhz = freq_hz as f64 / 1_000_000.0;
    format!("{mhz:.6} MHz")
}

/// Convert a normalized power setting (0.0–1.0) to milliwatts using the
/// capability table's transmit range for the given frequency.
///
/// This is the generic conversion backends fall back on when the rig has
/// a linear power control and no model-specific curve.
pub fn power2mw_linear(caps: &RigCaps, power: f32, freq_hz: u64) -> Result<u64> {
    if !(0.0..=1.0).contains(&power) {
        return Err(Error::InvalidArgument(format!(
            "power {power} outside 0.0–1.0"
        )));
    }
    let max = caps.max_power_mw(freq_hz).ok_or_else(|| {
        Error::InvalidArgument(format!("{freq_hz} Hz outside transmit range"))
    })?;
    Ok((power as f64 * max as f64).round() as u64)
}

/// Convert milliwatts to a normalized power setting (0.0–1.0), the
/// inverse of [`power2mw_linear`].
pub fn mw2power_linear(caps: &RigCaps, mw: u64, freq_hz: u64) -> Result<f32> {
    let max = caps.max_power_mw(freq_hz).ok_or_else(|| {
        Error::InvalidArgument(format!("{freq_hz} Hz outside transmit range"))
    })?;
    if mw as i64 > max {
        return Err(Error::InvalidArgument(format!(
            "{mw} mW exceeds the {max} mW maximum"
        )));
    }
    Ok((mw as f64 / max as f64) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FreqRange, Mode, ALL_MODES};

    fn caps_100w() -> RigCaps {
        RigCaps {
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
    fn format_freq_mhz_hf() {
        assert_eq!(format_freq_mhz(14_074_000), "14.074000 MHz");
        assert_eq!(format_freq_mhz(7_000_000), "7.000000 MHz");
        assert_eq!(format_freq_mhz(1_840_000), "1.840000 MHz");
    }

    #[test]
    fn format_freq_mhz_vhf_uhf() {
        assert_eq!(format_freq_mhz(144_174_000), "144.174000 MHz");
        assert_eq!(format_freq_mhz(432_100_000), "432.100000 MHz");
    }

    #[test]
    fn format_freq_mhz_zero() {
        assert_eq!(format_freq_mhz(0), "0.000000 MHz");
    }

    #[test]
    fn power_conversion_round_trip() {
        let caps = caps_100w();
        let mw = power2mw_linear(&caps, 0.5, 14_074_000).unwrap();
        assert_eq!(mw, 50_000);
        let p = mw2power_linear(&caps, mw, 14_074_000).unwrap();
        assert!((p - 0.5).abs() < 1e-6);
    }

    #[test]
    fn power_full_scale() {
        let caps = caps_100w();
        assert_eq!(power2mw_linear(&caps, 1.0, 14_074_000).unwrap(), 100_000);
        assert_eq!(power2mw_linear(&caps, 0.0, 14_074_000).unwrap(), 0);
    }

    #[test]
    fn power_out_of_range_inputs() {
        let caps = caps_100w();
        assert!(power2mw_linear(&caps, 1.5, 14_074_000).is_err());
        assert!(power2mw_linear(&caps, 0.5, 7_000_000).is_err());
        assert!(mw2power_linear(&caps, 200_000, 14_074_000).is_err());
    }
}
