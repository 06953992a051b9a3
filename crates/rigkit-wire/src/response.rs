//! Response framing and numeric field handling.
//!
//! Every failure on the wire is a single line `RPRT <code>` with a signed
//! status code; a successful set command is acknowledged with `RPRT 0`,
//! and a successful query returns its value line(s) with no sentinel.
//! `RPRT` is reserved: it is never the first token of a data line, so a
//! status line can always be distinguished from data.
//!
//! Numeric fields use Rust's standard integer/float formatting, which is
//! locale-independent by construction -- no locale juggling needed around
//! parse or format calls.

use rigkit_core::error::{Error, Result};

/// The sentinel token opening every status line.
pub const STATUS_SENTINEL: &str = "RPRT";

/// Render a status line (without terminator).
pub fn status_line(code: i32) -> String {
    format!("{STATUS_SENTINEL} {code}")
}

/// If `line` is a status line, return its code.
pub fn parse_status(line: &str) -> Option<i32> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some(STATUS_SENTINEL) {
        return None;
    }
    let code = tokens.next()?.parse::<i32>().ok()?;
    if tokens.next().is_some() {
        return None;
    }
    Some(code)
}

/// Interpret one reply line: `RPRT 0` and data lines pass, a negative
/// status becomes the matching [`Error`] kind.
///
/// Returns `Ok(true)` when the line was a status line (and carried
/// success), `Ok(false)` when it is a data line the caller should parse.
pub fn check_status(line: &str) -> Result<bool> {
    match parse_status(line) {
        Some(0) => Ok(true),
        Some(code) => Err(Error::from_status_code(code)),
        None => Ok(false),
    }
}

/// Parse an unsigned decimal field.
pub fn parse_u64(s: &str) -> Result<u64> {
    s.trim()
        .parse::<u64>()
        .map_err(|_| Error::Protocol(format!("bad unsigned field: {s:?}")))
}

/// Parse an unsigned 32-bit decimal field.
pub fn parse_u32(s: &str) -> Result<u32> {
    s.trim()
        .parse::<u32>()
        .map_err(|_| Error::Protocol(format!("bad unsigned field: {s:?}")))
}

/// Parse a signed decimal field.
pub fn parse_i64(s: &str) -> Result<i64> {
    s.trim()
        .parse::<i64>()
        .map_err(|_| Error::Protocol(format!("bad signed field: {s:?}")))
}

/// Parse a signed 32-bit decimal field.
pub fn parse_i32(s: &str) -> Result<i32> {
    s.trim()
        .parse::<i32>()
        .map_err(|_| Error::Protocol(format!("bad signed field: {s:?}")))
}

/// Parse a float field (decimal point, never comma).
pub fn parse_f32(s: &str) -> Result<f32> {
    s.trim()
        .parse::<f32>()
        .map_err(|_| Error::Protocol(format!("bad float field: {s:?}")))
}

/// Parse a `0x`-prefixed or bare hex mask field.
pub fn parse_hex_u64(s: &str) -> Result<u64> {
    let t = s.trim();
    let digits = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")).unwrap_or(t);
    u64::from_str_radix(digits, 16)
        .map_err(|_| Error::Protocol(format!("bad hex field: {s:?}")))
}

/// Parse a `0`/`1` boolean field.
pub fn parse_bool(s: &str) -> Result<bool> {
    match s.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(Error::Protocol(format!("bad boolean field: {other:?}"))),
    }
}
