//! Command encoding and parsing for the line protocol.
//!
//! Commands are single `\n`-terminated lines. Most operations have a
//! single-letter slot (uppercase = set, lowercase = get); operations
//! without one use a backslash-prefixed long name (`\dump_state`,
//! `\send_morse`). Long names are accepted for every command.
//!
//! When VFO mode is negotiated on a connection, per-VFO commands carry a
//! VFO token as the first argument after the command name
//! (`F VFOA 14074000`); with VFO mode off the token is omitted and the
//! command targets the rig's current VFO.

use rigkit_core::error::{Error, Result};
use rigkit_core::types::{Func, Level, Mode, Parm, PowerStat, Vfo, VfoOp};

/// A decoded protocol command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetFreq(u64),
    GetFreq,
    SetMode {
        mode: Mode,
        /// `None` asks for the rig's default filter for the mode.
        passband_hz: Option<u64>,
    },
    GetMode,
    SetVfo(Vfo),
    GetVfo,
    SetPtt(bool),
    GetPtt,
    GetDcd,
    SetSplitVfo {
        on: bool,
        tx_vfo: Vfo,
    },
    GetSplitVfo,
    SetSplitFreq(u64),
    GetSplitFreq,
    SetSplitMode {
        mode: Mode,
        passband_hz: Option<u64>,
    },
    GetSplitMode,
    SetRit(i32),
    GetRit,
    SetXit(i32),
    GetXit,
    SetTuningStep(u64),
    GetTuningStep,
    SetLevel {
        level: Level,
        value: f32,
    },
    GetLevel(Level),
    SetFunc {
        func: Func,
        on: bool,
    },
    GetFunc(Func),
    SetParm {
        parm: Parm,
        value: f32,
    },
    GetParm(Parm),
    SetCtcss(u32),
    GetCtcss,
    SetDcs(u32),
    GetDcs,
    SetAnt(u8),
    GetAnt,
    SetMem(i32),
    GetMem,
    SendDtmf(String),
    SendMorse(String),
    SetPowerStat(PowerStat),
    GetPowerStat,
    Power2Mw {
        power: f32,
        freq_hz: u64,
        mode: Mode,
    },
    Mw2Power {
        mw: u64,
        freq_hz: u64,
        mode: Mode,
    },
    VfoOp(VfoOp),
    SetLockMode(bool),
    GetLockMode,
    ChkVfo,
    DumpState,
    DumpCaps,
    Password(String),
    Quit,
}

impl Command {
    /// Number of data lines a successful query reply carries.
    ///
    /// Set commands return 0 (their reply is the `RPRT 0` status line),
    /// and `DumpState` is variable-length (negotiated by the parser in
    /// [`dump`](crate::dump)).
    pub fn reply_lines(&self) -> usize {
        match self {
            Command::GetMode | Command::GetSplitVfo | Command::GetSplitMode => 2,
            Command::GetFreq
            | Command::GetVfo
            | Command::GetPtt
            | Command::GetDcd
            | Command::GetSplitFreq
            | Command::GetRit
            | Command::GetXit
            | Command::GetTuningStep
            | Command::GetLevel(_)
            | Command::GetFunc(_)
            | Command::GetParm(_)
            | Command::GetCtcss
            | Command::GetDcs
            | Command::GetAnt
            | Command::GetMem
            | Command::GetPowerStat
            | Command::Power2Mw { .. }
            | Command::Mw2Power { .. }
            | Command::GetLockMode
            | Command::ChkVfo => 1,
            _ => 0,
        }
    }
}

/// A parsed command line: the command plus its VFO qualifier.
///
/// The qualifier defaults to [`Vfo::Current`] when the connection is not
/// in VFO mode or the command is not per-VFO.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    pub command: Command,
    pub vfo: Vfo,
}

/// Whether a command (by canonical name) accepts a VFO qualifier in VFO
/// mode.
///
/// `set_vfo` is excluded: its argument *is* the VFO.
fn takes_vfo(name: &str) -> bool {
    !matches!(
        name,
        "V" | "set_vfo"
            | "v"
            | "get_vfo"
            | "chk_vfo"
            | "dump_state"
            | "dump_caps"
            | "set_powerstat"
            | "get_powerstat"
            | "power2mW"
            | "mW2power"
            | "password"
            | "set_lock_mode"
            | "get_lock_mode"
            | "P"
            | "set_parm"
            | "p"
            | "get_parm"
            | "q"
            | "quit"
    )
}

fn arg<'a>(args: &[&'a str], idx: usize, what: &str) -> Result<&'a str> {
    args.get(idx)
        .copied()
        .ok_or_else(|| Error::InvalidArgument(format!("missing {what}")))
}

fn arg_u64(args: &[&str], idx: usize, what: &str) -> Result<u64> {
    arg(args, idx, what)?
        .parse::<u64>()
        .map_err(|_| Error::InvalidArgument(format!("bad {what}: {:?}", args[idx])))
}

fn arg_u32(args: &[&str], idx: usize, what: &str) -> Result<u32> {
    arg(args, idx, what)?
        .parse::<u32>()
        .map_err(|_| Error::InvalidArgument(format!("bad {what}: {:?}", args[idx])))
}

fn arg_i32(args: &[&str], idx: usize, what: &str) -> Result<i32> {
    arg(args, idx, what)?
        .parse::<i32>()
        .map_err(|_| Error::InvalidArgument(format!("bad {what}: {:?}", args[idx])))
}

fn arg_f32(args: &[&str], idx: usize, what: &str) -> Result<f32> {
    arg(args, idx, what)?
        .parse::<f32>()
        .map_err(|_| Error::InvalidArgument(format!("bad {what}: {:?}", args[idx])))
}

fn arg_bool(args: &[&str], idx: usize, what: &str) -> Result<bool> {
    match arg(args, idx, what)? {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(Error::InvalidArgument(format!("bad {what}: {other:?}"))),
    }
}

/// Optional trailing passband argument: absent or `0` means "rig
/// default".
fn arg_passband(args: &[&str], idx: usize) -> Result<Option<u64>> {
    match args.get(idx) {
        None => Ok(None),
        Some(s) => {
            let pb = s
                .parse::<u64>()
                .map_err(|_| Error::InvalidArgument(format!("bad passband: {s:?}")))?;
            Ok(if pb == 0 { None } else { Some(pb) })
        }
    }
}

/// Parse one command line.
///
/// `vfo_mode` controls whether per-VFO commands expect a VFO token as
/// their first argument. A token that does not parse as a VFO is treated
/// as an ordinary argument, so clients that omit the qualifier still
/// work.
pub fn parse_line(line: &str, vfo_mode: bool) -> Result<ParsedCommand> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let op_token = *tokens
        .first()
        .ok_or_else(|| Error::InvalidArgument("empty command".into()))?;
    let name = op_token.strip_prefix('\\').unwrap_or(op_token);

    let mut vfo = Vfo::Current;
    let mut args: &[&str] = &tokens[1..];
    if vfo_mode && takes_vfo(name) {
        if let Some(first) = args.first() {
            if let Ok(parsed) = first.parse::<Vfo>() {
                vfo = parsed;
                args = &args[1..];
            }
        }
    }

    let command = match name {
        "F" | "set_freq" => Command::SetFreq(arg_u64(args, 0, "frequency")?),
        "f" | "get_freq" => Command::GetFreq,
        "M" | "set_mode" => Command::SetMode {
            mode: arg(args, 0, "mode")?.parse()?,
            passband_hz: arg_passband(args, 1)?,
        },
        "m" | "get_mode" => Command::GetMode,
        "V" | "set_vfo" => Command::SetVfo(arg(args, 0, "VFO")?.parse()?),
        "v" | "get_vfo" => Command::GetVfo,
        "T" | "set_ptt" => Command::SetPtt(arg_bool(args, 0, "PTT state")?),
        "t" | "get_ptt" => Command::GetPtt,
        "get_dcd" => Command::GetDcd,
        "S" | "set_split_vfo" => Command::SetSplitVfo {
            on: arg_bool(args, 0, "split state")?,
            tx_vfo: arg(args, 1, "TX VFO")?.parse()?,
        },
        "s" | "get_split_vfo" => Command::GetSplitVfo,
        "I" | "set_split_freq" => Command::SetSplitFreq(arg_u64(args, 0, "TX frequency")?),
        "i" | "get_split_freq" => Command::GetSplitFreq,
        "X" | "set_split_mode" => Command::SetSplitMode {
            mode: arg(args, 0, "mode")?.parse()?,
            passband_hz: arg_passband(args, 1)?,
        },
        "x" | "get_split_mode" => Command::GetSplitMode,
        "J" | "set_rit" => Command::SetRit(arg_i32(args, 0, "RIT offset")?),
        "j" | "get_rit" => Command::GetRit,
        "Z" | "set_xit" => Command::SetXit(arg_i32(args, 0, "XIT offset")?),
        "z" | "get_xit" => Command::GetXit,
        "N" | "set_ts" => Command::SetTuningStep(arg_u64(args, 0, "tuning step")?),
        "n" | "get_ts" => Command::GetTuningStep,
        "L" | "set_level" => Command::SetLevel {
            level: arg(args, 0, "level")?.parse()?,
            value: arg_f32(args, 1, "level value")?,
        },
        "l" | "get_level" => Command::GetLevel(arg(args, 0, "level")?.parse()?),
        "U" | "set_func" => Command::SetFunc {
            func: arg(args, 0, "function")?.parse()?,
            on: arg_bool(args, 1, "function state")?,
        },
        "u" | "get_func" => Command::GetFunc(arg(args, 0, "function")?.parse()?),
        "P" | "set_parm" => Command::SetParm {
            parm: arg(args, 0, "parameter")?.parse()?,
            value: arg_f32(args, 1, "parameter value")?,
        },
        "p" | "get_parm" => Command::GetParm(arg(args, 0, "parameter")?.parse()?),
        "C" | "set_ctcss_tone" => Command::SetCtcss(arg_u32(args, 0, "CTCSS tone")?),
        "c" | "get_ctcss_tone" => Command::GetCtcss,
        "D" | "set_dcs_code" => Command::SetDcs(arg_u32(args, 0, "DCS code")?),
        "d" | "get_dcs_code" => Command::GetDcs,
        "Y" | "set_ant" => {
            let ant = arg_u32(args, 0, "antenna")?;
            let ant = u8::try_from(ant)
                .map_err(|_| Error::InvalidArgument(format!("bad antenna: {ant}")))?;
            Command::SetAnt(ant)
        }
        "y" | "get_ant" => Command::GetAnt,
        "E" | "set_mem" => Command::SetMem(arg_i32(args, 0, "memory channel")?),
        "e" | "get_mem" => Command::GetMem,
        "send_dtmf" => Command::SendDtmf(arg(args, 0, "DTMF digits")?.to_string()),
        "send_morse" => {
            if args.is_empty() {
                return Err(Error::InvalidArgument("missing Morse message".into()));
            }
            Command::SendMorse(args.join(" "))
        }
        "set_powerstat" => {
            let code = arg_u32(args, 0, "power state")?;
            let status = u8::try_from(code)
                .ok()
                .and_then(PowerStat::from_code)
                .ok_or_else(|| Error::InvalidArgument(format!("bad power state: {code}")))?;
            Command::SetPowerStat(status)
        }
        "get_powerstat" => Command::GetPowerStat,
        "power2mW" => Command::Power2Mw {
            power: arg_f32(args, 0, "power")?,
            freq_hz: arg_u64(args, 1, "frequency")?,
            mode: arg(args, 2, "mode")?.parse()?,
        },
        "mW2power" => Command::Mw2Power {
            mw: arg_u64(args, 0, "milliwatts")?,
            freq_hz: arg_u64(args, 1, "frequency")?,
            mode: arg(args, 2, "mode")?.parse()?,
        },
        "G" | "vfo_op" => Command::VfoOp(arg(args, 0, "VFO op")?.parse()?),
        "set_lock_mode" => Command::SetLockMode(arg_bool(args, 0, "lock state")?),
        "get_lock_mode" => Command::GetLockMode,
        "chk_vfo" => Command::ChkVfo,
        "dump_state" => Command::DumpState,
        "dump_caps" => Command::DumpCaps,
        "password" => Command::Password(arg(args, 0, "password")?.to_string()),
        "q" | "quit" => Command::Quit,
        other => {
            return Err(Error::InvalidArgument(format!("unknown command: {other:?}")))
        }
    };

    Ok(ParsedCommand { command, vfo })
}

/// Float formatting for the wire: whole values print without a fraction
/// so integer levels stay integers.
fn format_value(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Encode a command as a protocol line (including the terminator).
///
/// When `vfo_mode` is on, per-VFO commands carry `vfo` as their first
/// argument.
pub fn encode_line(command: &Command, vfo_mode: bool, vfo: Vfo) -> String {
    let (name, args): (&str, String) = match command {
        Command::SetFreq(hz) => ("F", hz.to_string()),
        Command::GetFreq => ("f", String::new()),
        Command::SetMode { mode, passband_hz } => (
            "M",
            format!("{mode} {}", passband_hz.unwrap_or(0)),
        ),
        Command::GetMode => ("m", String::new()),
        Command::SetVfo(v) => ("V", v.to_string()),
        Command::GetVfo => ("v", String::new()),
        Command::SetPtt(on) => ("T", (*on as u8).to_string()),
        Command::GetPtt => ("t", String::new()),
        Command::GetDcd => ("\\get_dcd", String::new()),
        Command::SetSplitVfo { on, tx_vfo } => {
            ("S", format!("{} {tx_vfo}", *on as u8))
        }
        Command::GetSplitVfo => ("s", String::new()),
        Command::SetSplitFreq(hz) => ("I", hz.to_string()),
        Command::GetSplitFreq => ("i", String::new()),
        Command::SetSplitMode { mode, passband_hz } => (
            "X",
            format!("{mode} {}", passband_hz.unwrap_or(0)),
        ),
        Command::GetSplitMode => ("x", String::new()),
        Command::SetRit(off) => ("J", off.to_string()),
        Command::GetRit => ("j", String::new()),
        Command::SetXit(off) => ("Z", off.to_string()),
        Command::GetXit => ("z", String::new()),
        Command::SetTuningStep(step) => ("N", step.to_string()),
        Command::GetTuningStep => ("n", String::new()),
        Command::SetLevel { level, value } => {
            ("L", format!("{level} {}", format_value(*value)))
        }
        Command::GetLevel(level) => ("l", level.to_string()),
        Command::SetFunc { func, on } => ("U", format!("{func} {}", *on as u8)),
        Command::GetFunc(func) => ("u", func.to_string()),
        Command::SetParm { parm, value } => {
            ("P", format!("{parm} {}", format_value(*value)))
        }
        Command::GetParm(parm) => ("p", parm.to_string()),
        Command::SetCtcss(tone) => ("C", tone.to_string()),
        Command::GetCtcss => ("c", String::new()),
        Command::SetDcs(code) => ("D", code.to_string()),
        Command::GetDcs => ("d", String::new()),
        Command::SetAnt(ant) => ("Y", ant.to_string()),
        Command::GetAnt => ("y", String::new()),
        Command::SetMem(ch) => ("E", ch.to_string()),
        Command::GetMem => ("e", String::new()),
        Command::SendDtmf(digits) => ("\\send_dtmf", digits.clone()),
        Command::SendMorse(msg) => ("\\send_morse", msg.clone()),
        Command::SetPowerStat(status) => ("\\set_powerstat", status.code().to_string()),
        Command::GetPowerStat => ("\\get_powerstat", String::new()),
        Command::Power2Mw { power, freq_hz, mode } => (
            "\\power2mW",
            format!("{} {freq_hz} {mode}", format_value(*power)),
        ),
        Command::Mw2Power { mw, freq_hz, mode } => {
            ("\\mW2power", format!("{mw} {freq_hz} {mode}"))
        }
        Command::VfoOp(op) => ("G", op.to_string()),
        Command::SetLockMode(locked) => ("\\set_lock_mode", (*locked as u8).to_string()),
        Command::GetLockMode => ("\\get_lock_mode", String::new()),
        Command::ChkVfo => ("\\chk_vfo", String::new()),
        Command::DumpState => ("\\dump_state", String::new()),
        Command::DumpCaps => ("\\dump_caps", String::new()),
        Command::Password(pw) => ("\\password", pw.clone()),
        Command::Quit => ("q", String::new()),
    };

    let canonical = name.strip_prefix('\\').unwrap_or(name);
    let mut line = String::from(name);
    if vfo_mode && takes_vfo(canonical) {
        line.push(' ');
        line.push_str(&vfo.to_string());
    }
    if !args.is_empty() {
        line.push(' ');
        line.push_str(&args);
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> ParsedCommand {
        parse_line(line, false).unwrap()
    }

    #[test]
    fn parse_set_freq() {
        let p = parse("F 14074000");
        assert_eq!(p.command, Command::SetFreq(14_074_000));
        assert_eq!(p.vfo, Vfo::Current);
    }

    #[test]
    fn parse_get_freq() {
        assert_eq!(parse("f").command, Command::GetFreq);
    }

    #[test]
    fn parse_long_names() {
        assert_eq!(
            parse("\\set_freq 7000000").command,
            Command::SetFreq(7_000_000)
        );
        assert_eq!(parse("\\get_freq").command, Command::GetFreq);
        assert_eq!(parse("\\dump_state").command, Command::DumpState);
    }

    #[test]
    fn parse_case_sensitivity() {
        assert_eq!(parse("t").command, Command::GetPtt);
        assert_eq!(parse("T 1").command, Command::SetPtt(true));
    }

    #[test]
    fn parse_mode_with_default_passband() {
        assert_eq!(
            parse("M USB 0").command,
            Command::SetMode {
                mode: Mode::USB,
                passband_hz: None
            }
        );
        assert_eq!(
            parse("M CW 500").command,
            Command::SetMode {
                mode: Mode::CW,
                passband_hz: Some(500)
            }
        );
        assert_eq!(
            parse("M LSB").command,
            Command::SetMode {
                mode: Mode::LSB,
                passband_hz: None
            }
        );
    }

    #[test]
    fn parse_split() {
        assert_eq!(
            parse("S 1 VFOB").command,
            Command::SetSplitVfo {
                on: true,
                tx_vfo: Vfo::B
            }
        );
    }

    #[test]
    fn parse_level_and_func() {
        assert_eq!(
            parse("L RFPOWER 0.25").command,
            Command::SetLevel {
                level: Level::RfPower,
                value: 0.25
            }
        );
        assert_eq!(parse("l STRENGTH").command, Command::GetLevel(Level::Strength));
        assert_eq!(
            parse("U NB 1").command,
            Command::SetFunc {
                func: Func::Nb,
                on: true
            }
        );
    }

    #[test]
    fn parse_morse_keeps_spaces() {
        assert_eq!(
            parse("\\send_morse CQ CQ DE N0CALL").command,
            Command::SendMorse("CQ CQ DE N0CALL".into())
        );
    }

    #[test]
    fn parse_vfo_mode_qualifier() {
        let p = parse_line("F VFOB 14074000", true).unwrap();
        assert_eq!(p.command, Command::SetFreq(14_074_000));
        assert_eq!(p.vfo, Vfo::B);

        // Qualifier omitted: still parses, targets current VFO.
        let p = parse_line("F 14074000", true).unwrap();
        assert_eq!(p.command, Command::SetFreq(14_074_000));
        assert_eq!(p.vfo, Vfo::Current);
    }

    #[test]
    fn set_vfo_argument_is_not_a_qualifier() {
        let p = parse_line("V VFOB", true).unwrap();
        assert_eq!(p.command, Command::SetVfo(Vfo::B));
        assert_eq!(p.vfo, Vfo::Current);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_line("", false).is_err());
        assert!(parse_line("F", false).is_err());
        assert!(parse_line("F abc", false).is_err());
        assert!(parse_line("Q", false).is_err());
        assert!(parse_line("\\warp_ten", false).is_err());
        assert!(parse_line("T 2", false).is_err());
    }

    #[test]
    fn parse_power_conversions() {
        assert_eq!(
            parse("\\power2mW 0.5 14074000 USB").command,
            Command::Power2Mw {
                power: 0.5,
                freq_hz: 14_074_000,
                mode: Mode::USB
            }
        );
        assert_eq!(
            parse("\\mW2power 50000 14074000 USB").command,
            Command::Mw2Power {
                mw: 50_000,
                freq_hz: 14_074_000,
                mode: Mode::USB
            }
        );
    }

    #[test]
    fn encode_simple() {
        assert_eq!(
            encode_line(&Command::SetFreq(14_074_000), false, Vfo::Current),
            "F 14074000\n"
        );
        assert_eq!(encode_line(&Command::GetFreq, false, Vfo::Current), "f\n");
        assert_eq!(encode_line(&Command::Quit, false, Vfo::Current), "q\n");
    }

    #[test]
    fn encode_with_vfo_mode() {
        assert_eq!(
            encode_line(&Command::SetFreq(14_074_000), true, Vfo::A),
            "F VFOA 14074000\n"
        );
        assert_eq!(encode_line(&Command::GetFreq, true, Vfo::B), "f VFOB\n");
        // set_vfo never carries a qualifier.
        assert_eq!(
            encode_line(&Command::SetVfo(Vfo::B), true, Vfo::A),
            "V VFOB\n"
        );
    }

    #[test]
    fn encode_extended_commands() {
        assert_eq!(
            encode_line(&Command::SendMorse("CQ TEST".into()), false, Vfo::Current),
            "\\send_morse CQ TEST\n"
        );
        assert_eq!(
            encode_line(&Command::ChkVfo, false, Vfo::Current),
            "\\chk_vfo\n"
        );
        assert_eq!(
            encode_line(&Command::SetPowerStat(PowerStat::On), false, Vfo::Current),
            "\\set_powerstat 1\n"
        );
    }

    #[test]
    fn encode_parse_round_trip() {
        let cases = vec![
            Command::SetFreq(14_074_000),
            Command::GetFreq,
            Command::SetMode {
                mode: Mode::CW,
                passband_hz: Some(500),
            },
            Command::GetMode,
            Command::SetVfo(Vfo::B),
            Command::SetPtt(true),
            Command::SetSplitVfo {
                on: true,
                tx_vfo: Vfo::B,
            },
            Command::SetRit(-120),
            Command::SetLevel {
                level: Level::KeySpeed,
                value: 24.0,
            },
            Command::GetFunc(Func::Nr),
            Command::SetCtcss(885),
            Command::SendDtmf("123*#".into()),
            Command::VfoOp(VfoOp::Exchange),
            Command::DumpState,
            Command::Quit,
        ];
        for cmd in cases {
            let line = encode_line(&cmd, false, Vfo::Current);
            let parsed = parse_line(line.trim_end(), false).unwrap();
            assert_eq!(parsed.command, cmd, "round-trip failed for {line:?}");
        }
    }

    #[test]
    fn encode_parse_round_trip_vfo_mode() {
        let cmd = Command::SetFreq(7_074_000);
        let line = encode_line(&cmd, true, Vfo::B);
        let parsed = parse_line(line.trim_end(), true).unwrap();
        assert_eq!(parsed.command, cmd);
        assert_eq!(parsed.vfo, Vfo::B);
    }

    #[test]
    fn reply_line_counts() {
        assert_eq!(Command::GetFreq.reply_lines(), 1);
        assert_eq!(Command::GetMode.reply_lines(), 2);
        assert_eq!(Command::GetSplitVfo.reply_lines(), 2);
        assert_eq!(Command::SetFreq(1).reply_lines(), 0);
        assert_eq!(Command::ChkVfo.reply_lines(), 1);
    }
}
