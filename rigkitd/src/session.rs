//! Per-connection command loop.
//!
//! Each accepted socket runs one `run` task: read a line (no lock held),
//! parse it, execute it against the shared handle (lock held only for
//! the dispatch), write the reply. Soft errors keep the connection open;
//! only EOF, socket errors, or `q` end the session.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use rigkit::wire::command::{Command, ParsedCommand};
use rigkit::wire::dump::StateDump;
use rigkit::wire::{parse_line, status_line};
use rigkit::{Error, Result, Rig};

use crate::server::SharedRig;
use crate::settings::Settings;

/// Serve one client connection to completion.
pub async fn run(stream: TcpStream, peer: SocketAddr, shared: Arc<SharedRig>) {
    shared.client_connected();
    if let Err(e) = serve(stream, peer, &shared).await {
        debug!(%peer, error = %e, "session ended with I/O error");
    }
    shared.client_disconnected().await;
    debug!(%peer, "client disconnected");
}

async fn serve(
    stream: TcpStream,
    peer: SocketAddr,
    shared: &SharedRig,
) -> std::io::Result<()> {
    let settings = shared.settings();
    let vfo_mode = settings.vfo_mode;
    let sep = settings.line_sep;
    // A connection with no password configured starts authenticated.
    let mut authed = settings.password.is_none();

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        // Blocking socket read happens with the device lock released.
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        trace!(%peer, cmd = trimmed, "command received");

        let parsed = match parse_line(trimmed, vfo_mode) {
            Ok(p) => p,
            Err(e) => {
                debug!(%peer, cmd = trimmed, error = %e, "unparsable command");
                write_status(&mut write_half, e.status_code(), sep).await?;
                continue;
            }
        };

        // Connection-scoped commands that bypass the auth gate: closing
        // the session and authenticating.
        match &parsed.command {
            Command::Quit => {
                write_status(&mut write_half, 0, sep).await?;
                break;
            }
            Command::Password(pw) => {
                let code = match &settings.password {
                    Some(secret) if secret == pw => {
                        authed = true;
                        0
                    }
                    Some(_) => {
                        warn!(%peer, "bad password");
                        Error::Rejected(String::new()).status_code()
                    }
                    // No password configured: accept and carry on.
                    None => 0,
                };
                write_status(&mut write_half, code, sep).await?;
                continue;
            }
            _ => {}
        }

        if !authed {
            write_status(
                &mut write_half,
                Error::Rejected(String::new()).status_code(),
                sep,
            )
            .await?;
            continue;
        }

        // Answered from connection state, no device lock needed.
        if parsed.command == Command::ChkVfo {
            write_line(&mut write_half, &format!("CHKVFO {}", vfo_mode as u8), sep)
                .await?;
            continue;
        }

        match shared.execute(&parsed).await {
            Ok(lines) if lines.is_empty() => {
                write_status(&mut write_half, 0, sep).await?;
            }
            Ok(lines) => {
                for l in &lines {
                    write_line(&mut write_half, l, sep).await?;
                }
            }
            Err(e) => {
                debug!(%peer, error = %e, "command failed");
                write_status(&mut write_half, e.status_code(), sep).await?;
            }
        }
    }
    Ok(())
}

async fn write_line(w: &mut OwnedWriteHalf, s: &str, sep: char) -> std::io::Result<()> {
    let mut buf = [0u8; 4];
    w.write_all(s.as_bytes()).await?;
    w.write_all(sep.encode_utf8(&mut buf).as_bytes()).await?;
    w.flush().await
}

async fn write_status(w: &mut OwnedWriteHalf, code: i32, sep: char) -> std::io::Result<()> {
    write_line(w, &status_line(code), sep).await
}

/// Wire float formatting: whole values print without a fraction.
fn fmt_value(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Execute one parsed command against the handle, formatting the reply
/// data lines (empty for a set).
///
/// Connection-scoped commands (`q`, `\chk_vfo`, `\password`) are handled
/// by the session loop and never reach this function through it.
pub async fn dispatch_command(
    rig: &mut Rig,
    parsed: &ParsedCommand,
    settings: &Settings,
) -> Result<Vec<String>> {
    let vfo = parsed.vfo;
    match &parsed.command {
        Command::SetFreq(hz) => {
            rig.set_freq(vfo, *hz).await?;
            Ok(Vec::new())
        }
        Command::GetFreq => Ok(vec![rig.get_freq(vfo).await?.to_string()]),
        Command::SetMode { mode, passband_hz } => {
            rig.set_mode(vfo, *mode, *passband_hz).await?;
            Ok(Vec::new())
        }
        Command::GetMode => {
            let (mode, pb) = rig.get_mode(vfo).await?;
            Ok(vec![mode.to_string(), pb.to_string()])
        }
        Command::SetVfo(target) => {
            rig.set_vfo(*target).await?;
            Ok(Vec::new())
        }
        Command::GetVfo => Ok(vec![rig.get_vfo().await?.to_string()]),
        Command::SetPtt(on) => {
            rig.set_ptt(vfo, *on).await?;
            Ok(Vec::new())
        }
        Command::GetPtt => Ok(vec![(rig.get_ptt(vfo).await? as u8).to_string()]),
        Command::GetDcd => Ok(vec![(rig.get_dcd(vfo).await? as u8).to_string()]),
        Command::SetSplitVfo { on, tx_vfo } => {
            rig.set_split_vfo(vfo, *on, *tx_vfo).await?;
            Ok(Vec::new())
        }
        Command::GetSplitVfo => {
            let (on, tx_vfo) = rig.get_split_vfo(vfo).await?;
            Ok(vec![(on as u8).to_string(), tx_vfo.to_string()])
        }
        Command::SetSplitFreq(hz) => {
            rig.set_split_freq(vfo, *hz).await?;
            Ok(Vec::new())
        }
        Command::GetSplitFreq => Ok(vec![rig.get_split_freq(vfo).await?.to_string()]),
        Command::SetSplitMode { mode, passband_hz } => {
            rig.set_split_mode(vfo, *mode, *passband_hz).await?;
            Ok(Vec::new())
        }
        Command::GetSplitMode => {
            let (mode, pb) = rig.get_split_mode(vfo).await?;
            Ok(vec![mode.to_string(), pb.to_string()])
        }
        Command::SetRit(offset) => {
            rig.set_rit(vfo, *offset).await?;
            Ok(Vec::new())
        }
        Command::GetRit => Ok(vec![rig.get_rit(vfo).await?.to_string()]),
        Command::SetXit(offset) => {
            rig.set_xit(vfo, *offset).await?;
            Ok(Vec::new())
        }
        Command::GetXit => Ok(vec![rig.get_xit(vfo).await?.to_string()]),
        Command::SetTuningStep(step) => {
            rig.set_tuning_step(vfo, *step).await?;
            Ok(Vec::new())
        }
        Command::GetTuningStep => {
            Ok(vec![rig.get_tuning_step(vfo).await?.to_string()])
        }
        Command::SetLevel { level, value } => {
            rig.set_level(vfo, *level, *value).await?;
            Ok(Vec::new())
        }
        Command::GetLevel(level) => {
            Ok(vec![fmt_value(rig.get_level(vfo, *level).await?)])
        }
        Command::SetFunc { func, on } => {
            rig.set_func(vfo, *func, *on).await?;
            Ok(Vec::new())
        }
        Command::GetFunc(func) => {
            Ok(vec![(rig.get_func(vfo, *func).await? as u8).to_string()])
        }
        Command::SetParm { parm, value } => {
            rig.set_parm(*parm, *value).await?;
            Ok(Vec::new())
        }
        Command::GetParm(parm) => Ok(vec![fmt_value(rig.get_parm(*parm).await?)]),
        Command::SetCtcss(tone) => {
            rig.set_ctcss_tone(vfo, *tone).await?;
            Ok(Vec::new())
        }
        Command::GetCtcss => Ok(vec![rig.get_ctcss_tone(vfo).await?.to_string()]),
        Command::SetDcs(code) => {
            rig.set_dcs_code(vfo, *code).await?;
            Ok(Vec::new())
        }
        Command::GetDcs => Ok(vec![rig.get_dcs_code(vfo).await?.to_string()]),
        Command::SetAnt(ant) => {
            rig.set_ant(vfo, *ant).await?;
            Ok(Vec::new())
        }
        Command::GetAnt => Ok(vec![rig.get_ant(vfo).await?.to_string()]),
        Command::SetMem(channel) => {
            rig.set_mem(vfo, *channel).await?;
            Ok(Vec::new())
        }
        Command::GetMem => Ok(vec![rig.get_mem(vfo).await?.to_string()]),
        Command::SendDtmf(digits) => {
            rig.send_dtmf(vfo, digits).await?;
            Ok(Vec::new())
        }
        Command::SendMorse(message) => {
            rig.send_morse(vfo, message).await?;
            Ok(Vec::new())
        }
        Command::SetPowerStat(status) => {
            rig.set_powerstat(*status).await?;
            Ok(Vec::new())
        }
        Command::GetPowerStat => {
            Ok(vec![rig.get_powerstat().await?.code().to_string()])
        }
        Command::Power2Mw {
            power,
            freq_hz,
            mode,
        } => Ok(vec![rig.power2mw(*power, *freq_hz, *mode).await?.to_string()]),
        Command::Mw2Power { mw, freq_hz, mode } => {
            Ok(vec![fmt_value(rig.mw2power(*mw, *freq_hz, *mode).await?)])
        }
        Command::VfoOp(op) => {
            rig.vfo_op(vfo, *op).await?;
            Ok(Vec::new())
        }
        Command::SetLockMode(locked) => {
            rig.set_lock_mode(*locked).await?;
            Ok(Vec::new())
        }
        Command::GetLockMode => {
            Ok(vec![(rig.get_lock_mode().await? as u8).to_string()])
        }
        Command::DumpState => {
            let dump =
                StateDump::from_caps(rig.caps(), settings.protocol_ver, settings.ptt_type);
            Ok(dump.encode().lines().map(String::from).collect())
        }
        Command::DumpCaps => Ok(dump_caps_lines(rig)),
        // Session-scoped commands; unreachable through the normal loop.
        Command::ChkVfo => Ok(vec![format!("CHKVFO {}", settings.vfo_mode as u8)]),
        Command::Password(_) | Command::Quit => {
            Err(Error::InvalidArgument("connection-scoped command".into()))
        }
    }
}

/// Human-readable capability listing for `\dump_caps`.
fn dump_caps_lines(rig: &Rig) -> Vec<String> {
    let caps = rig.caps();
    let mut lines = vec![
        format!("Model: {} {}", caps.mfg_name, caps.model_name),
        format!("Model id: {}", caps.model_id),
        format!("ITU region: {}", caps.itu_region),
        format!("RIT: ±{} Hz", caps.max_rit_hz),
        format!("XIT: ±{} Hz", caps.max_xit_hz),
        format!("IF shift: ±{} Hz", caps.max_if_shift_hz),
        format!("Memory channels: {}", caps.memory_channels),
        format!("Antenna ports: {}", caps.antenna_count),
        format!("Operations: {}", caps.ops.len()),
    ];
    for r in &caps.rx_ranges {
        lines.push(format!("RX range: {r}"));
    }
    for r in &caps.tx_ranges {
        lines.push(format!("TX range: {r}"));
    }
    lines
}
