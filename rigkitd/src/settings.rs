//! Daemon runtime settings.
//!
//! Separated from the command-line surface so tests construct settings
//! directly.

use std::time::Duration;

use rigkit::PttType;

/// Runtime configuration of the daemon.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Default VFO mode for new connections (`\chk_vfo` reports this).
    pub vfo_mode: bool,
    /// Shared secret gating command processing, if any.
    pub password: Option<String>,
    /// Close the device when the last client disconnects; reopen
    /// transparently on the next connection's first command.
    pub close_on_idle: bool,
    /// Reopen attempts after a hard (I/O or timeout) dispatch error.
    pub reopen_retries: u32,
    /// Delay between reopen attempts.
    pub reopen_backoff: Duration,
    /// `dump_state` protocol version served to clients.
    pub protocol_ver: u32,
    /// PTT type reported in the capability snapshot.
    pub ptt_type: PttType,
    /// Response line separator (the protocol default is `'\n'`).
    pub line_sep: char,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            vfo_mode: false,
            password: None,
            close_on_idle: false,
            reopen_retries: 3,
            reopen_backoff: Duration::from_millis(500),
            protocol_ver: rigkit::wire::PROTOCOL_VERSION,
            ptt_type: PttType::Rig,
            line_sep: '\n',
        }
    }
}
