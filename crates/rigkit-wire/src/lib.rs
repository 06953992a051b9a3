//! rigkit-wire: the rigctld-compatible line protocol.
//!
//! This crate implements the text wire format shared by the network
//! client backend (`rigkit-netrig`) and the control daemon (`rigkitd`):
//!
//! - [`command`]: command encoding and parsing (`F 14074000`, `\dump_state`,
//!   VFO-mode qualifiers);
//! - [`response`]: the `RPRT <code>` status sentinel and locale-independent
//!   numeric field handling;
//! - [`dump`]: the versioned `dump_state` capability snapshot (v0
//!   fixed-order dump, v1 `key=value`…`done` extension).
//!
//! Everything here is pure encoding/decoding with no I/O, so both sides
//! of the protocol test against the same code and the round-trip laws
//! hold by construction.

pub mod command;
pub mod dump;
pub mod response;

pub use command::{encode_line, parse_line, Command, ParsedCommand};
pub use dump::{DumpStateParser, StateDump, PROTOCOL_VERSION};
pub use response::{
    check_status, parse_status, status_line, STATUS_SENTINEL,
};

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;
    use rigkit_core::types::Vfo;

    use crate::command::{encode_line, parse_line, Command};
    use crate::response::{parse_status, status_line};

    proptest! {
        /// Encoding a set-frequency command and parsing it back yields
        /// the frequency exactly, for any value.
        #[test]
        fn set_freq_round_trips(freq in 0u64..=10_000_000_000) {
            let line = encode_line(&Command::SetFreq(freq), false, Vfo::Current);
            let parsed = parse_line(line.trim_end(), false).unwrap();
            prop_assert_eq!(parsed.command, Command::SetFreq(freq));
        }

        /// VFO-mode qualifiers survive the round trip too.
        #[test]
        fn set_freq_round_trips_vfo_mode(freq in 0u64..=10_000_000_000) {
            let line = encode_line(&Command::SetFreq(freq), true, Vfo::B);
            let parsed = parse_line(line.trim_end(), true).unwrap();
            prop_assert_eq!(parsed.command, Command::SetFreq(freq));
            prop_assert_eq!(parsed.vfo, Vfo::B);
        }

        /// RIT offsets are signed and round-trip across the whole range.
        #[test]
        fn set_rit_round_trips(offset in -99_999i32..=99_999) {
            let line = encode_line(&Command::SetRit(offset), false, Vfo::Current);
            let parsed = parse_line(line.trim_end(), false).unwrap();
            prop_assert_eq!(parsed.command, Command::SetRit(offset));
        }

        /// Status codes round-trip through the sentinel line.
        #[test]
        fn status_codes_round_trip(code in -1000i32..=0) {
            prop_assert_eq!(parse_status(&status_line(code)), Some(code));
        }
    }
}
