//! Error types for rigkit.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! dispatch-layer errors are all captured here, and every variant maps to
//! a stable signed status code carried on the wire (`RPRT <code>`).

/// The error type for all rigkit operations.
///
/// Variants cover the full range of failure modes encountered when
/// controlling a rig locally or through the network daemon: bad input,
/// operations the model does not implement, transport failures, timeouts,
/// wire-format violations, and lifecycle misuse.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or out-of-range input (frequency outside the rig's
    /// coverage, unknown level token, negative memory channel).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An allocation or resource reservation failed.
    #[error("out of memory")]
    NoMemory,

    /// The operation is absent from this model's capability table.
    ///
    /// Distinct from [`Error::Rejected`]: a `NotImplemented` dispatch never
    /// touches the transport, while `Rejected` means the backend understood
    /// the request and refused it.
    #[error("operation not implemented by this model")]
    NotImplemented,

    /// No response within the configured timeout after all retries.
    #[error("timeout waiting for response")]
    Timeout,

    /// A transport-level failure (broken pipe, reset connection, device
    /// unplugged). Never retried by the transport itself; reopen decisions
    /// belong to the layer above.
    #[error("I/O error: {0}")]
    Io(String),

    /// A wire-format violation: unexpected response shape, version
    /// mismatch, or an unparsable numeric field.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The backend understood the request but refused it (e.g. PTT toggle
    /// while the rig is in a CW-only state).
    #[error("request rejected by rig: {0}")]
    Rejected(String),

    /// An operation was attempted outside its valid lifecycle phase
    /// (e.g. `set_freq` before `open`).
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// The signed status code carried on the wire for this error kind.
    ///
    /// Codes are part of the protocol contract and never change.
    pub fn status_code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) => -1,
            Error::NoMemory => -3,
            Error::NotImplemented => -4,
            Error::Timeout => -5,
            Error::Io(_) => -6,
            Error::Protocol(_) => -8,
            Error::Rejected(_) => -9,
            Error::InvalidState(_) => -11,
        }
    }

    /// Reconstruct an error kind from a wire status code.
    ///
    /// Unknown codes map to [`Error::Protocol`] so that a newer server
    /// cannot crash an older client.
    pub fn from_status_code(code: i32) -> Self {
        match code {
            -1 => Error::InvalidArgument("reported by remote".into()),
            -3 => Error::NoMemory,
            -4 => Error::NotImplemented,
            -5 => Error::Timeout,
            -6 => Error::Io("reported by remote".into()),
            -8 => Error::Protocol("reported by remote".into()),
            -9 => Error::Rejected("reported by remote".into()),
            -11 => Error::InvalidState("reported by remote".into()),
            other => Error::Protocol(format!("unknown status code {other}")),
        }
    }

    /// Whether this error should trigger a device close/reopen cycle in
    /// the daemon.
    ///
    /// Transport failures and timeouts are "hard": the device may be gone
    /// or wedged. Everything else is "soft" and is returned to the client
    /// without touching the transport.
    pub fn is_hard(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Timeout)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(Error::InvalidArgument("x".into()).status_code(), -1);
        assert_eq!(Error::NoMemory.status_code(), -3);
        assert_eq!(Error::NotImplemented.status_code(), -4);
        assert_eq!(Error::Timeout.status_code(), -5);
        assert_eq!(Error::Io("x".into()).status_code(), -6);
        assert_eq!(Error::Protocol("x".into()).status_code(), -8);
        assert_eq!(Error::Rejected("x".into()).status_code(), -9);
        assert_eq!(Error::InvalidState("x".into()).status_code(), -11);
    }

    #[test]
    fn round_trip_known_codes() {
        for code in [-1, -3, -4, -5, -6, -8, -9, -11] {
            let e = Error::from_status_code(code);
            assert_eq!(e.status_code(), code, "code {code} did not round-trip");
        }
    }

    #[test]
    fn unknown_code_maps_to_protocol() {
        let e = Error::from_status_code(-99);
        assert!(matches!(e, Error::Protocol(_)));
    }

    #[test]
    fn hard_soft_split() {
        assert!(Error::Io("pipe".into()).is_hard());
        assert!(Error::Timeout.is_hard());
        assert!(!Error::NotImplemented.is_hard());
        assert!(!Error::InvalidArgument("x".into()).is_hard());
        assert!(!Error::Rejected("x".into()).is_hard());
        assert!(!Error::InvalidState("x".into()).is_hard());
        assert!(!Error::Protocol("x".into()).is_hard());
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }
}
