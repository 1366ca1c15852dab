//! Status words returned by the tag, and their error taxonomy
//!
//! Every response ends in two status bytes. `0x9000` (ISO) and `0x9100`
//! (native) both mean success; `0x91AF` means a further response frame is
//! available. Everything else maps to an [`ErrorKind`], with the raw
//! bytes preserved for diagnostics.

use std::fmt;
use thiserror::Error;

/// The two trailing status bytes of a response
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusWord {
    /// First status byte
    pub sw1: u8,

    /// Second status byte
    pub sw2: u8,
}

impl StatusWord {
    /// Create a status word from the two trailing response bytes
    pub fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Is this one of the two success statuses (`0x9000` / `0x9100`)?
    pub fn is_success(self) -> bool {
        matches!((self.sw1, self.sw2), (0x90, 0x00) | (0x91, 0x00))
    }

    /// Does this status signal that more response data is available
    /// (`0x91AF`)?
    pub fn is_more_data(self) -> bool {
        (self.sw1, self.sw2) == (0x91, 0xAF)
    }

    /// Map a non-success status to its error; success maps to `Ok`
    pub fn check(self) -> Result<(), StatusError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(StatusError {
                kind: ErrorKind::from_status(self),
                sw1: self.sw1,
                sw2: self.sw2,
            })
        }
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}{:02X}", self.sw1, self.sw2)
    }
}

/// Kinds of errors which originate in the tag
#[derive(Copy, Clone, Debug, Eq, Error, PartialEq)]
pub enum ErrorKind {
    /// MAC or padding verification failed on the tag (`0x911E`)
    #[error("integrity error")]
    IntegrityError,

    /// Command or payload length rejected (`0x917E`)
    #[error("length error")]
    LengthError,

    /// Authentication required, expired, or failed (`0x91AE`)
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The tag's failed-authentication delay counter is active (`0x91AD`);
    /// not retryable until the delay elapses
    #[error("authentication delay active")]
    AuthenticationDelay,

    /// Command not supported in the current state (`0x911C`)
    #[error("illegal command")]
    IllegalCommand,

    /// Offset or length outside the file bounds (`0x91BE`)
    #[error("boundary error")]
    BoundaryError,

    /// Access rights do not permit the operation (`0x919D`)
    #[error("permission denied")]
    PermissionDenied,

    /// Command chain aborted by the tag (`0x91CA`)
    #[error("command aborted")]
    Aborted,

    /// File not found (`0x6A82`)
    #[error("file not found")]
    NotFound,

    /// ISO conditions of use not satisfied (`0x6985`)
    #[error("conditions of use not satisfied")]
    ConditionsNotSatisfied,

    /// Any other non-success status
    #[error("unexpected status")]
    Other,
}

impl ErrorKind {
    /// Classify a non-success status word
    pub fn from_status(sw: StatusWord) -> Self {
        match (sw.sw1, sw.sw2) {
            (0x91, 0x1E) => ErrorKind::IntegrityError,
            (0x91, 0x7E) => ErrorKind::LengthError,
            (0x91, 0xAE) => ErrorKind::AuthenticationFailed,
            (0x91, 0xAD) => ErrorKind::AuthenticationDelay,
            (0x91, 0x1C) => ErrorKind::IllegalCommand,
            (0x91, 0xBE) => ErrorKind::BoundaryError,
            (0x91, 0x9D) => ErrorKind::PermissionDenied,
            (0x91, 0xCA) => ErrorKind::Aborted,
            (0x6A, 0x82) => ErrorKind::NotFound,
            (0x69, 0x85) => ErrorKind::ConditionsNotSatisfied,
            _ => ErrorKind::Other,
        }
    }
}

/// A non-success status word, classified, with the raw bytes retained
#[derive(Copy, Clone, Debug, Eq, Error, PartialEq)]
#[error("{kind} (sw=0x{sw1:02X}{sw2:02X})")]
pub struct StatusError {
    /// Classified status meaning
    pub kind: ErrorKind,

    /// First raw status byte
    pub sw1: u8,

    /// Second raw status byte
    pub sw2: u8,
}
