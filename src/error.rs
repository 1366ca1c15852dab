//! Error types

use crate::{apdu::status, transport};
use thiserror::Error;

/// Errors produced by this crate
#[derive(Debug, Error)]
pub enum Error {
    /// The reader or link failed. Not a protocol error: the command may or
    /// may not have reached the tag, but the command counter is unchanged.
    #[error("transport error: {0}")]
    Transport(#[from] transport::Error),

    /// The tag returned a non-success status word
    #[error("tag error: {0}")]
    Status(#[from] status::StatusError),

    /// Cryptographic verification failed (response MAC mismatch, or the
    /// rotated challenge returned during authentication did not match)
    #[error("cryptographic verification failed: {0}")]
    Crypto(String),

    /// Malformed frame, unexpected length, or unexpected continuation
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The authenticated session is no longer valid (the PICC master key
    /// was changed); re-authenticate with the new key
    #[error("authenticated session expired")]
    SessionExpired,

    /// Invalid argument supplied by the caller
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// The status-word error kind, if this error carries one
    pub fn status_kind(&self) -> Option<status::ErrorKind> {
        match self {
            Error::Status(e) => Some(e.kind),
            _ => None,
        }
    }
}
