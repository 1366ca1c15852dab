//! Trait shared across all methods of reaching a tag
//!
//! Implementations wrap a PC/SC-like reader handle (or the bundled
//! [`MockTag`] simulator) and must pass the exact APDU bytes they are
//! given. Timeouts and retries are a transport concern; the core treats
//! any transport failure as a command failure that leaves session state
//! untouched.
//!
//! [`MockTag`]: crate::MockTag

use thiserror::Error;

/// A response as it comes off the wire: body bytes followed by the
/// two-byte status word
pub type RawResponse = (Vec<u8>, u8, u8);

/// Reader/link failures, distinct from tag status errors
#[derive(Debug, Error)]
#[error("{0}")]
pub struct Error(pub String);

/// Connections to a tag
pub trait Transport {
    /// Transmit a single APDU and return `(body, sw1, sw2)`
    fn transmit(&mut self, apdu: &[u8]) -> Result<RawResponse, Error>;
}
