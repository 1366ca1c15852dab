//! NTAG424 key material: AES-128 keys and key slot numbers

use crate::error::Error;
use std::fmt::{self, Debug};
use zeroize::Zeroize;

/// Size of an AES-128 key in bytes
pub const KEY_SIZE: usize = 16;

/// Number of key slots exposed by the PICC application
pub const KEY_COUNT: u8 = 5;

/// A 16-byte AES-128 key
#[derive(Clone, Eq, PartialEq)]
pub struct AesKey([u8; KEY_SIZE]);

impl AesKey {
    /// Create a key from the given byte array
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        AesKey(bytes)
    }

    /// Create a key from a slice, returning an error if it is not 16 bytes
    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        ensure!(
            slice.len() == KEY_SIZE,
            InvalidArgument,
            "expected {}-byte key, got {}",
            KEY_SIZE,
            slice.len()
        );

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(slice);
        Ok(AesKey(bytes))
    }

    /// Borrow the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// The all-zero factory default key
impl Default for AesKey {
    fn default() -> Self {
        AesKey([0u8; KEY_SIZE])
    }
}

impl Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Avoid leaking secrets in debug messages
        write!(f, "ntag424::AesKey(...)")
    }
}

impl Drop for AesKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl From<[u8; KEY_SIZE]> for AesKey {
    fn from(bytes: [u8; KEY_SIZE]) -> AesKey {
        AesKey::new(bytes)
    }
}

/// Key slot number within the PICC application.
///
/// Slot 0 holds the PICC master key; slots 1..=4 are application keys.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct KeyNo(u8);

impl KeyNo {
    /// The PICC master key slot
    pub const PICC_MASTER: KeyNo = KeyNo(0);

    /// Create a key number, validating it is within the tag's key count
    pub fn new(no: u8) -> Result<Self, Error> {
        ensure!(
            no < KEY_COUNT,
            InvalidArgument,
            "key number out of range: {} (max {})",
            no,
            KEY_COUNT - 1
        );

        Ok(KeyNo(no))
    }

    /// Does this slot hold the PICC master key?
    pub fn is_master(self) -> bool {
        self.0 == 0
    }

    /// Obtain the key number as a `u8`
    pub fn to_u8(self) -> u8 {
        self.0
    }
}

impl fmt::Display for KeyNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
