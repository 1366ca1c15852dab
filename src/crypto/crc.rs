//! CRC32 as the tag embeds it in key-change payloads
//!
//! IEEE polynomial, reflected, initial value and final XOR `0xFFFFFFFF`
//! (the zip/gzip variant). The ChangeKey payload carries the bitwise
//! complement of this checksum, serialized little-endian.

use crc::{Crc, CRC_32_ISO_HDLC};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// IEEE CRC32 of a byte string
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// The complemented, little-endian CRC32 of a new key, as embedded in
/// application-key ChangeKey payloads
pub fn key_crc(new_key: &[u8]) -> [u8; 4] {
    (!crc32(new_key)).to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Standard check value for the zip/gzip CRC32 variant
    #[test]
    fn check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    /// Inverting the serialized value recovers the plain checksum
    #[test]
    fn key_crc_inverts() {
        let key = [0x5Au8; 16];
        let embedded = key_crc(&key);
        assert_eq!(!u32::from_le_bytes(embedded), crc32(&key));
    }
}
