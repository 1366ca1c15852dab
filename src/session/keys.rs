//! Session keys derived from the EV2 authentication exchange
//!
//! Both parties derive `SesAuthENC` and `SesAuthMAC` by CMACing a 32-byte
//! session vector (SV1/SV2) under the key that authenticated the session.
//! The vectors interleave the two nonces in a fixed layout; any deviation
//! produces keys whose session completes authentication but fails its
//! first command with an integrity error.

use crate::{crypto, key::AesKey};
use zeroize::Zeroize;

/// Length of a session vector
const SV_SIZE: usize = 32;

/// The pair of session keys backing an authenticated channel
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct SessionKeys {
    /// Session encryption key (`SesAuthENC`)
    pub(crate) enc: [u8; 16],

    /// Session MAC key (`SesAuthMAC`)
    pub(crate) mac: [u8; 16],
}

impl SessionKeys {
    /// Derive both session keys from the authenticating key and the two
    /// nonces recovered during the handshake
    pub fn derive(key: &AesKey, rnd_a: &[u8; 16], rnd_b: &[u8; 16]) -> Self {
        let enc = crypto::cmac(key.as_bytes(), &session_vector([0xA5, 0x5A], rnd_a, rnd_b));
        let mac = crypto::cmac(key.as_bytes(), &session_vector([0x5A, 0xA5], rnd_a, rnd_b));

        Self { enc, mac }
    }
}

/// Assemble SV1 (`A5 5A ...`) or SV2 (`5A A5 ...`).
///
/// Layout after the 2-byte tag: `00 01 00 80`, then `RndA[15..14]`,
/// `RndA[13..8] XOR RndB[15..10]`, `RndB[9..0]`, `RndA[7..0]` (the
/// datasheet numbers bytes with 15 leftmost).
fn session_vector(tag: [u8; 2], rnd_a: &[u8; 16], rnd_b: &[u8; 16]) -> [u8; SV_SIZE] {
    let mut sv = [0u8; SV_SIZE];
    sv[0..2].copy_from_slice(&tag);
    sv[2..6].copy_from_slice(&[0x00, 0x01, 0x00, 0x80]);
    sv[6..8].copy_from_slice(&rnd_a[0..2]);

    for i in 0..6 {
        sv[8 + i] = rnd_a[2 + i] ^ rnd_b[i];
    }

    sv[14..24].copy_from_slice(&rnd_b[6..16]);
    sv[24..32].copy_from_slice(&rnd_a[8..16]);
    sv
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    /// AN12343 Table 40
    #[test]
    fn derivation_vector() {
        let key = AesKey::default();
        let rnd_a = hex!("B04D0787C93EE0CC8CACC8E86F16C6FE");
        let rnd_b = hex!("FA659AD0DCA738DD65DC7DC38612AD81");

        let keys = SessionKeys::derive(&key, &rnd_a, &rnd_b);
        assert_eq!(keys.enc, hex!("7A93D6571E4B180FCA6AC90C9A7488D4"));
        assert_eq!(keys.mac, hex!("FC4AF159B62E549B5812394CAB1918CC"));
    }

    #[test]
    fn vectors_differ_only_in_tag() {
        let rnd_a = [0x11u8; 16];
        let rnd_b = [0x22u8; 16];

        let sv1 = session_vector([0xA5, 0x5A], &rnd_a, &rnd_b);
        let sv2 = session_vector([0x5A, 0xA5], &rnd_a, &rnd_b);
        assert_eq!(sv1[2..], sv2[2..]);
        assert_ne!(sv1[..2], sv2[..2]);
    }
}
