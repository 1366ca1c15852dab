//! ChangeKey: rotate a key slot
//!
//! Always CommMode FULL. The payload format differs by target slot:
//! changing the master key (the key the session was opened with) sends
//! the new key in the clear inside the encrypted payload; changing any
//! other key sends `NewKey XOR OldKey` plus a CRC32 of the new key so
//! the tag can confirm the XOR decoded correctly.
//!
//! A successful master-key change ends the session on the tag, so the
//! channel is expired afterwards: tear it down and re-authenticate with
//! the new key.

use crate::{
    apdu::Ins,
    channel::{secure::ResponseProtection, AuthenticatedChannel},
    crypto::{self, crc},
    error::Error,
    key::{AesKey, KeyNo},
};

/// Padded key-change payload length: two AES blocks
const PAYLOAD_LEN: usize = 32;

/// Change a key slot.
///
/// `old_key` is required for every slot except the master key and must
/// hold the slot's current value.
pub fn change_key(
    channel: &mut AuthenticatedChannel<'_>,
    key_no: KeyNo,
    new_key: &AesKey,
    old_key: Option<&AesKey>,
    key_version: u8,
) -> Result<(), Error> {
    let header = [key_no.to_u8()];
    let payload = build_payload(key_no, new_key, old_key, key_version)?;
    let body = channel.encrypt_and_mac(Ins::ChangeKey, &header, &payload)?;

    if key_no.is_master() {
        // The session dies with the old key; no response MAC will come
        channel.execute(Ins::ChangeKey, &header, body, ResponseProtection::Plain)?;
        channel.expire();
        debug!("master key changed; session expired");
    } else {
        channel.execute(Ins::ChangeKey, &header, body, ResponseProtection::Mac)?;
        debug!("key {} changed", key_no);
    }

    Ok(())
}

/// Assemble the padded 32-byte key-change payload
fn build_payload(
    key_no: KeyNo,
    new_key: &AesKey,
    old_key: Option<&AesKey>,
    key_version: u8,
) -> Result<Vec<u8>, Error> {
    let mut payload = Vec::with_capacity(PAYLOAD_LEN);

    if key_no.is_master() {
        payload.extend_from_slice(new_key.as_bytes());
        payload.push(key_version);
    } else {
        let old_key = old_key.ok_or_else(|| {
            err!(
                InvalidArgument,
                "changing key {} requires its current value",
                key_no
            )
        })?;

        for (new, old) in new_key.as_bytes().iter().zip(old_key.as_bytes()) {
            payload.push(new ^ old);
        }
        payload.push(key_version);
        payload.extend_from_slice(&crc::key_crc(new_key.as_bytes()));
    }

    crypto::pad(&mut payload);
    debug_assert_eq!(payload.len(), PAYLOAD_LEN);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    /// Independent re-implementation of the payload layout, kept solely
    /// to guard the production builder against regression
    mod reference {
        /// Bitwise CRC32 (IEEE, reflected, init/final 0xFFFFFFFF)
        pub fn crc32(data: &[u8]) -> u32 {
            let mut crc = 0xFFFF_FFFFu32;
            for &byte in data {
                crc ^= u32::from(byte);
                for _ in 0..8 {
                    crc = if crc & 1 != 0 {
                        (crc >> 1) ^ 0xEDB8_8320
                    } else {
                        crc >> 1
                    };
                }
            }
            crc ^ 0xFFFF_FFFF
        }

        pub fn master_payload(new_key: &[u8; 16], version: u8) -> [u8; 32] {
            let mut out = [0u8; 32];
            out[..16].copy_from_slice(new_key);
            out[16] = version;
            out[17] = 0x80;
            out
        }

        pub fn app_payload(new_key: &[u8; 16], old_key: &[u8; 16], version: u8) -> [u8; 32] {
            let mut out = [0u8; 32];
            for i in 0..16 {
                out[i] = new_key[i] ^ old_key[i];
            }
            out[16] = version;
            out[17..21].copy_from_slice(&(!crc32(new_key)).to_le_bytes());
            out[21] = 0x80;
            out
        }
    }

    /// AN12196 Table 26: the plaintext fed to the FULL-mode channel
    #[test]
    fn master_payload_vector() {
        let new_key = AesKey::new(hex!("5004BF991F408672B1EF00F08F9E8647"));
        let payload = build_payload(KeyNo::PICC_MASTER, &new_key, None, 0x01).unwrap();

        assert_eq!(
            payload,
            hex!(
                "5004BF991F408672B1EF00F08F9E8647"
                "01800000000000000000000000000000"
            )
        );
    }

    #[test]
    fn master_payload_matches_reference() {
        let new_key = AesKey::new([0x37u8; 16]);
        let payload = build_payload(KeyNo::PICC_MASTER, &new_key, None, 0x02).unwrap();
        assert_eq!(payload, reference::master_payload(new_key.as_bytes(), 0x02));
    }

    #[test]
    fn app_payload_matches_reference() {
        let new_key = AesKey::new(hex!("00112233445566778899AABBCCDDEEFF"));
        let old_key = AesKey::new(hex!("FFEEDDCCBBAA99887766554433221100"));
        let key_no = KeyNo::new(2).unwrap();

        let payload = build_payload(key_no, &new_key, Some(&old_key), 0x01).unwrap();
        assert_eq!(payload.len(), PAYLOAD_LEN);
        assert_eq!(
            payload,
            reference::app_payload(new_key.as_bytes(), old_key.as_bytes(), 0x01)
        );

        // XOR decodes back to the new key
        for i in 0..16 {
            assert_eq!(payload[i] ^ old_key.as_bytes()[i], new_key.as_bytes()[i]);
        }
    }

    #[test]
    fn app_payload_requires_old_key() {
        let new_key = AesKey::new([0u8; 16]);
        assert!(matches!(
            build_payload(KeyNo::new(1).unwrap(), &new_key, None, 0x00),
            Err(Error::InvalidArgument(_))
        ));
    }
}
