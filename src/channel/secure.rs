//! Secure messaging over an authenticated session
//!
//! The authenticated channel owns the session state: both session keys,
//! the transaction identifier the tag chose, and the 16-bit command
//! counter. The counter advances only after a command succeeds (and, for
//! protected responses, only after the response MAC verifies); the IV
//! and the MAC of a command both use the current counter value, so a
//! failed command can be retried without desynchronizing from the tag.
//!
//! A successful change of the PICC master key ends the session on the
//! tag side; the channel mirrors that by expiring itself, after which
//! every call fails locally without touching the transport. Session keys
//! are zeroed when the channel is dropped.

use super::RawChannel;
use crate::{
    apdu::{Apdu, Ins},
    crypto::{self, BLOCK_SIZE, MAC_SIZE},
    error::Error,
    session::SessionKeys,
};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// How a command's response is protected, deciding what must verify
/// before the counter advances
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ResponseProtection {
    /// Status word only (master-key change: the session is already gone)
    Plain,

    /// Trailing 8-byte MAC over the response body
    Mac,

    /// Trailing MAC, with the body encrypted under the response IV
    Full,
}

/// Authenticated command channel wrapping a [`RawChannel`] for the
/// lifetime of one EV2 session.
///
/// Only the authentication driver constructs this type; commands that
/// require secure messaging take it by `&mut`, so issuing them against
/// an unauthenticated channel is a compile error.
pub struct AuthenticatedChannel<'a> {
    channel: &'a mut RawChannel,
    keys: SessionKeys,
    ti: [u8; 4],
    cmd_ctr: u16,
    expired: bool,
}

impl<'a> std::fmt::Debug for AuthenticatedChannel<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedChannel")
            .field("ti", &self.ti)
            .field("cmd_ctr", &self.cmd_ctr)
            .field("expired", &self.expired)
            .finish_non_exhaustive()
    }
}

impl<'a> AuthenticatedChannel<'a> {
    /// Bind a fresh session to the raw channel. Counter starts at zero.
    pub(crate) fn new(channel: &'a mut RawChannel, keys: SessionKeys, ti: [u8; 4]) -> Self {
        Self {
            channel,
            keys,
            ti,
            cmd_ctr: 0,
            expired: false,
        }
    }

    /// The transaction identifier the tag assigned to this session
    pub fn transaction_id(&self) -> [u8; 4] {
        self.ti
    }

    /// Current command counter value
    pub fn command_counter(&self) -> u16 {
        self.cmd_ctr
    }

    /// Has this session been ended by a master-key change?
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Encrypt a block-aligned plaintext and append the command MAC.
    ///
    /// Returns `ciphertext || MAC8`, the protected portion of the data
    /// field. Payload builders pre-pad with method 2; the counter is not
    /// advanced here.
    pub fn encrypt_and_mac(
        &self,
        ins: Ins,
        header: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, Error> {
        self.check_active()?;

        let iv = self.command_iv();
        let mut body = crypto::cbc_encrypt(&self.keys.enc, &iv, plaintext)?;
        let mac = self.frame_mac(ins, header, &body);
        body.extend_from_slice(&mac);
        Ok(body)
    }

    /// Append the command MAC to a plaintext payload (`payload || MAC8`)
    pub fn mac_only(&self, ins: Ins, header: &[u8], payload: &[u8]) -> Result<Vec<u8>, Error> {
        self.check_active()?;

        let mut body = payload.to_vec();
        body.extend_from_slice(&self.frame_mac(ins, header, payload));
        Ok(body)
    }

    /// Transmit a protected command and settle the session state.
    ///
    /// `protected_body` is what [`Self::encrypt_and_mac`] or
    /// [`Self::mac_only`] produced. The counter advances exactly once,
    /// after the status is a success and any response MAC has verified;
    /// transport failures, error statuses, and MAC mismatches all leave
    /// it unchanged.
    pub(crate) fn execute(
        &mut self,
        ins: Ins,
        header: &[u8],
        protected_body: Vec<u8>,
        protection: ResponseProtection,
    ) -> Result<Vec<u8>, Error> {
        self.check_active()?;

        let mut data = header.to_vec();
        data.extend_from_slice(&protected_body);
        let body = self.channel.send(&Apdu::proprietary(ins, data)?)?;

        // Success status word: the MACed response code byte is SW2
        const RC_SUCCESS: u8 = 0x00;

        let result = match protection {
            ResponseProtection::Plain => body,
            ResponseProtection::Mac => self.verify_response_mac(RC_SUCCESS, &body)?,
            ResponseProtection::Full => {
                let verified = self.verify_response_mac(RC_SUCCESS, &body)?;
                ensure!(
                    !verified.is_empty(),
                    Protocol,
                    "expected encrypted response data from {:?}",
                    ins
                );
                crypto::cbc_decrypt_padded(&self.keys.enc, &self.response_iv(), &verified)?
            }
        };

        self.commit();
        Ok(result)
    }

    /// End the session locally. The next call fails without transmitting.
    pub(crate) fn expire(&mut self) {
        self.expired = true;
        self.keys.zeroize();
    }

    fn check_active(&self) -> Result<(), Error> {
        if self.expired {
            Err(Error::SessionExpired)
        } else {
            Ok(())
        }
    }

    /// IV for the outgoing command: `A5 5A || TI || CmdCtr || 00*8`,
    /// encrypted as a single block under the session encryption key
    fn command_iv(&self) -> [u8; BLOCK_SIZE] {
        self.iv_block([0xA5, 0x5A], self.cmd_ctr)
    }

    /// IV for an encrypted response: the mirrored `5A A5` prefix with the
    /// counter value the tag uses for its reply
    fn response_iv(&self) -> [u8; BLOCK_SIZE] {
        self.iv_block([0x5A, 0xA5], self.cmd_ctr.wrapping_add(1))
    }

    fn iv_block(&self, tag: [u8; 2], counter: u16) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[0..2].copy_from_slice(&tag);
        block[2..6].copy_from_slice(&self.ti);
        block[6..8].copy_from_slice(&counter.to_le_bytes());
        crypto::encrypt_block(&self.keys.enc, &mut block);
        block
    }

    /// Truncated MAC over `Cmd || CmdCtr || TI || Header || Payload`
    fn frame_mac(&self, ins: Ins, header: &[u8], payload: &[u8]) -> [u8; MAC_SIZE] {
        let mut input = Vec::with_capacity(7 + header.len() + payload.len());
        input.push(ins.to_u8());
        input.extend_from_slice(&self.cmd_ctr.to_le_bytes());
        input.extend_from_slice(&self.ti);
        input.extend_from_slice(header);
        input.extend_from_slice(payload);

        crypto::truncate_mac(&crypto::cmac(&self.keys.mac, &input))
    }

    /// Split and verify the trailing response MAC, computed over
    /// `RC || CmdCtr+1 || TI || body`
    fn verify_response_mac(&self, rc: u8, body: &[u8]) -> Result<Vec<u8>, Error> {
        ensure!(
            body.len() >= MAC_SIZE,
            Protocol,
            "response too short to carry a MAC: {} bytes",
            body.len()
        );

        let (data, mac) = body.split_at(body.len() - MAC_SIZE);

        let mut input = Vec::with_capacity(7 + data.len());
        input.push(rc);
        input.extend_from_slice(&self.cmd_ctr.wrapping_add(1).to_le_bytes());
        input.extend_from_slice(&self.ti);
        input.extend_from_slice(data);

        let expected = crypto::truncate_mac(&crypto::cmac(&self.keys.mac, &input));
        if expected[..].ct_eq(mac).unwrap_u8() != 1 {
            fail!(Crypto, "response MAC mismatch");
        }

        Ok(data.to_vec())
    }

    fn commit(&mut self) {
        match self.cmd_ctr.checked_add(1) {
            Some(next) => self.cmd_ctr = next,
            None => {
                // The 16-bit counter must never repeat within a session
                warn!("command counter exhausted; ending session");
                self.expire();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{self, RawResponse, Transport};
    use hex_literal::hex;

    /// Transport that panics if anything reaches it
    struct Unreachable;

    impl Transport for Unreachable {
        fn transmit(&mut self, _apdu: &[u8]) -> Result<RawResponse, transport::Error> {
            panic!("transport must not be touched");
        }
    }

    fn test_channel(raw: &mut RawChannel) -> AuthenticatedChannel<'_> {
        // AN12196 Table 26 session values
        let keys = SessionKeys {
            enc: hex!("4CF3CB41A22583A61E89B158D252FC53"),
            mac: hex!("5529860B2FC5FB6154B7F28361D30BF9"),
        };
        let mut channel = AuthenticatedChannel::new(raw, keys, hex!("7614281A"));
        channel.cmd_ctr = 0x0003;
        channel
    }

    /// AN12196 Table 26: IV synthesis
    #[test]
    fn command_iv_vector() {
        let mut raw = RawChannel::new(Box::new(Unreachable));
        let channel = test_channel(&mut raw);
        assert_eq!(
            channel.command_iv(),
            hex!("01602D579423B2797BE8B478B0B4D27B")
        );
    }

    /// AN12196 Table 26: the full protected ChangeKey data field and APDU
    #[test]
    fn change_key_frame_vector() {
        let mut raw = RawChannel::new(Box::new(Unreachable));
        let channel = test_channel(&mut raw);

        let plaintext = hex!(
            "5004BF991F408672B1EF00F08F9E8647"
            "01800000000000000000000000000000"
        );
        let body = channel
            .encrypt_and_mac(Ins::ChangeKey, &[0x00], &plaintext)
            .unwrap();

        assert_eq!(
            body,
            hex!(
                "C0EB4DEEFEDDF0B513A03A95A7549181"
                "8580503190D4D05053FF75668A01D6FD"
                "A6610234BDED6432"
            )
        );

        let mut data = vec![0x00];
        data.extend_from_slice(&body);
        let apdu = Apdu::proprietary(Ins::ChangeKey, data).unwrap();
        assert_eq!(
            apdu.serialize(),
            hex!(
                "90C4000029 00"
                "C0EB4DEEFEDDF0B513A03A95A7549181"
                "8580503190D4D05053FF75668A01D6FD"
                "A6610234BDED6432 00"
            )
        );
    }

    #[test]
    fn expired_channel_fails_without_transmitting() {
        let mut raw = RawChannel::new(Box::new(Unreachable));
        let mut channel = test_channel(&mut raw);
        channel.expire();

        assert!(matches!(
            channel.encrypt_and_mac(Ins::ChangeKey, &[0x01], &[0u8; 16]),
            Err(Error::SessionExpired)
        ));
        assert!(matches!(
            channel.execute(Ins::GetCardUid, &[], Vec::new(), ResponseProtection::Full),
            Err(Error::SessionExpired)
        ));
    }

    #[test]
    fn counter_unchanged_until_commit() {
        let mut raw = RawChannel::new(Box::new(Unreachable));
        let channel = test_channel(&mut raw);

        // Building protected payloads is pure with respect to the counter
        let before = channel.command_counter();
        channel
            .encrypt_and_mac(Ins::ChangeKey, &[0x00], &[0u8; 32])
            .unwrap();
        channel.mac_only(Ins::GetKeyVersion, &[0x01], &[]).unwrap();
        assert_eq!(channel.command_counter(), before);
    }
}
