//! EV2 mutual authentication
//!
//! A three-state machine (`Unauth -> Challenge -> Authenticated`) driven
//! over a [`RawChannel`]. Phase 1 obtains the tag's encrypted nonce;
//! phase 2 returns both nonces (ours plain, the tag's rotated) and
//! receives the transaction identifier plus our nonce rotated back. Only
//! after the rotated nonce verifies are session keys derived and an
//! [`AuthenticatedChannel`] handed out; the driver is the sole
//! constructor of that type.
//!
//! Any failure leaves the raw channel untouched and usable; the tag may
//! respond with an authentication-delay status after repeated failures,
//! which is surfaced as a non-retryable error for the current call.

mod keys;

pub use self::keys::SessionKeys;

use crate::{
    apdu::{Apdu, Ins},
    channel::{secure::AuthenticatedChannel, RawChannel},
    crypto,
    error::Error,
    key::{AesKey, KeyNo},
};
use rand_core::{OsRng, RngCore};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Authenticate with the given key, producing an authenticated channel
/// bound to the raw channel for its lifetime
pub fn authenticate<'a>(
    channel: &'a mut RawChannel,
    key_no: KeyNo,
    key: &AesKey,
) -> Result<AuthenticatedChannel<'a>, Error> {
    let mut rnd_a = Zeroizing::new([0u8; 16]);
    OsRng.fill_bytes(&mut *rnd_a);
    run_handshake(channel, key_no, key, &rnd_a)
}

/// Deterministic variant taking the PCD nonce explicitly.
///
/// Only for tests and simulators; production callers draw the nonce from
/// the system RNG via [`authenticate`].
#[cfg(any(test, feature = "mocktag"))]
pub fn authenticate_with_nonce<'a>(
    channel: &'a mut RawChannel,
    key_no: KeyNo,
    key: &AesKey,
    rnd_a: [u8; 16],
) -> Result<AuthenticatedChannel<'a>, Error> {
    run_handshake(channel, key_no, key, &rnd_a)
}

fn run_handshake<'a>(
    channel: &'a mut RawChannel,
    key_no: KeyNo,
    key: &AesKey,
    rnd_a: &[u8; 16],
) -> Result<AuthenticatedChannel<'a>, Error> {
    let zero_iv = [0u8; 16];

    // Phase 1: request the tag's nonce
    debug!("authenticating with key {}", key_no);

    let first = Apdu::proprietary(Ins::AuthenticateEv2First, vec![key_no.to_u8(), 0x00])?;
    let response = channel.transceive(&first)?;

    if !response.status.is_more_data() {
        response.status.check()?;
        fail!(
            Protocol,
            "expected challenge continuation, got {}",
            response.status
        );
    }

    ensure!(
        response.body.len() == 16,
        Protocol,
        "unexpected challenge length: {} (expected 16)",
        response.body.len()
    );

    let rnd_b = Zeroizing::new(recover_nonce(key, &response.body)?);

    // Phase 2: prove knowledge of the key by returning RndA || rotl(RndB)
    let mut challenge = Zeroizing::new([0u8; 32]);
    challenge[..16].copy_from_slice(rnd_a);
    challenge[16..].copy_from_slice(&crypto::rotate_left(&rnd_b));

    let second = Apdu::proprietary(
        Ins::AdditionalFrame,
        crypto::cbc_encrypt(key.as_bytes(), &zero_iv, &challenge[..])?,
    )?;
    let response = channel.transceive(&second)?;
    response.status.check()?;

    ensure!(
        response.body.len() == 32,
        Protocol,
        "unexpected authentication response length: {} (expected 32)",
        response.body.len()
    );

    let card_data = Zeroizing::new(crypto::cbc_decrypt(
        key.as_bytes(),
        &zero_iv,
        &response.body,
    )?);

    // TI(4) || RndA'(16) || PDcap2(6) || PCDcap2(6)
    let mut ti = [0u8; 4];
    ti.copy_from_slice(&card_data[0..4]);

    let rnd_a_rotated = crypto::rotate_left(rnd_a);
    if card_data[4..20].ct_eq(&rnd_a_rotated[..]).unwrap_u8() != 1 {
        fail!(Crypto, "rotated challenge mismatch in authentication response");
    }

    let keys = SessionKeys::derive(key, rnd_a, &rnd_b);
    debug!("authenticated with key {} (TI {:02x?})", key_no, ti);

    Ok(AuthenticatedChannel::new(channel, keys, ti))
}

/// Decrypt the tag's phase-1 challenge to recover `RndB`
fn recover_nonce(key: &AesKey, encrypted: &[u8]) -> Result<[u8; 16], Error> {
    let plain = Zeroizing::new(crypto::cbc_decrypt(key.as_bytes(), &[0u8; 16], encrypted)?);

    let mut rnd_b = [0u8; 16];
    rnd_b.copy_from_slice(&plain);
    Ok(rnd_b)
}
