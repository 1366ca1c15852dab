//! GetCardUid: read the 7-byte UID over an encrypted response
//!
//! Useful when random ID is enabled and the anticollision UID is
//! ephemeral. The UID only travels inside a FULL-mode response.

use crate::{
    apdu::Ins,
    channel::{secure::ResponseProtection, AuthenticatedChannel},
    error::Error,
};

/// Read the tag's real UID
pub fn get_card_uid(channel: &mut AuthenticatedChannel<'_>) -> Result<[u8; 7], Error> {
    let body = channel.mac_only(Ins::GetCardUid, &[], &[])?;
    let data = channel.execute(Ins::GetCardUid, &[], body, ResponseProtection::Full)?;

    ensure!(
        data.len() == 7,
        Protocol,
        "unexpected UID length: {}",
        data.len()
    );

    let mut uid = [0u8; 7];
    uid.copy_from_slice(&data);
    Ok(uid)
}
