//! GetKeyVersion: version byte of a key slot

use crate::{
    apdu::{Apdu, Ins},
    channel::{secure::ResponseProtection, AuthenticatedChannel, RawChannel},
    error::Error,
    key::KeyNo,
};

/// Read a key slot's version without authentication
pub fn get_key_version(channel: &mut RawChannel, key_no: KeyNo) -> Result<u8, Error> {
    let apdu = Apdu::proprietary(Ins::GetKeyVersion, vec![key_no.to_u8()])?;
    let body = channel.send(&apdu)?;
    parse_version(&body)
}

/// Read a key slot's version over an authenticated session (MAC mode)
pub fn get_key_version_authenticated(
    channel: &mut AuthenticatedChannel<'_>,
    key_no: KeyNo,
) -> Result<u8, Error> {
    let header = [key_no.to_u8()];
    let body = channel.mac_only(Ins::GetKeyVersion, &header, &[])?;
    let data = channel.execute(Ins::GetKeyVersion, &header, body, ResponseProtection::Mac)?;
    parse_version(&data)
}

fn parse_version(body: &[u8]) -> Result<u8, Error> {
    ensure!(
        body.len() == 1,
        Protocol,
        "unexpected GetKeyVersion length: {}",
        body.len()
    );
    Ok(body[0])
}
