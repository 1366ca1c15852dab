//! GetFileIDs: enumerate files within the application

use crate::{
    apdu::{Apdu, Ins},
    channel::{secure::ResponseProtection, AuthenticatedChannel, RawChannel},
    error::Error,
    file::FileNo,
};

/// List the file numbers the application exposes
pub fn get_file_ids(channel: &mut RawChannel) -> Result<Vec<FileNo>, Error> {
    let body = channel.send(&Apdu::proprietary(Ins::GetFileIds, Vec::new())?)?;
    parse_ids(&body)
}

/// List file numbers over an authenticated session (MAC mode)
pub fn get_file_ids_authenticated(
    channel: &mut AuthenticatedChannel<'_>,
) -> Result<Vec<FileNo>, Error> {
    let body = channel.mac_only(Ins::GetFileIds, &[], &[])?;
    let data = channel.execute(Ins::GetFileIds, &[], body, ResponseProtection::Mac)?;
    parse_ids(&data)
}

fn parse_ids(body: &[u8]) -> Result<Vec<FileNo>, Error> {
    body.iter().map(|&no| FileNo::new(no)).collect()
}
