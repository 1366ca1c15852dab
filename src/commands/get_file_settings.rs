//! GetFileSettings: read a file's configuration

use crate::{
    apdu::{Apdu, Ins},
    channel::{secure::ResponseProtection, AuthenticatedChannel, RawChannel},
    error::Error,
    file::{FileInfo, FileNo},
};

/// Read file settings without authentication (files whose settings are
/// plain-readable)
pub fn get_file_settings(channel: &mut RawChannel, file_no: FileNo) -> Result<FileInfo, Error> {
    let apdu = Apdu::proprietary(Ins::GetFileSettings, vec![file_no.to_u8()])?;
    let body = channel.send(&apdu)?;
    FileInfo::parse(&body)
}

/// Read file settings over an authenticated session (MAC mode)
pub fn get_file_settings_authenticated(
    channel: &mut AuthenticatedChannel<'_>,
    file_no: FileNo,
) -> Result<FileInfo, Error> {
    let header = [file_no.to_u8()];
    let body = channel.mac_only(Ins::GetFileSettings, &header, &[])?;
    let data = channel.execute(Ins::GetFileSettings, &header, body, ResponseProtection::Mac)?;
    FileInfo::parse(&data)
}
