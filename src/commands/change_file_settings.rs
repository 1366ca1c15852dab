//! ChangeFileSettings: reconfigure a file, including SDM
//!
//! Always CommMode FULL regardless of the file's own mode. Some tag
//! populations report a length error (`0x917E`) for payloads matching
//! the documented layout; that status is surfaced verbatim rather than
//! worked around here.

use crate::{
    apdu::Ins,
    channel::{secure::ResponseProtection, AuthenticatedChannel},
    crypto,
    error::Error,
    file::{FileNo, FileSettings},
};

/// Apply new settings to a file
pub fn change_file_settings(
    channel: &mut AuthenticatedChannel<'_>,
    file_no: FileNo,
    settings: &FileSettings,
) -> Result<(), Error> {
    let header = [file_no.to_u8()];

    let mut payload = settings.change_payload()?;
    crypto::pad(&mut payload);

    let body = channel.encrypt_and_mac(Ins::ChangeFileSettings, &header, &payload)?;
    let data = channel.execute(Ins::ChangeFileSettings, &header, body, ResponseProtection::Mac)?;

    ensure!(
        data.is_empty(),
        Protocol,
        "unexpected ChangeFileSettings response: {} bytes",
        data.len()
    );

    debug!("file {} settings changed", file_no.to_u8());
    Ok(())
}
