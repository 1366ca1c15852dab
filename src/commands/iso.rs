//! ISO 7816 wrappers for unauthenticated NDEF access
//!
//! When the NDEF file's access rights permit free read/write, the file
//! is reachable through standard SelectFile / ReadBinary / UpdateBinary
//! without a session. Writes are chunked the same way authenticated
//! writes are.

use super::{WriteError, WRITE_CHUNK};
use crate::{
    apdu::{Apdu, Ins},
    channel::RawChannel,
    error::Error,
};

/// DF name of the NDEF application (NFC Forum type 4)
pub const NDEF_APPLICATION_NAME: [u8; 7] = [0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01];

/// ISO file identifier of the capability container
pub const CC_FILE_ID: u16 = 0xE103;

/// ISO file identifier of the NDEF data file
pub const NDEF_FILE_ID: u16 = 0xE104;

/// Select the NDEF application by DF name
pub fn select_ndef_application(channel: &mut RawChannel) -> Result<(), Error> {
    let apdu = Apdu::iso(
        Ins::SelectFile,
        0x04,
        0x0C,
        NDEF_APPLICATION_NAME.to_vec(),
        None,
    )?;
    channel.send(&apdu)?;
    Ok(())
}

/// Select a file by its ISO identifier
pub fn select_file(channel: &mut RawChannel, file_id: u16) -> Result<(), Error> {
    let apdu = Apdu::iso(
        Ins::SelectFile,
        0x00,
        0x0C,
        file_id.to_be_bytes().to_vec(),
        None,
    )?;
    channel.send(&apdu)?;
    Ok(())
}

/// Read from the selected file. `length == 0` requests the maximum the
/// tag will return in one response.
pub fn read_binary(channel: &mut RawChannel, offset: u16, length: u8) -> Result<Vec<u8>, Error> {
    ensure!(
        offset < 1 << 15,
        InvalidArgument,
        "ISO read offset out of range: {}",
        offset
    );

    let apdu = Apdu::iso(
        Ins::ReadBinary,
        (offset >> 8) as u8,
        offset as u8,
        Vec::new(),
        Some(length),
    )?;
    channel.send(&apdu)
}

/// Write one chunk to the selected file
pub fn update_binary(channel: &mut RawChannel, offset: u16, data: &[u8]) -> Result<(), Error> {
    ensure!(
        offset < 1 << 15,
        InvalidArgument,
        "ISO write offset out of range: {}",
        offset
    );

    let apdu = Apdu::iso(
        Ins::UpdateBinary,
        (offset >> 8) as u8,
        offset as u8,
        data.to_vec(),
        None,
    )?;
    let body = channel.send(&apdu)?;

    ensure!(
        body.is_empty(),
        Protocol,
        "unexpected UpdateBinary response: {} bytes",
        body.len()
    );

    Ok(())
}

/// Select the NDEF application and file, then write the full file
/// content in chunks. The content is raw file bytes (length prefix
/// included); building NDEF records is a concern for higher layers.
pub fn write_ndef_file(channel: &mut RawChannel, content: &[u8]) -> Result<(), WriteError> {
    let at = |offset: u32| move |source: Error| WriteError { offset, source };

    if content.len() > usize::from(u16::MAX) {
        return Err(at(0)(err!(
            InvalidArgument,
            "NDEF content too large: {} bytes",
            content.len()
        )));
    }

    select_ndef_application(channel).map_err(at(0))?;
    select_file(channel, NDEF_FILE_ID).map_err(at(0))?;

    let mut written = 0usize;
    for chunk in content.chunks(WRITE_CHUNK) {
        update_binary(channel, written as u16, chunk)
            .map_err(at(written as u32))?;
        written += chunk.len();
    }

    Ok(())
}
