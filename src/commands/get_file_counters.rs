//! GetFileCounters: read a file's SDM read counter

use crate::{
    apdu::Ins,
    channel::{secure::ResponseProtection, AuthenticatedChannel},
    error::Error,
    file::FileNo,
};

/// Read the SDM read counter of a file. Only meaningful when SDM is
/// enabled on that file.
pub fn get_file_counters(
    channel: &mut AuthenticatedChannel<'_>,
    file_no: FileNo,
) -> Result<u32, Error> {
    let header = [file_no.to_u8()];
    let body = channel.mac_only(Ins::GetFileCounters, &header, &[])?;
    let data = channel.execute(Ins::GetFileCounters, &header, body, ResponseProtection::Full)?;

    ensure!(
        data.len() >= 3,
        Protocol,
        "unexpected counter response length: {}",
        data.len()
    );

    let mut bytes = [0u8; 4];
    bytes[..3].copy_from_slice(&data[..3]);
    Ok(u32::from_le_bytes(bytes))
}
