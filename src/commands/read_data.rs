//! ReadData: authenticated reads of file data
//!
//! Long responses arrive chained over more-data frames; the channel
//! reassembles them before the MAC is checked.

use crate::{
    apdu::Ins,
    channel::{secure::ResponseProtection, AuthenticatedChannel},
    error::Error,
    file::{CommMode, FileNo},
};

/// Read `length` bytes from a file starting at `offset` in the file's
/// communication mode. `length == 0` reads to the end of the file.
pub fn read_data(
    channel: &mut AuthenticatedChannel<'_>,
    file_no: FileNo,
    offset: u32,
    length: u32,
    mode: CommMode,
) -> Result<Vec<u8>, Error> {
    ensure!(
        offset < 1 << 24 && length < 1 << 24,
        InvalidArgument,
        "offset or length does not fit in 24 bits"
    );

    let protection = match mode {
        CommMode::Full => ResponseProtection::Full,
        CommMode::Mac => ResponseProtection::Mac,
        CommMode::Plain => fail!(
            InvalidArgument,
            "plain-mode files are read via the ISO wrappers"
        ),
    };

    let mut header = Vec::with_capacity(7);
    header.push(file_no.to_u8());
    header.extend_from_slice(&offset.to_le_bytes()[..3]);
    header.extend_from_slice(&length.to_le_bytes()[..3]);

    let body = channel.mac_only(Ins::ReadData, &header, &[])?;
    let data = channel.execute(Ins::ReadData, &header, body, protection)?;

    if length > 0 {
        ensure!(
            data.len() == length as usize,
            Protocol,
            "short read: {} of {} bytes",
            data.len(),
            length
        );
    }

    Ok(data)
}
