//! WriteData: chunked writes of file data
//!
//! Large writes split into chunks sized so each APDU stays within the
//! transport frame bound. Every chunk is an independent authenticated
//! command (the counter advances per chunk); a failure partway reports
//! the offset reached so the caller can resume or abort.

use super::{WriteError, WRITE_CHUNK};
use crate::{
    apdu::Ins,
    channel::{secure::ResponseProtection, AuthenticatedChannel},
    crypto,
    error::Error,
    file::{CommMode, FileNo},
};

/// Write `data` to a file starting at `offset`, in the file's
/// communication mode (MAC or FULL; plain-mode files are written
/// unauthenticated through the ISO wrappers)
pub fn write_data(
    channel: &mut AuthenticatedChannel<'_>,
    file_no: FileNo,
    offset: u32,
    data: &[u8],
    mode: CommMode,
) -> Result<(), WriteError> {
    let at = |offset: u32| move |source: Error| WriteError { offset, source };

    if mode == CommMode::Plain {
        return Err(at(offset)(err!(
            InvalidArgument,
            "plain-mode files are written via the ISO wrappers"
        )));
    }

    let end = u64::from(offset) + data.len() as u64;
    if end > 1 << 24 {
        return Err(at(offset)(err!(
            InvalidArgument,
            "write extends past the 24-bit address space: {}",
            end
        )));
    }

    let mut written = 0usize;
    for chunk in data.chunks(WRITE_CHUNK) {
        let chunk_offset = offset + written as u32;
        write_chunk(channel, file_no, chunk_offset, chunk, mode).map_err(at(chunk_offset))?;
        written += chunk.len();
    }

    Ok(())
}

/// One authenticated WriteData round trip
fn write_chunk(
    channel: &mut AuthenticatedChannel<'_>,
    file_no: FileNo,
    offset: u32,
    chunk: &[u8],
    mode: CommMode,
) -> Result<(), Error> {
    let mut header = Vec::with_capacity(7);
    header.push(file_no.to_u8());
    header.extend_from_slice(&offset.to_le_bytes()[..3]);
    header.extend_from_slice(&(chunk.len() as u32).to_le_bytes()[..3]);

    let body = match mode {
        CommMode::Full => {
            let mut padded = chunk.to_vec();
            crypto::pad(&mut padded);
            channel.encrypt_and_mac(Ins::WriteData, &header, &padded)?
        }
        _ => channel.mac_only(Ins::WriteData, &header, chunk)?,
    };

    let data = channel.execute(Ins::WriteData, &header, body, ResponseProtection::Mac)?;
    ensure!(
        data.is_empty(),
        Protocol,
        "unexpected WriteData response: {} bytes",
        data.len()
    );

    trace!("wrote {} bytes at offset {}", chunk.len(), offset);
    Ok(())
}
