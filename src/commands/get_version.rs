//! GetVersion: hardware, software, and production info
//!
//! The tag answers in three chained frames (hardware, software,
//! production data including the UID); the channel's continuation loop
//! reassembles them.

use crate::{
    apdu::{Apdu, Ins},
    channel::RawChannel,
    error::Error,
};

/// Length of the reassembled GetVersion body
const VERSION_LEN: usize = 28;

/// Version of one tag component (hardware or software)
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ComponentVersion {
    /// Vendor identifier (`0x04` = NXP)
    pub vendor_id: u8,

    /// Product type
    pub product_type: u8,

    /// Product subtype
    pub product_subtype: u8,

    /// Major version
    pub major: u8,

    /// Minor version
    pub minor: u8,

    /// Storage size code
    pub storage_size: u8,

    /// Protocol type
    pub protocol: u8,
}

impl ComponentVersion {
    fn parse(bytes: &[u8]) -> Self {
        Self {
            vendor_id: bytes[0],
            product_type: bytes[1],
            product_subtype: bytes[2],
            major: bytes[3],
            minor: bytes[4],
            storage_size: bytes[5],
            protocol: bytes[6],
        }
    }
}

/// Everything GetVersion reports
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VersionInfo {
    /// Hardware component version
    pub hardware: ComponentVersion,

    /// Software component version
    pub software: ComponentVersion,

    /// 7-byte UID
    pub uid: [u8; 7],

    /// Production batch number
    pub batch: [u8; 5],

    /// Production calendar week (BCD)
    pub production_week: u8,

    /// Production year (BCD)
    pub production_year: u8,
}

/// Read the tag's version and production info
pub fn get_version(channel: &mut RawChannel) -> Result<VersionInfo, Error> {
    let body = channel.send(&Apdu::proprietary(Ins::GetVersion, Vec::new())?)?;

    ensure!(
        body.len() == VERSION_LEN,
        Protocol,
        "unexpected GetVersion length: {} (expected {})",
        body.len(),
        VERSION_LEN
    );

    let mut uid = [0u8; 7];
    uid.copy_from_slice(&body[14..21]);

    let mut batch = [0u8; 5];
    batch.copy_from_slice(&body[21..26]);

    Ok(VersionInfo {
        hardware: ComponentVersion::parse(&body[0..7]),
        software: ComponentVersion::parse(&body[7..14]),
        uid,
        batch,
        production_week: body[26],
        production_year: body[27],
    })
}
