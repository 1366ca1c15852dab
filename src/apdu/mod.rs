//! APDU framing for the NTAG424 command set
//!
//! Commands travel as ISO 7816-4 short APDUs:
//! `CLA INS P1 P2 [Lc data] Le`. The proprietary DESFire-style command
//! set uses `CLA = 0x90` with `P1 = P2 = 0x00` and the command header and
//! payload concatenated into the data field; the ISO wrappers used for
//! NDEF access use `CLA = 0x00` with meaningful `P1`/`P2`.

pub mod ins;
pub mod response;
pub mod status;

pub use self::{ins::Ins, response::Response, status::StatusWord};

use crate::error::Error;

/// Class byte of the proprietary command set
pub const CLA_PROPRIETARY: u8 = 0x90;

/// Class byte of the ISO 7816 wrapper commands
pub const CLA_ISO: u8 = 0x00;

/// Maximum body bytes the tag returns in one frame of a chained response
pub const MAX_FRAME_BODY: usize = 60;

/// A command APDU
#[derive(Clone, Debug)]
pub struct Apdu {
    /// Class byte
    pub cla: u8,

    /// Instruction
    pub ins: Ins,

    /// First parameter byte
    pub p1: u8,

    /// Second parameter byte
    pub p2: u8,

    /// Data field: command header followed by the (possibly protected) payload
    pub data: Vec<u8>,

    /// Expected-length byte; `Some(0x00)` requests a maximum-length response
    pub le: Option<u8>,
}

impl Apdu {
    /// Create a proprietary-class command (`CLA = 0x90`, `P1 = P2 = 0`,
    /// `Le = 0x00`)
    pub fn proprietary(ins: Ins, data: Vec<u8>) -> Result<Self, Error> {
        ensure!(
            data.len() <= 0xFF,
            Protocol,
            "command data too long: {} bytes (max 255)",
            data.len()
        );

        Ok(Self {
            cla: CLA_PROPRIETARY,
            ins,
            p1: 0x00,
            p2: 0x00,
            data,
            le: Some(0x00),
        })
    }

    /// Create an ISO-class command
    pub fn iso(ins: Ins, p1: u8, p2: u8, data: Vec<u8>, le: Option<u8>) -> Result<Self, Error> {
        ensure!(
            data.len() <= 0xFF,
            Protocol,
            "command data too long: {} bytes (max 255)",
            data.len()
        );

        Ok(Self {
            cla: CLA_ISO,
            ins,
            p1,
            p2,
            data,
            le,
        })
    }

    /// The continuation request sent to collect further frames of a
    /// chained response (`90 AF 00 00 00`)
    pub fn continuation() -> Self {
        Self {
            cla: CLA_PROPRIETARY,
            ins: Ins::AdditionalFrame,
            p1: 0x00,
            p2: 0x00,
            data: Vec::new(),
            le: Some(0x00),
        }
    }

    /// Serialize this command to wire bytes. `Lc` is omitted when the
    /// data field is empty.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(6 + self.data.len());
        bytes.push(self.cla);
        bytes.push(self.ins.to_u8());
        bytes.push(self.p1);
        bytes.push(self.p2);

        if !self.data.is_empty() {
            bytes.push(self.data.len() as u8);
            bytes.extend_from_slice(&self.data);
        }

        if let Some(le) = self.le {
            bytes.push(le);
        }

        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_with_data() {
        let apdu = Apdu::proprietary(Ins::SelectApplication, vec![0x00, 0x00, 0x00]).unwrap();
        assert_eq!(
            apdu.serialize(),
            &[0x90, 0x5A, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn serialize_without_data_omits_lc() {
        let apdu = Apdu::proprietary(Ins::GetVersion, Vec::new()).unwrap();
        assert_eq!(apdu.serialize(), &[0x90, 0x60, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn continuation_frame() {
        assert_eq!(
            Apdu::continuation().serialize(),
            &[0x90, 0xAF, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn oversize_data_rejected() {
        assert!(Apdu::proprietary(Ins::WriteData, vec![0u8; 256]).is_err());
    }
}
