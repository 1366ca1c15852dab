//! NTAG424 instruction opcodes

use crate::error::Error;

/// Instruction bytes of the NTAG424 command set (proprietary class) and
/// the ISO 7816 wrappers used for NDEF access
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Ins {
    /// Select the PICC application
    SelectApplication = 0x5A,

    /// Hardware/software/production info, chained over three frames
    GetVersion = 0x60,

    /// Version byte of a key slot
    GetKeyVersion = 0x64,

    /// File identifiers within the application
    GetFileIds = 0x6F,

    /// Settings of a single file
    GetFileSettings = 0xF5,

    /// First phase of EV2 mutual authentication
    AuthenticateEv2First = 0x71,

    /// Continuation frame: second authentication phase, or a request for
    /// the next frame of a chained response
    AdditionalFrame = 0xAF,

    /// Rotate a key slot
    ChangeKey = 0xC4,

    /// Reconfigure file settings (including SDM)
    ChangeFileSettings = 0x5F,

    /// Write file data
    WriteData = 0x3D,

    /// Read file data
    ReadData = 0xAD,

    /// Read the 7-byte UID (encrypted response)
    GetCardUid = 0x51,

    /// Read the SDM read counter of a file (encrypted response)
    GetFileCounters = 0xF6,

    /// ISO SelectFile
    SelectFile = 0xA4,

    /// ISO ReadBinary
    ReadBinary = 0xB0,

    /// ISO UpdateBinary
    UpdateBinary = 0xD6,
}

impl Ins {
    /// Convert an unsigned byte into an `Ins` (if valid)
    pub fn from_u8(byte: u8) -> Result<Self, Error> {
        Ok(match byte {
            0x5A => Ins::SelectApplication,
            0x60 => Ins::GetVersion,
            0x64 => Ins::GetKeyVersion,
            0x6F => Ins::GetFileIds,
            0xF5 => Ins::GetFileSettings,
            0x71 => Ins::AuthenticateEv2First,
            0xAF => Ins::AdditionalFrame,
            0xC4 => Ins::ChangeKey,
            0x5F => Ins::ChangeFileSettings,
            0x3D => Ins::WriteData,
            0xAD => Ins::ReadData,
            0x51 => Ins::GetCardUid,
            0xF6 => Ins::GetFileCounters,
            0xA4 => Ins::SelectFile,
            0xB0 => Ins::ReadBinary,
            0xD6 => Ins::UpdateBinary,
            _ => fail!(Protocol, "invalid instruction byte: 0x{:02X}", byte),
        })
    }

    /// Serialize this instruction as its byte value
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// May responses to this instruction span multiple frames, chained
    /// via the more-data status?
    pub fn chains_response(self) -> bool {
        matches!(
            self,
            Ins::GetVersion | Ins::GetFileSettings | Ins::GetFileIds | Ins::ReadData
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for byte in 0..=0xFF {
            if let Ok(ins) = Ins::from_u8(byte) {
                assert_eq!(ins.to_u8(), byte);
            }
        }
    }

    #[test]
    fn chaining_set() {
        assert!(Ins::GetVersion.chains_response());
        assert!(!Ins::ChangeKey.chains_response());
    }
}
