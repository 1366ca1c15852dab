//! Files within the PICC application: identifiers, access rights, and
//! the file-settings payload (including Secure Dynamic Messaging)
//!
//! The tag exposes three standard data files. Each carries a
//! communication mode, four access conditions packed into two bytes, and
//! optionally an SDM configuration whose serialized form appends a
//! variable set of 3-byte little-endian offsets, each present only when
//! the matching option bit and access role call for it.

use crate::{
    error::Error,
    key::{KeyNo, KEY_COUNT},
};
use bitflags::bitflags;

/// File number within the PICC application
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct FileNo(u8);

impl FileNo {
    /// Capability container file
    pub const CAPABILITY_CONTAINER: FileNo = FileNo(1);

    /// NDEF data file (the SDM mirror target)
    pub const NDEF: FileNo = FileNo(2);

    /// Proprietary data file
    pub const PROPRIETARY: FileNo = FileNo(3);

    /// Create a file number, validating it addresses one of the tag's files
    pub fn new(no: u8) -> Result<Self, Error> {
        ensure!(
            (1..=3).contains(&no),
            InvalidArgument,
            "file number out of range: {}",
            no
        );
        Ok(FileNo(no))
    }

    /// Obtain the file number as a `u8`
    pub fn to_u8(self) -> u8 {
        self.0
    }
}

/// Per-file protection mode
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommMode {
    /// No protection
    Plain,

    /// Plaintext payload with an appended MAC
    Mac,

    /// Encrypted payload with an appended MAC
    Full,
}

impl CommMode {
    /// The two mode bits as they appear in a file option byte
    pub(crate) fn bits(self) -> u8 {
        match self {
            CommMode::Plain => 0b00,
            CommMode::Mac => 0b01,
            CommMode::Full => 0b11,
        }
    }

    /// Decode the two mode bits (`0b10` is an alternate plain encoding)
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b01 => CommMode::Mac,
            0b11 => CommMode::Full,
            _ => CommMode::Plain,
        }
    }
}

/// One access condition nibble: a key slot, free access, or never
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AccessCondition {
    /// Access requires authentication with the given key
    Key(KeyNo),

    /// Access without authentication (`0xE`)
    Free,

    /// Access denied entirely (`0xF`)
    Never,
}

impl AccessCondition {
    /// Is this condition free access?
    pub fn is_free(self) -> bool {
        self == AccessCondition::Free
    }

    /// Is this condition denied entirely?
    pub fn is_never(self) -> bool {
        self == AccessCondition::Never
    }

    pub(crate) fn nibble(self) -> u8 {
        match self {
            AccessCondition::Key(no) => no.to_u8(),
            AccessCondition::Free => 0xE,
            AccessCondition::Never => 0xF,
        }
    }

    pub(crate) fn from_nibble(nibble: u8) -> Result<Self, Error> {
        Ok(match nibble {
            n if n < KEY_COUNT => AccessCondition::Key(KeyNo::new(n)?),
            0xE => AccessCondition::Free,
            0xF => AccessCondition::Never,
            n => fail!(Protocol, "invalid access condition nibble: 0x{:X}", n),
        })
    }
}

/// The four access conditions of a file, packed into two bytes on the
/// wire (`Read | Write` in the high byte, `ReadWrite | Change` in the
/// low byte, little-endian)
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AccessRights {
    /// Who may read
    pub read: AccessCondition,

    /// Who may write
    pub write: AccessCondition,

    /// Who may both read and write
    pub read_write: AccessCondition,

    /// Who may change these settings
    pub change: AccessCondition,
}

impl AccessRights {
    /// Serialize to the two wire bytes
    pub fn to_bytes(self) -> [u8; 2] {
        let packed = (u16::from(self.read.nibble()) << 12)
            | (u16::from(self.write.nibble()) << 8)
            | (u16::from(self.read_write.nibble()) << 4)
            | u16::from(self.change.nibble());
        packed.to_le_bytes()
    }

    /// Parse from the two wire bytes
    pub fn from_bytes(bytes: [u8; 2]) -> Result<Self, Error> {
        let packed = u16::from_le_bytes(bytes);
        Ok(Self {
            read: AccessCondition::from_nibble((packed >> 12) as u8 & 0xF)?,
            write: AccessCondition::from_nibble((packed >> 8) as u8 & 0xF)?,
            read_write: AccessCondition::from_nibble((packed >> 4) as u8 & 0xF)?,
            change: AccessCondition::from_nibble(packed as u8 & 0xF)?,
        })
    }
}

bitflags! {
    /// SDM option bits: mirror enables and counter behavior.
    ///
    /// The SDM-enable flag itself lives in the file option byte, not here.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct SdmOptions: u8 {
        /// Mirror the UID into the file
        const UID_MIRROR = 0x80;

        /// Mirror the SDM read counter into the file
        const READ_COUNTER = 0x40;

        /// Stop SDM output once the read counter reaches a limit
        const READ_COUNTER_LIMIT = 0x20;

        /// Encrypt part of the file data per read
        const ENCRYPT_FILE_DATA = 0x10;

        /// Mirror data as ASCII hex rather than raw bytes
        const ASCII_ENCODING = 0x01;
    }
}

/// Access roles governing SDM mirroring and counter retrieval, packed
/// into two bytes with the reserved high nibble set to `0xF`
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SdmAccessRights {
    /// Who may read mirrored meta data (free = plaintext mirrors,
    /// a key = encrypted PICC data, never = no meta mirror)
    pub meta_read: AccessCondition,

    /// Who may verify the SDM MAC (never disables MAC mirroring)
    pub file_read: AccessCondition,

    /// Who may retrieve the read counter with GetFileCounters
    pub counter_retrieve: AccessCondition,
}

impl SdmAccessRights {
    /// Serialize to the two wire bytes
    pub fn to_bytes(self) -> [u8; 2] {
        let packed = 0xF000
            | (u16::from(self.counter_retrieve.nibble()) << 8)
            | (u16::from(self.meta_read.nibble()) << 4)
            | u16::from(self.file_read.nibble());
        packed.to_le_bytes()
    }

    /// Parse from the two wire bytes
    pub fn from_bytes(bytes: [u8; 2]) -> Result<Self, Error> {
        let packed = u16::from_le_bytes(bytes);
        Ok(Self {
            counter_retrieve: AccessCondition::from_nibble((packed >> 8) as u8 & 0xF)?,
            meta_read: AccessCondition::from_nibble((packed >> 4) as u8 & 0xF)?,
            file_read: AccessCondition::from_nibble(packed as u8 & 0xF)?,
        })
    }
}

/// Secure Dynamic Messaging configuration.
///
/// Offsets are 24-bit positions into the file. Which offsets must be
/// present follows from the options and access roles; the serializer
/// rejects configurations that disagree with their offsets.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SdmSettings {
    /// Mirror/counter option bits
    pub options: SdmOptions,

    /// SDM access roles
    pub access: SdmAccessRights,

    /// UID mirror position (plain meta read only)
    pub uid_offset: Option<u32>,

    /// Read counter mirror position (plain meta read only)
    pub read_counter_offset: Option<u32>,

    /// Encrypted PICC-data mirror position (keyed meta read only)
    pub picc_data_offset: Option<u32>,

    /// Start of the MAC input window
    pub mac_input_offset: Option<u32>,

    /// Encrypted file data position
    pub enc_data_offset: Option<u32>,

    /// Encrypted file data length
    pub enc_data_length: Option<u32>,

    /// MAC mirror position
    pub mac_offset: Option<u32>,

    /// Read counter limit value
    pub read_counter_limit: Option<u32>,
}

impl SdmSettings {
    fn serialize_into(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        out.push(self.options.bits());
        out.extend_from_slice(&self.access.to_bytes());

        if self.options.contains(SdmOptions::UID_MIRROR) && self.access.meta_read.is_free() {
            push_u24(out, self.required(self.uid_offset, "uid_offset")?)?;
        }

        if self.options.contains(SdmOptions::READ_COUNTER) && self.access.meta_read.is_free() {
            push_u24(out, self.required(self.read_counter_offset, "read_counter_offset")?)?;
        }

        if matches!(self.access.meta_read, AccessCondition::Key(_)) {
            push_u24(out, self.required(self.picc_data_offset, "picc_data_offset")?)?;
        }

        if !self.access.file_read.is_never() {
            push_u24(out, self.required(self.mac_input_offset, "mac_input_offset")?)?;

            if self.options.contains(SdmOptions::ENCRYPT_FILE_DATA) {
                push_u24(out, self.required(self.enc_data_offset, "enc_data_offset")?)?;
                push_u24(out, self.required(self.enc_data_length, "enc_data_length")?)?;
            }

            push_u24(out, self.required(self.mac_offset, "mac_offset")?)?;
        } else {
            ensure!(
                !self.options.contains(SdmOptions::ENCRYPT_FILE_DATA),
                InvalidArgument,
                "encrypted file data requires a readable file"
            );
        }

        if self.options.contains(SdmOptions::READ_COUNTER_LIMIT) {
            push_u24(out, self.required(self.read_counter_limit, "read_counter_limit")?)?;
        }

        Ok(())
    }

    fn parse(input: &mut &[u8]) -> Result<Self, Error> {
        ensure!(input.len() >= 3, Protocol, "truncated SDM settings");

        let options = SdmOptions::from_bits(input[0])
            .ok_or_else(|| err!(Protocol, "unknown SDM option bits: 0x{:02X}", input[0]))?;
        let access = SdmAccessRights::from_bytes([input[1], input[2]])?;
        *input = &input[3..];

        let mut settings = Self {
            options,
            access,
            uid_offset: None,
            read_counter_offset: None,
            picc_data_offset: None,
            mac_input_offset: None,
            enc_data_offset: None,
            enc_data_length: None,
            mac_offset: None,
            read_counter_limit: None,
        };

        if options.contains(SdmOptions::UID_MIRROR) && access.meta_read.is_free() {
            settings.uid_offset = Some(read_u24(input)?);
        }

        if options.contains(SdmOptions::READ_COUNTER) && access.meta_read.is_free() {
            settings.read_counter_offset = Some(read_u24(input)?);
        }

        if matches!(access.meta_read, AccessCondition::Key(_)) {
            settings.picc_data_offset = Some(read_u24(input)?);
        }

        if !access.file_read.is_never() {
            settings.mac_input_offset = Some(read_u24(input)?);

            if options.contains(SdmOptions::ENCRYPT_FILE_DATA) {
                settings.enc_data_offset = Some(read_u24(input)?);
                settings.enc_data_length = Some(read_u24(input)?);
            }

            settings.mac_offset = Some(read_u24(input)?);
        }

        if options.contains(SdmOptions::READ_COUNTER_LIMIT) {
            settings.read_counter_limit = Some(read_u24(input)?);
        }

        Ok(settings)
    }

    fn required(&self, value: Option<u32>, name: &str) -> Result<u32, Error> {
        value.ok_or_else(|| {
            err!(
                InvalidArgument,
                "SDM configuration requires {} for options {:?}",
                name,
                self.options
            )
        })
    }
}

/// What a file is configured to do: protection mode, access rights, and
/// an optional SDM section
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileSettings {
    /// Communication mode for data access commands
    pub comm_mode: CommMode,

    /// The four access conditions
    pub access: AccessRights,

    /// SDM configuration; `Some` sets the SDM-enable flag in the file
    /// option byte
    pub sdm: Option<SdmSettings>,
}

/// SDM-enable flag within the file option byte
const FILE_OPTION_SDM: u8 = 0x40;

impl FileSettings {
    /// Serialize the (unpadded) ChangeFileSettings payload:
    /// `FileOption || AccessRights || [SDM section]`
    pub fn change_payload(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(16);

        let mut file_option = self.comm_mode.bits();
        if self.sdm.is_some() {
            file_option |= FILE_OPTION_SDM;
        }
        out.push(file_option);
        out.extend_from_slice(&self.access.to_bytes());

        if let Some(sdm) = &self.sdm {
            sdm.serialize_into(&mut out)?;
        }

        Ok(out)
    }

    /// Parse a ChangeFileSettings payload (with any padding already
    /// stripped)
    pub fn from_change_payload(bytes: &[u8]) -> Result<Self, Error> {
        ensure!(bytes.len() >= 3, Protocol, "truncated file settings");

        let file_option = bytes[0];
        let comm_mode = CommMode::from_bits(file_option);
        let access = AccessRights::from_bytes([bytes[1], bytes[2]])?;

        let mut rest = &bytes[3..];
        let sdm = if file_option & FILE_OPTION_SDM != 0 {
            Some(SdmSettings::parse(&mut rest)?)
        } else {
            None
        };

        ensure!(
            rest.is_empty(),
            Protocol,
            "{} trailing bytes after file settings",
            rest.len()
        );

        Ok(Self {
            comm_mode,
            access,
            sdm,
        })
    }
}

/// A file as reported by GetFileSettings: type and size alongside the
/// configurable settings
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileInfo {
    /// File type byte (`0x00` = standard data file)
    pub file_type: u8,

    /// File size in bytes
    pub size: u32,

    /// The configurable settings
    pub settings: FileSettings,
}

impl FileInfo {
    /// Parse a GetFileSettings response body:
    /// `FileType || FileOption || AccessRights || FileSize || [SDM section]`
    pub fn parse(body: &[u8]) -> Result<Self, Error> {
        ensure!(body.len() >= 7, Protocol, "truncated file info");

        let file_type = body[0];
        let mut payload = Vec::with_capacity(body.len() - 4);
        payload.extend_from_slice(&body[1..4]);
        payload.extend_from_slice(&body[7..]);
        let settings = FileSettings::from_change_payload(&payload)?;

        let mut size_bytes = [0u8; 4];
        size_bytes[..3].copy_from_slice(&body[4..7]);

        Ok(Self {
            file_type,
            size: u32::from_le_bytes(size_bytes),
            settings,
        })
    }
}

fn push_u24(out: &mut Vec<u8>, value: u32) -> Result<(), Error> {
    ensure!(
        value < 1 << 24,
        InvalidArgument,
        "value does not fit in 24 bits: {}",
        value
    );
    out.extend_from_slice(&value.to_le_bytes()[..3]);
    Ok(())
}

fn read_u24(input: &mut &[u8]) -> Result<u32, Error> {
    ensure!(input.len() >= 3, Protocol, "truncated 24-bit field");

    let mut bytes = [0u8; 4];
    bytes[..3].copy_from_slice(&input[..3]);
    *input = &input[3..];
    Ok(u32::from_le_bytes(bytes))
}
