//! The NTAG424 command set
//!
//! Every command is a payload builder plus a call into a channel:
//! unauthenticated commands take a [`RawChannel`], authenticated
//! commands take an [`AuthenticatedChannel`] and delegate all
//! cryptography to it.
//!
//! [`RawChannel`]: crate::RawChannel
//! [`AuthenticatedChannel`]: crate::AuthenticatedChannel

mod change_file_settings;
mod change_key;
mod get_card_uid;
mod get_file_counters;
mod get_file_ids;
mod get_file_settings;
mod get_key_version;
mod get_version;
pub mod iso;
mod read_data;
mod select_application;
mod write_data;

pub use self::{
    change_file_settings::change_file_settings,
    change_key::change_key,
    get_card_uid::get_card_uid,
    get_file_counters::get_file_counters,
    get_file_ids::{get_file_ids, get_file_ids_authenticated},
    get_file_settings::{get_file_settings, get_file_settings_authenticated},
    get_key_version::{get_key_version, get_key_version_authenticated},
    get_version::{get_version, ComponentVersion, VersionInfo},
    read_data::read_data,
    select_application::select_application,
    write_data::write_data,
};

use crate::error::Error;
use thiserror::Error as ThisError;

/// Data bytes per chunk of a chunked write, keeping each outgoing APDU
/// within the transport's frame bound
pub const WRITE_CHUNK: usize = 52;

/// A chunked write failed partway; the tag holds everything before
/// `offset` and nothing after. Callers may resume from `offset` or
/// abandon the write.
#[derive(Debug, ThisError)]
#[error("write aborted at offset {offset}: {source}")]
pub struct WriteError {
    /// File offset the write had reached when it failed
    pub offset: u32,

    /// The underlying failure
    #[source]
    pub source: Error,
}

impl From<WriteError> for Error {
    fn from(err: WriteError) -> Error {
        err.source
    }
}
