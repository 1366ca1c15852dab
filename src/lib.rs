#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

//! # Getting Started
//!
//! Communication with a tag happens over a [`Transport`] (a PC/SC reader,
//! or the bundled [`MockTag`] simulator). Wrap the transport in a
//! [`RawChannel`], select the PICC application, then authenticate to
//! obtain an [`AuthenticatedChannel`] for the commands that require
//! secure messaging:
//!
//! ```
//! use ntag424::{commands, session, AesKey, KeyNo, MockTag, RawChannel};
//!
//! let tag = MockTag::new();
//! let mut channel = RawChannel::new(Box::new(tag));
//!
//! commands::select_application(&mut channel)?;
//! let version = commands::get_version(&mut channel)?;
//! println!("UID: {:02x?}", version.uid);
//!
//! // Factory-default master key
//! let key = AesKey::default();
//! let mut session = session::authenticate(&mut channel, KeyNo::PICC_MASTER, &key)?;
//! let uid = commands::get_card_uid(&mut session)?;
//! # let _ = uid;
//! # Ok::<(), ntag424::Error>(())
//! ```

#[macro_use]
extern crate log;

#[macro_use]
mod macros;

pub mod apdu;
pub mod channel;
pub mod commands;
pub mod crypto;
pub mod error;
pub mod file;
pub mod key;
#[cfg(feature = "mocktag")]
pub mod mocktag;
pub mod session;
pub mod transport;

#[cfg(feature = "mocktag")]
pub use crate::mocktag::MockTag;
pub use crate::{
    apdu::status::StatusWord,
    channel::{secure::AuthenticatedChannel, RawChannel},
    error::Error,
    file::{AccessCondition, AccessRights, CommMode, FileNo, FileSettings},
    key::{AesKey, KeyNo},
    transport::Transport,
};
