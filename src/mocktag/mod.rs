//! Simulated NTAG424 tag for tests and development
//!
//! [`MockTag`] implements [`Transport`] over shared in-process state, so
//! clones of one tag can be handed to a channel while a test keeps a
//! handle for inspection (key slots, file contents, transmit counts).
//! The factory state matches a blank tag: all-zero keys, an empty NDEF
//! file with free read/write, and no SDM configuration.

mod state;

use self::state::State;
use crate::transport::{self, RawResponse, Transport};
use std::sync::{Arc, Mutex};

/// An in-process simulated tag
#[derive(Clone)]
pub struct MockTag(Arc<Mutex<State>>);

impl MockTag {
    /// Create a factory-state tag
    pub fn new() -> Self {
        MockTag(Arc::new(Mutex::new(State::new(None, None))))
    }

    /// Create a tag that uses fixed values for its authentication nonce
    /// and transaction identifier, for deterministic handshake tests
    pub fn with_seeds(rnd_b: [u8; 16], ti: [u8; 4]) -> Self {
        MockTag(Arc::new(Mutex::new(State::new(Some(rnd_b), Some(ti)))))
    }

    /// Number of APDUs the tag has received
    pub fn transmit_count(&self) -> usize {
        self.lock().transmit_count
    }

    /// Current value of a key slot
    pub fn key_bytes(&self, key_no: u8) -> [u8; 16] {
        self.lock().key_bytes(key_no as usize)
    }

    /// Overwrite a key slot directly (provisioned-tag setup)
    pub fn set_key(&self, key_no: u8, key: [u8; 16], version: u8) {
        self.lock().set_key(key_no as usize, key, version);
    }

    /// Current content of a file (1-based file number)
    pub fn file_content(&self, file_no: u8) -> Vec<u8> {
        self.lock().file_content(file_no as usize)
    }

    /// The tag's UID
    pub fn uid(&self) -> [u8; 7] {
        self.lock().uid()
    }

    /// Does the tag consider a session established?
    pub fn session_active(&self) -> bool {
        self.lock().session_active()
    }

    /// Set the SDM read counter reported by GetFileCounters
    pub fn set_read_counter(&self, value: u32) {
        self.lock().set_read_counter(value);
    }

    /// Corrupt the MAC of the next protected response, to exercise
    /// client-side verification
    pub fn corrupt_next_response_mac(&self) {
        self.lock().corrupt_next_mac = true;
    }

    /// Simulate the persistent failed-authentication delay: every
    /// authentication attempt reports the delay status
    pub fn set_auth_delay(&self, active: bool) {
        self.lock().auth_delay = active;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.0.lock().expect("mock tag state poisoned")
    }
}

impl Default for MockTag {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTag {
    fn transmit(&mut self, apdu: &[u8]) -> Result<RawResponse, transport::Error> {
        let mut state = self
            .0
            .lock()
            .map_err(|e| transport::Error(format!("mock tag state poisoned: {e}")))?;

        state.transmit_count += 1;
        Ok(state.process(apdu))
    }
}
