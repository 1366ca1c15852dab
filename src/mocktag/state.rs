//! Simulated tag state and command processing
//!
//! The mock implements the tag side of the protocol with the same
//! primitive module the client uses: it verifies command MACs against
//! its own counter, decrypts FULL-mode payloads with the command IV, and
//! MACs/encrypts its responses the way a real tag does. Divergence
//! between the two sides therefore shows up as integrity errors in
//! tests, exactly as it would against hardware.

use crate::{
    crypto::{self, crc},
    file::{
        AccessCondition, AccessRights, CommMode, FileSettings,
    },
    key::AesKey,
    session::SessionKeys,
    transport::RawResponse,
};
use rand_core::{OsRng, RngCore};
use std::collections::VecDeque;

/// Largest body the mock returns per frame before chaining
const FRAME_BODY: usize = crate::apdu::MAX_FRAME_BODY;

/// An in-progress authentication: phase 1 done, phase 2 pending
struct PendingAuth {
    key_no: u8,
    rnd_b: [u8; 16],
}

/// An established session on the tag side
#[derive(Copy, Clone)]
struct Session {
    enc: [u8; 16],
    mac: [u8; 16],
    ti: [u8; 4],
    ctr: u16,
    key_no: u8,
}

/// One simulated file
struct MockFile {
    data: Vec<u8>,
    settings: FileSettings,
}

/// Complete simulated tag state
pub(super) struct State {
    keys: [[u8; 16]; 5],
    key_versions: [u8; 5],
    uid: [u8; 7],
    files: [MockFile; 3],
    app_selected: bool,
    iso_app_selected: bool,
    iso_file: Option<u16>,
    pending_auth: Option<PendingAuth>,
    pending_frames: VecDeque<Vec<u8>>,
    session: Option<Session>,
    sdm_read_counter: u32,
    rnd_b_seed: Option<[u8; 16]>,
    ti_seed: Option<[u8; 4]>,
    pub(super) transmit_count: usize,
    pub(super) corrupt_next_mac: bool,
    pub(super) auth_delay: bool,
}

impl State {
    pub(super) fn new(rnd_b_seed: Option<[u8; 16]>, ti_seed: Option<[u8; 4]>) -> Self {
        let key0 = AccessCondition::Key(crate::key::KeyNo::PICC_MASTER);

        let cc = MockFile {
            data: vec![0u8; 32],
            settings: FileSettings {
                comm_mode: CommMode::Plain,
                access: AccessRights {
                    read: AccessCondition::Free,
                    write: key0,
                    read_write: key0,
                    change: key0,
                },
                sdm: None,
            },
        };

        let ndef = MockFile {
            data: vec![0u8; 256],
            settings: FileSettings {
                comm_mode: CommMode::Plain,
                access: AccessRights {
                    read: AccessCondition::Free,
                    write: AccessCondition::Free,
                    read_write: AccessCondition::Free,
                    change: key0,
                },
                sdm: None,
            },
        };

        let proprietary = MockFile {
            data: vec![0u8; 128],
            settings: FileSettings {
                comm_mode: CommMode::Full,
                access: AccessRights {
                    read: AccessCondition::Key(crate::key::KeyNo::new(2).unwrap()),
                    write: AccessCondition::Key(crate::key::KeyNo::new(3).unwrap()),
                    read_write: AccessCondition::Key(crate::key::KeyNo::new(3).unwrap()),
                    change: key0,
                },
                sdm: None,
            },
        };

        Self {
            keys: [[0u8; 16]; 5],
            key_versions: [0u8; 5],
            uid: [0x04, 0xDE, 0x5F, 0x1E, 0xAC, 0xC0, 0x40],
            files: [cc, ndef, proprietary],
            app_selected: false,
            iso_app_selected: false,
            iso_file: None,
            pending_auth: None,
            pending_frames: VecDeque::new(),
            session: None,
            sdm_read_counter: 0,
            rnd_b_seed,
            ti_seed,
            transmit_count: 0,
            corrupt_next_mac: false,
            auth_delay: false,
        }
    }

    pub(super) fn key_bytes(&self, key_no: usize) -> [u8; 16] {
        self.keys[key_no]
    }

    pub(super) fn set_key(&mut self, key_no: usize, key: [u8; 16], version: u8) {
        self.keys[key_no] = key;
        self.key_versions[key_no] = version;
    }

    pub(super) fn file_content(&self, file_no: usize) -> Vec<u8> {
        self.files[file_no - 1].data.clone()
    }

    pub(super) fn uid(&self) -> [u8; 7] {
        self.uid
    }

    pub(super) fn session_active(&self) -> bool {
        self.session.is_some()
    }

    pub(super) fn set_read_counter(&mut self, value: u32) {
        self.sdm_read_counter = value;
    }

    /// Process one APDU and produce the raw wire response
    pub(super) fn process(&mut self, apdu: &[u8]) -> RawResponse {
        if apdu.len() < 4 {
            return status(0x7E);
        }

        let (cla, ins, p1, p2) = (apdu[0], apdu[1], apdu[2], apdu[3]);
        let data = match parse_data_field(apdu) {
            Some(data) => data,
            None => return status(0x7E),
        };

        match cla {
            0x90 => self.dispatch_native(ins, data),
            0x00 => self.dispatch_iso(ins, p1, p2, data),
            _ => status(0x1C),
        }
    }

    fn dispatch_native(&mut self, ins: u8, data: &[u8]) -> RawResponse {
        match ins {
            0x5A => self.select_application(data),
            0x71 => self.authenticate_first(data),
            0xAF => self.additional_frame(data),
            0x60 => self.get_version(data),
            0x6F => self.get_file_ids(data),
            0x64 => self.get_key_version(data),
            0xF5 => self.get_file_settings(data),
            0xC4 => self.change_key(data),
            0x5F => self.change_file_settings(data),
            0x3D => self.write_data(data),
            0xAD => self.read_data(data),
            0x51 => self.get_card_uid(data),
            0xF6 => self.get_file_counters(data),
            _ => status(0x1C),
        }
    }

    fn select_application(&mut self, data: &[u8]) -> RawResponse {
        if data != &[0x00, 0x00, 0x00] {
            return status(0x9E);
        }

        self.app_selected = true;
        self.pending_auth = None;
        self.pending_frames.clear();
        self.session = None;
        ok(Vec::new())
    }

    fn authenticate_first(&mut self, data: &[u8]) -> RawResponse {
        if !self.app_selected {
            return status(0x1C);
        }
        if self.auth_delay {
            return status(0xAD);
        }
        if data.len() != 2 {
            return status(0x7E);
        }

        let key_no = data[0];
        if key_no >= 5 {
            return status(0x9E);
        }

        let rnd_b = self.rnd_b_seed.unwrap_or_else(random_block);
        self.session = None;
        self.pending_auth = Some(PendingAuth { key_no, rnd_b });

        let encrypted = crypto::cbc_encrypt(&self.keys[key_no as usize], &[0u8; 16], &rnd_b)
            .expect("block-aligned");
        more(encrypted)
    }

    fn additional_frame(&mut self, data: &[u8]) -> RawResponse {
        if let Some(pending) = self.pending_auth.take() {
            return self.authenticate_second(pending, data);
        }

        if let Some(frame) = self.pending_frames.pop_front() {
            return if self.pending_frames.is_empty() {
                ok(frame)
            } else {
                more(frame)
            };
        }

        status(0x1C)
    }

    fn authenticate_second(&mut self, pending: PendingAuth, data: &[u8]) -> RawResponse {
        if data.len() != 32 {
            return status(0x7E);
        }

        let key = self.keys[pending.key_no as usize];
        let plain = crypto::cbc_decrypt(&key, &[0u8; 16], data).expect("block-aligned");

        let mut rnd_a = [0u8; 16];
        rnd_a.copy_from_slice(&plain[..16]);

        if plain[16..] != crypto::rotate_left(&pending.rnd_b) {
            return status(0xAE);
        }

        let ti = self.ti_seed.unwrap_or_else(|| {
            let mut ti = [0u8; 4];
            OsRng.fill_bytes(&mut ti);
            ti
        });

        let keys = SessionKeys::derive(&AesKey::new(key), &rnd_a, &pending.rnd_b);
        self.session = Some(Session {
            enc: keys.enc,
            mac: keys.mac,
            ti,
            ctr: 0,
            key_no: pending.key_no,
        });

        // TI || RndA' || PDcap2 || PCDcap2
        let mut reply = Vec::with_capacity(32);
        reply.extend_from_slice(&ti);
        reply.extend_from_slice(&crypto::rotate_left(&rnd_a));
        reply.extend_from_slice(&[0u8; 12]);

        ok(crypto::cbc_encrypt(&key, &[0u8; 16], &reply).expect("block-aligned"))
    }

    fn get_version(&mut self, data: &[u8]) -> RawResponse {
        if !data.is_empty() {
            return status(0x7E);
        }

        let hardware = vec![0x04, 0x04, 0x02, 0x30, 0x00, 0x11, 0x05];
        let software = vec![0x04, 0x04, 0x02, 0x01, 0x02, 0x11, 0x05];
        let mut production = Vec::with_capacity(14);
        production.extend_from_slice(&self.uid);
        production.extend_from_slice(&[0xB1, 0xB2, 0xB3, 0xB4, 0xB5]);
        production.extend_from_slice(&[0x21, 0x23]);

        self.pending_frames.clear();
        self.pending_frames.push_back(software);
        self.pending_frames.push_back(production);
        more(hardware)
    }

    fn get_file_ids(&mut self, data: &[u8]) -> RawResponse {
        if self.session.is_some() {
            if let Err(sw2) = self.open_protected(0x6F, 0, data).map(|_| ()) {
                return status(sw2);
            }
            return self.reply_mac(vec![0x01, 0x02, 0x03]);
        }

        if !data.is_empty() {
            return status(0x7E);
        }
        ok(vec![0x01, 0x02, 0x03])
    }

    fn get_key_version(&mut self, data: &[u8]) -> RawResponse {
        if self.session.is_some() {
            let (header, _) = match self.open_protected(0x64, 1, data) {
                Ok(parts) => parts,
                Err(sw2) => return status(sw2),
            };

            let key_no = header[0] as usize;
            if key_no >= 5 {
                return status(0x9E);
            }

            let version = self.key_versions[key_no];
            return self.reply_mac(vec![version]);
        }

        if data.len() != 1 || data[0] >= 5 {
            return status(0x9E);
        }
        ok(vec![self.key_versions[data[0] as usize]])
    }

    fn get_file_settings(&mut self, data: &[u8]) -> RawResponse {
        if self.session.is_some() {
            let (header, _) = match self.open_protected(0xF5, 1, data) {
                Ok(parts) => parts,
                Err(sw2) => return status(sw2),
            };

            let body = match self.file_settings_body(header[0]) {
                Some(body) => body,
                None => return status(0xF0),
            };
            return self.reply_mac(body);
        }

        if data.len() != 1 {
            return status(0x7E);
        }

        match self.file_settings_body(data[0]) {
            Some(body) => ok(body),
            None => status(0xF0),
        }
    }

    /// `FileType || FileOption || AccessRights || FileSize || [SDM]`
    fn file_settings_body(&self, file_no: u8) -> Option<Vec<u8>> {
        let file = self.file(file_no)?;
        let payload = file.settings.change_payload().ok()?;

        let mut body = Vec::with_capacity(7 + payload.len());
        body.push(0x00);
        body.extend_from_slice(&payload[..3]);
        body.extend_from_slice(&(file.data.len() as u32).to_le_bytes()[..3]);
        body.extend_from_slice(&payload[3..]);
        Some(body)
    }

    fn change_key(&mut self, data: &[u8]) -> RawResponse {
        let (header, payload) = match self.open_protected(0xC4, 1, data) {
            Ok(parts) => parts,
            Err(sw2) => return status(sw2),
        };

        let key_no = header[0] as usize;
        if key_no >= 5 {
            return status(0x9E);
        }

        let session = self.session.expect("session verified");
        if session.key_no != 0 {
            return status(0x9D);
        }

        if payload.len() != 32 {
            return status(0x7E);
        }

        // Fixed two-block layout; padding is part of it, so decrypt raw
        let iv = iv_block(&session.enc, [0xA5, 0x5A], session.ti, session.ctr);
        let plain = match crypto::cbc_decrypt(&session.enc, &iv, &payload) {
            Ok(plain) => plain,
            Err(_) => return status(0x1E),
        };

        if key_no == 0 {
            if plain[17] != 0x80 || plain[18..].iter().any(|&b| b != 0) {
                return status(0x1E);
            }

            let mut new_key = [0u8; 16];
            new_key.copy_from_slice(&plain[..16]);
            self.keys[0] = new_key;
            self.key_versions[0] = plain[16];

            // The session dies with the old master key
            self.session = None;
            ok(Vec::new())
        } else {
            if plain[21] != 0x80 || plain[22..].iter().any(|&b| b != 0) {
                return status(0x1E);
            }

            let mut new_key = [0u8; 16];
            for i in 0..16 {
                new_key[i] = plain[i] ^ self.keys[key_no][i];
            }

            if plain[17..21] != crc::key_crc(&new_key) {
                return status(0x1E);
            }

            self.keys[key_no] = new_key;
            self.key_versions[key_no] = plain[16];
            self.reply_mac(Vec::new())
        }
    }

    fn change_file_settings(&mut self, data: &[u8]) -> RawResponse {
        let (header, payload) = match self.open_protected(0x5F, 1, data) {
            Ok(parts) => parts,
            Err(sw2) => return status(sw2),
        };

        let plain = match self.decrypt_full(&payload) {
            Ok(plain) => plain,
            Err(sw2) => return status(sw2),
        };

        let settings = match FileSettings::from_change_payload(&plain) {
            Ok(settings) => settings,
            Err(_) => return status(0x7E),
        };

        match self.file_mut(header[0]) {
            Some(file) => file.settings = settings,
            None => return status(0xF0),
        }
        self.reply_mac(Vec::new())
    }

    fn write_data(&mut self, data: &[u8]) -> RawResponse {
        let (header, payload) = match self.open_protected(0x3D, 7, data) {
            Ok(parts) => parts,
            Err(sw2) => return status(sw2),
        };

        let offset = u24(&header[1..4]) as usize;
        let length = u24(&header[4..7]) as usize;

        let comm_mode = match self.file(header[0]) {
            Some(file) => file.settings.comm_mode,
            None => return status(0xF0),
        };

        let content = match comm_mode {
            CommMode::Full => match self.decrypt_full(&payload) {
                Ok(plain) => plain,
                Err(sw2) => return status(sw2),
            },
            _ => payload,
        };

        if content.len() != length {
            return status(0x7E);
        }

        let file = self.file_mut(header[0]).expect("checked above");
        if offset + length > file.data.len() {
            return status(0xBE);
        }

        file.data[offset..offset + length].copy_from_slice(&content);
        self.reply_mac(Vec::new())
    }

    fn read_data(&mut self, data: &[u8]) -> RawResponse {
        let (header, _) = match self.open_protected(0xAD, 7, data) {
            Ok(parts) => parts,
            Err(sw2) => return status(sw2),
        };

        let offset = u24(&header[1..4]) as usize;
        let mut length = u24(&header[4..7]) as usize;

        let file = match self.file(header[0]) {
            Some(file) => file,
            None => return status(0xF0),
        };

        if length == 0 {
            length = file.data.len().saturating_sub(offset);
        }
        if offset + length > file.data.len() {
            return status(0xBE);
        }

        let slice = file.data[offset..offset + length].to_vec();
        match file.settings.comm_mode {
            CommMode::Full => self.reply_full(slice),
            _ => self.reply_mac(slice),
        }
    }

    fn get_card_uid(&mut self, data: &[u8]) -> RawResponse {
        if let Err(sw2) = self.open_protected(0x51, 0, data).map(|_| ()) {
            return status(sw2);
        }

        let uid = self.uid.to_vec();
        self.reply_full(uid)
    }

    fn get_file_counters(&mut self, data: &[u8]) -> RawResponse {
        let (header, _) = match self.open_protected(0xF6, 1, data) {
            Ok(parts) => parts,
            Err(sw2) => return status(sw2),
        };

        if self.file(header[0]).is_none() {
            return status(0xF0);
        }

        let counter = self.sdm_read_counter.to_le_bytes()[..3].to_vec();
        self.reply_full(counter)
    }

    /// Verify the command MAC of a protected command and split it into
    /// header and payload. Failures report the status byte to return.
    fn open_protected(
        &mut self,
        ins: u8,
        header_len: usize,
        data: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), u8> {
        let session = self.session.ok_or(0xAE)?;

        if data.len() < header_len + 8 {
            return Err(0x7E);
        }

        let header = &data[..header_len];
        let (payload, mac) = data[header_len..].split_at(data.len() - header_len - 8);

        let mut input = Vec::with_capacity(7 + data.len());
        input.push(ins);
        input.extend_from_slice(&session.ctr.to_le_bytes());
        input.extend_from_slice(&session.ti);
        input.extend_from_slice(header);
        input.extend_from_slice(payload);

        let expected = crypto::truncate_mac(&crypto::cmac(&session.mac, &input));
        if expected[..] != *mac {
            return Err(0x1E);
        }

        Ok((header.to_vec(), payload.to_vec()))
    }

    /// Decrypt a FULL-mode command payload and strip its padding
    fn decrypt_full(&self, payload: &[u8]) -> Result<Vec<u8>, u8> {
        let session = self.session.expect("session verified");
        let iv = iv_block(&session.enc, [0xA5, 0x5A], session.ti, session.ctr);
        crypto::cbc_decrypt_padded(&session.enc, &iv, payload).map_err(|_| 0x1E)
    }

    /// MAC a successful response and advance the session counter
    fn reply_mac(&mut self, data: Vec<u8>) -> RawResponse {
        let corrupt = std::mem::take(&mut self.corrupt_next_mac);
        let session = self.session.as_mut().expect("session verified");
        let next = session.ctr.wrapping_add(1);

        let mut input = Vec::with_capacity(7 + data.len());
        input.push(0x00);
        input.extend_from_slice(&next.to_le_bytes());
        input.extend_from_slice(&session.ti);
        input.extend_from_slice(&data);

        let mut mac = crypto::truncate_mac(&crypto::cmac(&session.mac, &input));
        if corrupt {
            mac[0] ^= 0xAA;
        }

        session.ctr = next;

        let mut body = data;
        body.extend_from_slice(&mac);
        self.respond_chained(body)
    }

    /// Encrypt a successful response under the reply IV, then MAC it
    fn reply_full(&mut self, plaintext: Vec<u8>) -> RawResponse {
        let session = self.session.expect("session verified");

        let mut padded = plaintext;
        crypto::pad(&mut padded);

        let iv = iv_block(
            &session.enc,
            [0x5A, 0xA5],
            session.ti,
            session.ctr.wrapping_add(1),
        );
        let ciphertext =
            crypto::cbc_encrypt(&session.enc, &iv, &padded).expect("block-aligned");

        self.reply_mac(ciphertext)
    }

    /// Split an oversized body across continuation frames
    fn respond_chained(&mut self, body: Vec<u8>) -> RawResponse {
        if body.len() <= FRAME_BODY {
            return ok(body);
        }

        let mut frames = body.chunks(FRAME_BODY).map(|chunk| chunk.to_vec());
        let first = frames.next().expect("non-empty");
        self.pending_frames = frames.collect();
        more(first)
    }

    fn file(&self, file_no: u8) -> Option<&MockFile> {
        match file_no {
            1..=3 => Some(&self.files[file_no as usize - 1]),
            _ => None,
        }
    }

    fn file_mut(&mut self, file_no: u8) -> Option<&mut MockFile> {
        match file_no {
            1..=3 => Some(&mut self.files[file_no as usize - 1]),
            _ => None,
        }
    }

    fn dispatch_iso(&mut self, ins: u8, p1: u8, p2: u8, data: &[u8]) -> RawResponse {
        match ins {
            0xA4 => self.iso_select(p1, data),
            0xB0 => self.iso_read_binary(p1, p2),
            0xD6 => self.iso_update_binary(p1, p2, data),
            _ => iso_status(0x6D, 0x00),
        }
    }

    fn iso_select(&mut self, p1: u8, data: &[u8]) -> RawResponse {
        match p1 {
            0x04 => {
                if data == &crate::commands::iso::NDEF_APPLICATION_NAME {
                    self.iso_app_selected = true;
                    self.iso_file = None;
                    iso_ok(Vec::new())
                } else {
                    iso_status(0x6A, 0x82)
                }
            }
            0x00 => {
                if data.len() != 2 {
                    return iso_status(0x67, 0x00);
                }

                let file_id = u16::from_be_bytes([data[0], data[1]]);
                if !self.iso_app_selected || self.iso_file_index(file_id).is_none() {
                    return iso_status(0x6A, 0x82);
                }

                self.iso_file = Some(file_id);
                iso_ok(Vec::new())
            }
            _ => iso_status(0x6A, 0x86),
        }
    }

    fn iso_read_binary(&mut self, p1: u8, p2: u8) -> RawResponse {
        let file_index = match self.selected_iso_file() {
            Some(index) => index,
            None => return iso_status(0x69, 0x85),
        };

        let file = &self.files[file_index];
        if !file.settings.access.read.is_free() {
            return iso_status(0x69, 0x85);
        }

        let offset = usize::from(u16::from_be_bytes([p1, p2]));
        if offset > file.data.len() {
            return iso_status(0x6B, 0x00);
        }

        let end = file.data.len().min(offset + 256);
        iso_ok(file.data[offset..end].to_vec())
    }

    fn iso_update_binary(&mut self, p1: u8, p2: u8, data: &[u8]) -> RawResponse {
        let file_index = match self.selected_iso_file() {
            Some(index) => index,
            None => return iso_status(0x69, 0x85),
        };

        let file = &mut self.files[file_index];
        if !file.settings.access.write.is_free() {
            return iso_status(0x69, 0x85);
        }

        let offset = usize::from(u16::from_be_bytes([p1, p2]));
        if offset + data.len() > file.data.len() {
            return iso_status(0x6B, 0x00);
        }

        file.data[offset..offset + data.len()].copy_from_slice(data);
        iso_ok(Vec::new())
    }

    fn selected_iso_file(&self) -> Option<usize> {
        self.iso_file.and_then(|id| self.iso_file_index(id))
    }

    fn iso_file_index(&self, file_id: u16) -> Option<usize> {
        match file_id {
            crate::commands::iso::CC_FILE_ID => Some(0),
            crate::commands::iso::NDEF_FILE_ID => Some(1),
            _ => None,
        }
    }
}

/// Synthesize an IV the way both sides do: tag bytes, TI, counter,
/// zeros, ECB-encrypted under the session encryption key
fn iv_block(enc_key: &[u8; 16], tag: [u8; 2], ti: [u8; 4], counter: u16) -> [u8; 16] {
    let mut block = [0u8; 16];
    block[0..2].copy_from_slice(&tag);
    block[2..6].copy_from_slice(&ti);
    block[6..8].copy_from_slice(&counter.to_le_bytes());
    crypto::encrypt_block(enc_key, &mut block);
    block
}

fn parse_data_field(apdu: &[u8]) -> Option<&[u8]> {
    match apdu.len() {
        4 | 5 => Some(&[]),
        len => {
            let lc = apdu[4] as usize;
            // Lc data, optionally followed by a single Le byte
            if len == 5 + lc || len == 6 + lc {
                Some(&apdu[5..5 + lc])
            } else {
                None
            }
        }
    }
}

fn u24(bytes: &[u8]) -> u32 {
    u32::from(bytes[0]) | u32::from(bytes[1]) << 8 | u32::from(bytes[2]) << 16
}

fn random_block() -> [u8; 16] {
    let mut block = [0u8; 16];
    OsRng.fill_bytes(&mut block);
    block
}

fn ok(body: Vec<u8>) -> RawResponse {
    (body, 0x91, 0x00)
}

fn more(body: Vec<u8>) -> RawResponse {
    (body, 0x91, 0xAF)
}

fn status(sw2: u8) -> RawResponse {
    (Vec::new(), 0x91, sw2)
}

fn iso_ok(body: Vec<u8>) -> RawResponse {
    (body, 0x90, 0x00)
}

fn iso_status(sw1: u8, sw2: u8) -> RawResponse {
    (Vec::new(), sw1, sw2)
}
