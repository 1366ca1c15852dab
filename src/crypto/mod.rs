//! AES primitives shared by the secure channel, the authentication
//! driver, and the payload builders
//!
//! Everything cryptographic in this crate goes through this module; no
//! command re-implements AES or CMAC. AES-128-CBC with ISO/IEC 9797-1
//! method-2 padding and AES-CMAC (NIST SP 800-38B) are the only modes
//! the tag uses.

pub mod crc;

use crate::error::Error;
use aes::Aes128;
use cbc::cipher::{
    block_padding::{Iso7816, NoPadding},
    generic_array::GenericArray,
    BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit,
};
use cmac::{Cmac, Mac};

/// Size of an AES block (128 bits)
pub const BLOCK_SIZE: usize = 16;

/// Size of a truncated on-wire MAC
pub const MAC_SIZE: usize = 8;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Encrypt a single block in place with AES-128-ECB.
///
/// Used for IV synthesis: the secure channel never encrypts payload data
/// with a raw ECB block.
pub fn encrypt_block(key: &[u8; BLOCK_SIZE], block: &mut [u8; BLOCK_SIZE]) {
    let cipher = Aes128::new_from_slice(key).unwrap();
    cipher.encrypt_block(GenericArray::from_mut_slice(block));
}

/// AES-128-CBC encrypt a plaintext that is already a multiple of the
/// block size
pub fn cbc_encrypt(
    key: &[u8; BLOCK_SIZE],
    iv: &[u8; BLOCK_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>, Error> {
    ensure!(
        plaintext.len() % BLOCK_SIZE == 0,
        Protocol,
        "CBC plaintext not block-aligned: {} bytes",
        plaintext.len()
    );

    let encryptor = Aes128CbcEnc::new_from_slices(key, iv).unwrap();
    Ok(encryptor.encrypt_padded_vec_mut::<NoPadding>(plaintext))
}

/// AES-128-CBC decrypt, keeping any trailing padding bytes
pub fn cbc_decrypt(
    key: &[u8; BLOCK_SIZE],
    iv: &[u8; BLOCK_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, Error> {
    let decryptor = Aes128CbcDec::new_from_slices(key, iv).unwrap();
    decryptor
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| err!(Protocol, "ciphertext not block-aligned: {} bytes", ciphertext.len()))
}

/// AES-128-CBC decrypt and strip ISO 9797-1 method-2 padding
pub fn cbc_decrypt_padded(
    key: &[u8; BLOCK_SIZE],
    iv: &[u8; BLOCK_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, Error> {
    let decryptor = Aes128CbcDec::new_from_slices(key, iv).unwrap();
    decryptor
        .decrypt_padded_vec_mut::<Iso7816>(ciphertext)
        .map_err(|_| err!(Crypto, "bad padding in decrypted payload"))
}

/// AES-CMAC (NIST SP 800-38B) over an arbitrary-length byte string
pub fn cmac(key: &[u8; BLOCK_SIZE], data: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut mac = <Cmac<Aes128> as Mac>::new_from_slice(key).unwrap();
    mac.update(data);

    let mut out = [0u8; BLOCK_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Truncate a full CMAC to the 8 on-wire bytes.
///
/// The tag takes the odd-indexed bytes (1, 3, ... 15) of the 16-byte
/// CMAC, not the first eight.
pub fn truncate_mac(full: &[u8; BLOCK_SIZE]) -> [u8; MAC_SIZE] {
    let mut out = [0u8; MAC_SIZE];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = full[2 * i + 1];
    }
    out
}

/// Append ISO/IEC 9797-1 padding method 2: a single `0x80` marker then
/// zeros up to the next block boundary. Data already block-aligned gains
/// a full padding block.
pub fn pad(data: &mut Vec<u8>) {
    data.push(0x80);
    while data.len() % BLOCK_SIZE != 0 {
        data.push(0x00);
    }
}

/// Rotate a block left by one byte
pub fn rotate_left(block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    out[..BLOCK_SIZE - 1].copy_from_slice(&block[1..]);
    out[BLOCK_SIZE - 1] = block[0];
    out
}

/// Rotate a block right by one byte
pub fn rotate_right(block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    out[1..].copy_from_slice(&block[..BLOCK_SIZE - 1]);
    out[0] = block[BLOCK_SIZE - 1];
    out
}
