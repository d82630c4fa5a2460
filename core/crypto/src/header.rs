//! Fixed binary header prefixed to every `.hxc` file.
//!
//! Layout (114 bytes, little-endian, no padding):
//!
//! | Offset | Size | Field           |
//! |--------|------|-----------------|
//! | 0      | 4    | magic `HEXC`    |
//! | 4      | 1    | version         |
//! | 5      | 1    | algorithm id    |
//! | 6      | 16   | KDF salt        |
//! | 22     | 12   | key-wrap IV     |
//! | 34     | 48   | wrapped DEK     |
//! | 82     | 32   | body checksum   |
//!
//! Encoding and decoding are pure; no I/O happens here.

use crate::keys::{random_bytes, Salt, SALT_LENGTH};
use hexcore_common::{Error, Result};

/// File signature.
pub const MAGIC: [u8; 4] = *b"HEXC";

/// Current format version.
pub const VERSION: u8 = 1;

/// Size of the key-wrap IV (AES-GCM nonce).
pub const WRAP_IV_SIZE: usize = 12;

/// Wrapped data key: 32-byte ciphertext plus 16-byte tag.
pub const WRAPPED_KEY_SIZE: usize = 48;

/// Size of the body checksum (SHA-256).
pub const CHECKSUM_SIZE: usize = 32;

/// Total header size in bytes.
pub const HEADER_SIZE: usize = 4 + 1 + 1 + SALT_LENGTH + WRAP_IV_SIZE + WRAPPED_KEY_SIZE + CHECKSUM_SIZE;

const VERSION_OFFSET: usize = 4;
const ALGO_OFFSET: usize = 5;
const SALT_OFFSET: usize = 6;
const IV_OFFSET: usize = SALT_OFFSET + SALT_LENGTH;
const DEK_OFFSET: usize = IV_OFFSET + WRAP_IV_SIZE;
const CHECKSUM_OFFSET: usize = DEK_OFFSET + WRAPPED_KEY_SIZE;

/// Fresh random material for one key wrap: KDF salt and AEAD IV.
///
/// A new slot is generated for every encryption; slots are never reused.
#[derive(Debug, Clone, Copy)]
pub struct KeySlot {
    pub salt: Salt,
    pub iv: [u8; WRAP_IV_SIZE],
}

impl KeySlot {
    /// Generate a slot from the CSPRNG.
    pub fn generate() -> Self {
        Self {
            salt: Salt::generate(),
            iv: random_bytes(),
        }
    }
}

/// Decoded header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexHeader {
    pub version: u8,
    pub algorithm_id: u8,
    pub salt: Salt,
    pub iv: [u8; WRAP_IV_SIZE],
    pub encrypted_dek: [u8; WRAPPED_KEY_SIZE],
    pub checksum: [u8; CHECKSUM_SIZE],
}

impl HexHeader {
    /// Assemble a current-version header from an already generated key slot.
    pub fn new(
        algorithm_id: u8,
        slot: KeySlot,
        encrypted_dek: [u8; WRAPPED_KEY_SIZE],
        checksum: [u8; CHECKSUM_SIZE],
    ) -> Self {
        Self {
            version: VERSION,
            algorithm_id,
            salt: slot.salt,
            iv: slot.iv,
            encrypted_dek,
            checksum,
        }
    }

    /// Serialize the header.
    ///
    /// Field widths are fixed by the types, so this cannot fail.
    pub fn pack(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..VERSION_OFFSET].copy_from_slice(&MAGIC);
        out[VERSION_OFFSET] = self.version;
        out[ALGO_OFFSET] = self.algorithm_id;
        out[SALT_OFFSET..IV_OFFSET].copy_from_slice(self.salt.as_bytes());
        out[IV_OFFSET..DEK_OFFSET].copy_from_slice(&self.iv);
        out[DEK_OFFSET..CHECKSUM_OFFSET].copy_from_slice(&self.encrypted_dek);
        out[CHECKSUM_OFFSET..].copy_from_slice(&self.checksum);
        out
    }

    /// Parse a header from the start of `bytes`.
    ///
    /// Trailing bytes beyond [`HEADER_SIZE`] are ignored. The version is read
    /// but not checked here.
    ///
    /// # Errors
    /// - `TruncatedHeader` if fewer than [`HEADER_SIZE`] bytes are given
    /// - `BadSignature` if the magic does not match
    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::TruncatedHeader);
        }
        if !has_signature(bytes) {
            return Err(Error::BadSignature);
        }

        Ok(Self {
            version: bytes[VERSION_OFFSET],
            algorithm_id: bytes[ALGO_OFFSET],
            salt: Salt::from_bytes(fixed(&bytes[SALT_OFFSET..IV_OFFSET])),
            iv: fixed(&bytes[IV_OFFSET..DEK_OFFSET]),
            encrypted_dek: fixed(&bytes[DEK_OFFSET..CHECKSUM_OFFSET]),
            checksum: fixed(&bytes[CHECKSUM_OFFSET..HEADER_SIZE]),
        })
    }
}

/// Whether `bytes` starts with the HexCore signature.
pub fn has_signature(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC.len() && bytes[..MAGIC.len()] == MAGIC
}

fn fixed<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}
