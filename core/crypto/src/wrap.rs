//! Data-key wrapping using AES-256-GCM.
//!
//! The body checksum is passed as associated data, so a wrapped key only
//! opens when the checksum it was sealed with is presented unchanged.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};

use zeroize::Zeroizing;

use crate::header::{WRAPPED_KEY_SIZE, WRAP_IV_SIZE};
use crate::keys::{DataKey, KeyEncryptionKey, KEY_LENGTH};
use hexcore_common::{Error, Result};

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Encrypt `dek` under `kek`, authenticating `aad`.
///
/// # Postconditions
/// - Returns ciphertext || tag, exactly [`WRAPPED_KEY_SIZE`] bytes
///
/// # Security
/// - Caller supplies a fresh IV for every wrap
pub fn wrap_key(
    kek: &KeyEncryptionKey,
    iv: &[u8; WRAP_IV_SIZE],
    dek: &DataKey,
    aad: &[u8],
) -> Result<[u8; WRAPPED_KEY_SIZE]> {
    let cipher = Aes256Gcm::new(kek.as_bytes().into());
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(iv),
            Payload {
                msg: dek.as_bytes(),
                aad,
            },
        )
        .map_err(|e| Error::Crypto(format!("Key wrap failed: {}", e)))?;

    sealed
        .as_slice()
        .try_into()
        .map_err(|_| Error::Crypto(format!("Wrapped key has length {}", sealed.len())))
}

/// Decrypt a wrapped data key.
///
/// # Errors
/// - `WrongPasswordOrTamperedHeader` on any authentication failure; a wrong
///   key and modified associated data are not distinguished
pub fn unwrap_key(
    kek: &KeyEncryptionKey,
    iv: &[u8; WRAP_IV_SIZE],
    wrapped: &[u8; WRAPPED_KEY_SIZE],
    aad: &[u8],
) -> Result<DataKey> {
    let cipher = Aes256Gcm::new(kek.as_bytes().into());
    let opened = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(iv),
                Payload {
                    msg: wrapped,
                    aad,
                },
            )
            .map_err(|_| Error::WrongPasswordOrTamperedHeader)?,
    );

    let key: [u8; KEY_LENGTH] = opened
        .as_slice()
        .try_into()
        .map_err(|_| Error::WrongPasswordOrTamperedHeader)?;
    Ok(DataKey::from_bytes(key))
}
