//! Key derivation using Argon2id.
//!
//! Argon2id is a memory-hard password hashing function that provides
//! resistance to both GPU and time-memory trade-off attacks.

use argon2::{Algorithm, Argon2, Params, Version};

use crate::keys::{KeyEncryptionKey, Salt, KEY_LENGTH};
use hexcore_common::{Error, Result};

/// Parameters for Argon2id key derivation.
///
/// The parameters are not stored in the file header, so a file can only be
/// opened with the parameters it was sealed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Parameters of the `.hxc` format: 4 lanes, 64 MiB, one pass.
    pub const fn standard() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 1,
            parallelism: 4,
        }
    }

    /// Cheap parameters for tests.
    ///
    /// Files sealed with these are not readable by a default engine.
    pub const fn light() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::standard()
    }
}

/// Derive a key encryption key from a password and salt using Argon2id.
///
/// # Postconditions
/// - Returns a 32-byte key
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - Returns error if Argon2id parameters are invalid
///
/// # Security
/// - Password is not stored or logged
pub fn derive_key(password: &[u8], salt: &Salt, params: &KdfParams) -> Result<KeyEncryptionKey> {
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(password, salt.as_bytes(), &mut key_bytes)
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(KeyEncryptionKey::from_bytes(key_bytes))
}
