//! Common types used throughout HexCore.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

use crate::{Error, Result};

/// Body cipher selector offered to callers.
///
/// Only the two stream ciphers have a wire identifier. The asymmetric option
/// is advertised by front ends but has no implementation; selecting it always
/// yields [`Error::UnsupportedAlgorithm`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// AES-256 in counter mode.
    #[default]
    #[serde(rename = "aes-256-ctr")]
    Aes256Ctr,
    /// ChaCha20 stream cipher.
    #[serde(rename = "chacha20")]
    ChaCha20,
    /// RSA. Not supported.
    #[serde(rename = "rsa")]
    Rsa,
}

impl Algorithm {
    /// Wire identifier for AES-256-CTR.
    pub const AES_ID: u8 = 0;
    /// Wire identifier for ChaCha20.
    pub const CHACHA_ID: u8 = 1;

    /// Header identifier for this algorithm.
    ///
    /// # Errors
    /// - `UnsupportedAlgorithm` for [`Algorithm::Rsa`]
    pub fn id(self) -> Result<u8> {
        match self {
            Self::Aes256Ctr => Ok(Self::AES_ID),
            Self::ChaCha20 => Ok(Self::CHACHA_ID),
            Self::Rsa => Err(Error::UnsupportedAlgorithm(
                "RSA is not supported".to_string(),
            )),
        }
    }

    /// Resolve a header identifier.
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            Self::AES_ID => Ok(Self::Aes256Ctr),
            Self::CHACHA_ID => Ok(Self::ChaCha20),
            other => Err(Error::UnsupportedAlgorithm(format!(
                "unknown algorithm id {}",
                other
            ))),
        }
    }

    /// Display label used by front ends.
    pub fn label(self) -> &'static str {
        match self {
            Self::Aes256Ctr => "AES-256",
            Self::ChaCha20 => "CHACHA20",
            Self::Rsa => "RSA",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "aes" | "aes-256" | "aes256" | "aes-256-ctr" => Ok(Self::Aes256Ctr),
            "chacha" | "chacha20" => Ok(Self::ChaCha20),
            "rsa" => Ok(Self::Rsa),
            other => Err(Error::InvalidInput(format!("unknown algorithm '{}'", other))),
        }
    }
}

/// Outcome of a password-free integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityStatus {
    /// Body checksum matches the header.
    Ok,
    /// Header is well formed but the body checksum differs.
    Corrupted,
    /// Not a readable HexCore file.
    Invalid,
}

impl IntegrityStatus {
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for IntegrityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "INTEGRITY OK"),
            Self::Corrupted => write!(f, "CORRUPTED"),
            Self::Invalid => write!(f, "INVALID FILE"),
        }
    }
}

/// Sensitive data wrapper that zeroizes on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SensitiveBytes {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveBytes([REDACTED; {} bytes])", self.0.len())
    }
}
