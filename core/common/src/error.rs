//! Common error types for HexCore.

use thiserror::Error;

/// Upper bound on the length of free-form failure messages.
///
/// Messages built from library errors may echo user paths; they never carry
/// key material, but they are still capped before leaving the crate.
pub const MAX_MESSAGE_LEN: usize = 120;

/// Top-level error type for HexCore operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Fewer bytes than a full header were available.
    #[error("Invalid file: header truncated or insufficient data")]
    TruncatedHeader,

    /// The first four bytes are not the HexCore signature.
    #[error("Invalid file: missing HexCore signature")]
    BadSignature,

    /// The header declares a format version this build cannot read.
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// The data key could not be unwrapped.
    ///
    /// A wrong password and a tampered header are reported identically.
    #[error("Wrong password or tampered header")]
    WrongPasswordOrTamperedHeader,

    /// The ciphertext body does not match the checksum stored in the header.
    #[error("Integrity check failed (body corrupted)")]
    IntegrityCheckFailed,

    /// Source file does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Source already carries the HexCore signature.
    #[error("File is already encrypted")]
    AlreadyEncrypted,

    /// Decryption target is already taken by another file.
    #[error("Output already exists: {0}")]
    OutputExists(String),

    /// Source lives inside the vault directory.
    #[error("File is already in the vault")]
    AlreadyInVault,

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Algorithm is recognized but not implemented, or not recognized at all.
    #[error("Algorithm not supported: {0}")]
    UnsupportedAlgorithm(String),

    /// Cipher library failure that is not an authentication failure.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// The vault holds no encrypted files.
    #[error("Vault is empty")]
    VaultEmpty,

    /// The access gate rejected the supplied PIN.
    #[error("Access denied")]
    AccessDenied,

    /// Settings could not be serialized or parsed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal fault, downgraded at the operation boundary.
    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Build an [`Error::OperationFailed`] with a bounded message.
    pub fn operation_failed(message: impl std::fmt::Display) -> Self {
        Self::OperationFailed(bounded(&message.to_string()))
    }

    /// Whether this error came from the format layer (header parsing).
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::TruncatedHeader | Self::BadSignature | Self::UnsupportedVersion(_)
        )
    }
}

/// Truncate `message` to [`MAX_MESSAGE_LEN`] characters.
pub fn bounded(message: &str) -> String {
    if message.chars().count() <= MAX_MESSAGE_LEN {
        return message.to_string();
    }
    let mut out: String = message.chars().take(MAX_MESSAGE_LEN - 3).collect();
    out.push_str("...");
    out
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
