//! Cryptographic core for HexCore.
//!
//! This module provides:
//! - The fixed 114-byte `.hxc` header format
//! - Key derivation using Argon2id
//! - Data-key wrapping with AES-256-GCM, bound to the body checksum
//! - Streaming body encryption with AES-256-CTR or ChaCha20
//! - The file-level [`EncryptionEngine`] and its [`FileEngine`] capability
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Checksums are compared in constant time
//! - Partial outputs never appear at their final path

pub mod body;
pub mod engine;
pub mod header;
pub mod kdf;
pub mod keys;
pub mod wrap;

pub use body::{checksum_stream, DecryptingStream, EncryptingStream, BODY_IV_SIZE, CHUNK_SIZE};
pub use engine::{
    encrypted_path, is_encrypted_name, plaintext_path, EncryptionEngine, FileEngine, HeaderInfo,
    ENCRYPTED_EXTENSION,
};
pub use header::{HexHeader, KeySlot, HEADER_SIZE, MAGIC, VERSION};
pub use kdf::{derive_key, KdfParams};
pub use keys::{DataKey, KeyEncryptionKey, Salt};
pub use wrap::{unwrap_key, wrap_key};
