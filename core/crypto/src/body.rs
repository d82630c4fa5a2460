//! Streaming body encryption for large files.
//!
//! The body of an `.hxc` file is `[IV: 16 bytes][ciphertext]`, where the
//! ciphertext is the plaintext XORed with an AES-256-CTR or ChaCha20
//! keystream. Stream ciphers preserve length, so no framing is needed.
//!
//! The body checksum is SHA-256 over `IV || ciphertext`. It is computed
//! while the data streams through, in both directions, so no second pass
//! over the file is ever required.

use std::io::{ErrorKind, Read, Write};

use chacha20::ChaCha20;
use ctr::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use sha2::{Digest, Sha256};

use crate::header::CHECKSUM_SIZE;
use crate::keys::{random_bytes, DataKey};
use hexcore_common::{Algorithm, Error, Result};

/// Default chunk size for streaming encryption (64 KiB).
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Size of the body IV written right after the header.
pub const BODY_IV_SIZE: usize = 16;

/// ChaCha20 reads the IV as a 4-byte little-endian initial block counter
/// followed by a 12-byte nonce.
const CHACHA_NONCE_OFFSET: usize = 4;

const CHACHA_BLOCK_SIZE: u64 = 64;

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// Result of streaming a body through a cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodySummary {
    /// SHA-256 over `IV || ciphertext`.
    pub checksum: [u8; CHECKSUM_SIZE],
    /// Number of payload bytes processed (excluding the IV).
    pub bytes: u64,
}

enum BodyCipher {
    Aes(Box<Aes256Ctr>),
    ChaCha(Box<ChaCha20>),
}

impl BodyCipher {
    fn new(algorithm: Algorithm, key: &DataKey, iv: &[u8; BODY_IV_SIZE]) -> Result<Self> {
        match algorithm {
            Algorithm::Aes256Ctr => Aes256Ctr::new_from_slices(key.as_bytes(), iv)
                .map(|c| Self::Aes(Box::new(c)))
                .map_err(|e| Error::Crypto(format!("AES-CTR init failed: {}", e))),
            Algorithm::ChaCha20 => {
                let mut cipher =
                    ChaCha20::new_from_slices(key.as_bytes(), &iv[CHACHA_NONCE_OFFSET..])
                        .map_err(|e| Error::Crypto(format!("ChaCha20 init failed: {}", e)))?;
                cipher
                    .try_seek(chacha_start_offset(iv))
                    .map_err(|e| Error::Crypto(format!("ChaCha20 seek failed: {}", e)))?;
                Ok(Self::ChaCha(Box::new(cipher)))
            }
            Algorithm::Rsa => Err(Error::UnsupportedAlgorithm(
                "RSA is not supported".to_string(),
            )),
        }
    }

    fn apply(&mut self, buf: &mut [u8]) -> Result<()> {
        let result = match self {
            Self::Aes(c) => c.try_apply_keystream(buf),
            Self::ChaCha(c) => c.try_apply_keystream(buf),
        };
        result.map_err(|_| Error::Crypto("Keystream exhausted".to_string()))
    }
}

/// Keystream byte offset of the initial block counter stored in `iv`.
fn chacha_start_offset(iv: &[u8; BODY_IV_SIZE]) -> u64 {
    let mut counter = [0u8; CHACHA_NONCE_OFFSET];
    counter.copy_from_slice(&iv[..CHACHA_NONCE_OFFSET]);
    u64::from(u32::from_le_bytes(counter)) * CHACHA_BLOCK_SIZE
}

/// Encrypting stream that writes `IV || ciphertext`.
pub struct EncryptingStream {
    cipher: BodyCipher,
    iv: [u8; BODY_IV_SIZE],
    chunk_size: usize,
}

impl EncryptingStream {
    /// Create a stream with a fresh random IV.
    ///
    /// For ChaCha20 the counter bytes are zeroed, so a new file always has
    /// the full 2^32-block keystream available; the nonce stays random.
    ///
    /// # Errors
    /// - `UnsupportedAlgorithm` for algorithms without a body cipher
    pub fn new(algorithm: Algorithm, key: &DataKey) -> Result<Self> {
        let mut iv: [u8; BODY_IV_SIZE] = random_bytes();
        if algorithm == Algorithm::ChaCha20 {
            iv[..CHACHA_NONCE_OFFSET].fill(0);
        }
        Self::with_iv(algorithm, key, iv)
    }

    /// Create a stream with a caller-chosen IV.
    ///
    /// # Security
    /// - Caller is responsible for IV uniqueness per key
    pub fn with_iv(algorithm: Algorithm, key: &DataKey, iv: [u8; BODY_IV_SIZE]) -> Result<Self> {
        Ok(Self {
            cipher: BodyCipher::new(algorithm, key, &iv)?,
            iv,
            chunk_size: CHUNK_SIZE,
        })
    }

    /// Set custom chunk size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// The body IV this stream writes.
    pub fn iv(&self) -> &[u8; BODY_IV_SIZE] {
        &self.iv
    }

    /// Encrypt data from reader and write `IV || ciphertext` to writer.
    ///
    /// # Postconditions
    /// - Output length is `BODY_IV_SIZE` + plaintext length
    /// - Returned checksum covers exactly the bytes written
    ///
    /// # Errors
    /// - I/O errors from reader/writer
    /// - Keystream exhaustion
    pub fn encrypt_stream<R: Read, W: Write>(
        mut self,
        mut reader: R,
        mut writer: W,
    ) -> Result<BodySummary> {
        let mut hasher = Sha256::new();
        writer.write_all(&self.iv)?;
        hasher.update(self.iv);

        let mut buffer = vec![0u8; self.chunk_size];
        let mut total_bytes = 0u64;

        loop {
            let bytes_read = read_chunk(&mut reader, &mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            let chunk = &mut buffer[..bytes_read];
            self.cipher.apply(chunk)?;
            // Hash the ciphertext, not the plaintext
            hasher.update(&*chunk);
            writer.write_all(chunk)?;
            total_bytes += bytes_read as u64;
        }

        buffer.fill(0);
        writer.flush()?;

        Ok(BodySummary {
            checksum: hasher.finalize().into(),
            bytes: total_bytes,
        })
    }
}

/// Decrypting stream that reads `IV || ciphertext`.
pub struct DecryptingStream<'a> {
    algorithm: Algorithm,
    key: &'a DataKey,
    chunk_size: usize,
}

impl<'a> DecryptingStream<'a> {
    /// Create a new decrypting stream.
    pub fn new(algorithm: Algorithm, key: &'a DataKey) -> Self {
        Self {
            algorithm,
            key,
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Set custom chunk size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Decrypt data from reader and write plaintext to writer.
    ///
    /// The returned checksum is recomputed from the ciphertext as read; the
    /// caller compares it against the header before trusting the output.
    ///
    /// # Errors
    /// - `IntegrityCheckFailed` if the body is shorter than its IV
    /// - I/O errors
    pub fn decrypt_stream<R: Read, W: Write>(
        &self,
        mut reader: R,
        mut writer: W,
    ) -> Result<BodySummary> {
        let mut iv = [0u8; BODY_IV_SIZE];
        if read_chunk(&mut reader, &mut iv)? < BODY_IV_SIZE {
            return Err(Error::IntegrityCheckFailed);
        }

        let mut cipher = BodyCipher::new(self.algorithm, self.key, &iv)?;
        let mut hasher = Sha256::new();
        hasher.update(iv);

        let mut buffer = vec![0u8; self.chunk_size];
        let mut total_bytes = 0u64;

        loop {
            let bytes_read = read_chunk(&mut reader, &mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            let chunk = &mut buffer[..bytes_read];
            hasher.update(&*chunk);
            cipher.apply(chunk)?;
            writer.write_all(chunk)?;
            total_bytes += bytes_read as u64;
        }

        buffer.fill(0);
        writer.flush()?;

        Ok(BodySummary {
            checksum: hasher.finalize().into(),
            bytes: total_bytes,
        })
    }
}

/// Hash a body (`IV || ciphertext`) without decrypting it.
pub fn checksum_stream<R: Read>(mut reader: R) -> Result<BodySummary> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut total_bytes = 0u64;

    loop {
        let bytes_read = read_chunk(&mut reader, &mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        total_bytes += bytes_read as u64;
    }

    Ok(BodySummary {
        checksum: hasher.finalize().into(),
        bytes: total_bytes,
    })
}

/// Fill `buffer` from `reader`, stopping early only at end of input.
pub(crate) fn read_chunk<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<usize> {
    let mut total_read = 0;

    while total_read < buffer.len() {
        match reader.read(&mut buffer[total_read..]) {
            Ok(0) => break,
            Ok(n) => total_read += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(total_read)
}
