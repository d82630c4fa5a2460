//! File-level envelope encryption.
//!
//! An encrypted file is `[HexHeader][body IV][ciphertext]`. The body is
//! encrypted under a random per-file data key; the data key is wrapped with
//! a password-derived key, authenticating the body checksum as associated
//! data. Recovering the key therefore requires both the right password and
//! the checksum that was present at encryption time.
//!
//! Outputs are staged in a hidden sibling temp file and renamed into place
//! only once complete, so a failed call never leaves a file at the final
//! path.

use std::ffi::OsString;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use subtle::ConstantTimeEq;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::body::{checksum_stream, read_chunk, DecryptingStream, EncryptingStream};
use crate::header::{has_signature, HexHeader, KeySlot, HEADER_SIZE, MAGIC, VERSION};
use crate::kdf::{derive_key, KdfParams};
use crate::keys::DataKey;
use crate::wrap::{unwrap_key, wrap_key};
use hexcore_common::{Algorithm, Error, IntegrityStatus, Result};

/// Extension appended to encrypted files (without the dot).
pub const ENCRYPTED_EXTENSION: &str = "hxc";

/// Suffix used when decrypting a file that lacks the `.hxc` extension.
pub const DECRYPTED_SUFFIX: &str = "decrypted";

/// Capability the vault layer uses to encrypt, decrypt and verify files.
///
/// Implementations hold no per-call state; concurrent calls on different
/// paths must be safe.
pub trait FileEngine: Send + Sync {
    /// Encrypt `path` into a new sibling file `path.hxc` and return its path.
    ///
    /// The source file is left untouched.
    fn encrypt_file(&self, path: &Path, password: &[u8], algorithm: Algorithm) -> Result<PathBuf>;

    /// Decrypt an `.hxc` file next to itself and return the plaintext path.
    fn decrypt_file(&self, path: &Path, password: &[u8]) -> Result<PathBuf>;

    /// Check the body checksum without a password. Never writes.
    fn verify_integrity(&self, path: &Path) -> Result<IntegrityStatus>;
}

/// Password-free summary of an encrypted file's header.
#[derive(Debug, Clone, Serialize)]
pub struct HeaderInfo {
    pub version: u8,
    pub algorithm: String,
    /// Ciphertext length, excluding header and body IV.
    pub body_len: u64,
    /// Hex-encoded body checksum.
    pub checksum: String,
}

/// Stateless envelope-encryption engine.
#[derive(Debug, Clone, Default)]
pub struct EncryptionEngine {
    kdf: KdfParams,
}

impl EncryptionEngine {
    /// Create an engine using the format's standard KDF parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with custom KDF parameters.
    ///
    /// Files written by such an engine can only be opened with the same
    /// parameters; intended for tests.
    pub fn with_kdf_params(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    /// The KDF parameters in use.
    pub fn kdf_params(&self) -> &KdfParams {
        &self.kdf
    }

    /// Encrypt a file.
    ///
    /// # Preconditions
    /// - `path` names an existing regular file that is not already encrypted
    ///
    /// # Postconditions
    /// - Exactly one new file exists at `path.hxc`
    /// - Its size is `HEADER_SIZE + BODY_IV_SIZE + source size`
    ///
    /// # Errors
    /// - `UnsupportedAlgorithm` before any file is touched
    /// - `NotFound`, `AlreadyEncrypted`, `InvalidInput` for bad sources
    /// - I/O and cipher errors; the partial output is removed
    pub fn encrypt(&self, path: &Path, password: &[u8], algorithm: Algorithm) -> Result<PathBuf> {
        let algorithm_id = algorithm.id()?;
        debug!(path = %path.display(), algorithm = %algorithm, "Encrypting file");

        let mut source = open_source(path)?;
        if source.metadata()?.is_dir() {
            return Err(Error::InvalidInput(format!(
                "{} is a directory",
                path.display()
            )));
        }

        let mut magic = [0u8; MAGIC.len()];
        let peeked = read_chunk(&mut source, &mut magic)?;
        if has_signature(&magic[..peeked]) {
            return Err(Error::AlreadyEncrypted);
        }
        source.seek(SeekFrom::Start(0))?;

        let target = encrypted_path(path);
        let mut staging = stage_beside(&target)?;

        match self.write_envelope(&mut source, staging.as_file_mut(), password, algorithm, algorithm_id) {
            Ok(()) => {
                staging.persist(&target).map_err(|e| Error::Io(e.error))?;
                info!(path = %target.display(), "File encrypted");
                Ok(target)
            }
            Err(e) => {
                warn!(path = %target.display(), "Encryption failed, discarding partial output");
                drop(staging);
                Err(e)
            }
        }
    }

    fn write_envelope(
        &self,
        source: &mut File,
        output: &mut File,
        password: &[u8],
        algorithm: Algorithm,
        algorithm_id: u8,
    ) -> Result<()> {
        let dek = DataKey::generate();

        // Reserve the header; it is written last
        output.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
        let body = EncryptingStream::new(algorithm, &dek)?.encrypt_stream(&mut *source, &mut *output)?;

        let slot = KeySlot::generate();
        let kek = derive_key(password, &slot.salt, &self.kdf)?;
        let encrypted_dek = wrap_key(&kek, &slot.iv, &dek, &body.checksum)?;
        let header = HexHeader::new(algorithm_id, slot, encrypted_dek, body.checksum);

        output.seek(SeekFrom::Start(0))?;
        output.write_all(&header.pack())?;
        output.sync_all()?;
        Ok(())
    }

    /// Decrypt a file and return the plaintext path.
    ///
    /// The output path strips `.hxc`, or appends `.decrypted` when the input
    /// has another extension. An existing file at that path is never
    /// replaced.
    ///
    /// # Errors
    /// - Format errors from the header
    /// - `WrongPasswordOrTamperedHeader` when the data key does not unwrap
    /// - `IntegrityCheckFailed` when the body no longer matches the header;
    ///   no plaintext is left behind
    /// - `OutputExists` when the plaintext path is already taken
    pub fn decrypt(&self, path: &Path, password: &[u8]) -> Result<PathBuf> {
        debug!(path = %path.display(), "Decrypting file");

        let mut source = open_source(path)?;
        let header = read_header(&mut source)?;
        if header.version != VERSION {
            return Err(Error::UnsupportedVersion(header.version));
        }
        let algorithm = Algorithm::from_id(header.algorithm_id)?;

        let kek = derive_key(password, &header.salt, &self.kdf)?;
        let dek = unwrap_key(&kek, &header.iv, &header.encrypted_dek, &header.checksum)?;

        let target = plaintext_path(path);
        let mut staging = stage_beside(&target)?;

        let body = DecryptingStream::new(algorithm, &dek).decrypt_stream(&mut source, staging.as_file_mut());
        let verified = body.and_then(|body| {
            if bool::from(body.checksum[..].ct_eq(&header.checksum[..])) {
                Ok(())
            } else {
                Err(Error::IntegrityCheckFailed)
            }
        });

        match verified {
            Ok(()) => {
                staging.as_file_mut().sync_all()?;
                staging.persist_noclobber(&target).map_err(|e| match e.error.kind() {
                    ErrorKind::AlreadyExists => Error::OutputExists(target.display().to_string()),
                    _ => Error::Io(e.error),
                })?;
                info!(path = %target.display(), "File decrypted");
                Ok(target)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Decryption failed, discarding plaintext");
                drop(staging);
                Err(e)
            }
        }
    }

    /// Recompute the body checksum and compare it with the header.
    ///
    /// Malformed headers report [`IntegrityStatus::Invalid`]; only failures
    /// to open or read the file are errors.
    pub fn verify(&self, path: &Path) -> Result<IntegrityStatus> {
        debug!(path = %path.display(), "Verifying file");

        let mut source = open_source(path)?;
        let header = match read_header(&mut source) {
            Ok(header) if header.version == VERSION => header,
            Ok(_) => return Ok(IntegrityStatus::Invalid),
            Err(e) if e.is_format_error() => return Ok(IntegrityStatus::Invalid),
            Err(e) => return Err(e),
        };

        let body = checksum_stream(&mut source)?;
        if bool::from(body.checksum[..].ct_eq(&header.checksum[..])) {
            Ok(IntegrityStatus::Ok)
        } else {
            warn!(path = %path.display(), "Body checksum mismatch");
            Ok(IntegrityStatus::Corrupted)
        }
    }

    /// Read the header of an encrypted file without a password.
    pub fn inspect(&self, path: &Path) -> Result<HeaderInfo> {
        let mut source = open_source(path)?;
        let header = read_header(&mut source)?;
        let file_len = source.metadata()?.len();

        let algorithm = Algorithm::from_id(header.algorithm_id)
            .map(|a| a.label().to_string())
            .unwrap_or_else(|_| format!("unknown ({})", header.algorithm_id));

        Ok(HeaderInfo {
            version: header.version,
            algorithm,
            body_len: file_len.saturating_sub((HEADER_SIZE + crate::body::BODY_IV_SIZE) as u64),
            checksum: hex::encode(header.checksum),
        })
    }
}

impl FileEngine for EncryptionEngine {
    fn encrypt_file(&self, path: &Path, password: &[u8], algorithm: Algorithm) -> Result<PathBuf> {
        self.encrypt(path, password, algorithm)
    }

    fn decrypt_file(&self, path: &Path, password: &[u8]) -> Result<PathBuf> {
        self.decrypt(path, password)
    }

    fn verify_integrity(&self, path: &Path) -> Result<IntegrityStatus> {
        self.verify(path)
    }
}

/// `path` with `.hxc` appended.
pub fn encrypted_path(path: &Path) -> PathBuf {
    append_extension(path, ENCRYPTED_EXTENSION)
}

/// Output path for decrypting `path`.
pub fn plaintext_path(path: &Path) -> PathBuf {
    if is_encrypted_name(path) {
        path.with_extension("")
    } else {
        append_extension(path, DECRYPTED_SUFFIX)
    }
}

/// Whether `path` carries the `.hxc` extension.
pub fn is_encrypted_name(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == ENCRYPTED_EXTENSION)
}

fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

fn open_source(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
        _ => Error::Io(e),
    })
}

fn read_header<R: Read>(reader: &mut R) -> Result<HexHeader> {
    let mut bytes = [0u8; HEADER_SIZE];
    let n = read_chunk(reader, &mut bytes)?;
    HexHeader::unpack(&bytes[..n])
}

/// Hidden temp file in the directory that will hold `target`.
fn stage_beside(target: &Path) -> Result<NamedTempFile> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok(tempfile::Builder::new()
        .prefix(".hxc-")
        .suffix(".partial")
        .tempfile_in(dir)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BODY_IV_SIZE;
    use crate::header::CHECKSUM_SIZE;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    const CHECKSUM_OFFSET: usize = HEADER_SIZE - CHECKSUM_SIZE;

    fn engine() -> EncryptionEngine {
        EncryptionEngine::with_kdf_params(KdfParams::light())
    }

    fn write(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, data).unwrap();
        path
    }

    fn entries(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn flip(path: &Path, offset: usize) {
        let mut bytes = fs::read(path).unwrap();
        bytes[offset] ^= 0x01;
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_roundtrip_both_algorithms() {
        let temp = TempDir::new().unwrap();
        let engine = engine();

        for algorithm in [Algorithm::Aes256Ctr, Algorithm::ChaCha20] {
            let source = write(&temp, "report.txt", b"quarterly numbers");
            let encrypted = engine.encrypt(&source, b"1234", algorithm).unwrap();
            assert_eq!(encrypted, temp.path().join("report.txt.hxc"));
            fs::remove_file(&source).unwrap();

            let restored = engine.decrypt(&encrypted, b"1234").unwrap();
            assert_eq!(restored, source);
            assert_eq!(fs::read(&restored).unwrap(), b"quarterly numbers");
            fs::remove_file(&encrypted).unwrap();
        }
    }

    #[test]
    fn test_ten_byte_file_is_140_bytes() {
        let temp = TempDir::new().unwrap();
        let source = write(&temp, "ten.bin", b"0123456789");

        let encrypted = engine().encrypt(&source, b"pw", Algorithm::Aes256Ctr).unwrap();

        assert_eq!(fs::metadata(&encrypted).unwrap().len(), 140);
        assert_eq!(fs::metadata(&encrypted).unwrap().len() as usize, HEADER_SIZE + BODY_IV_SIZE + 10);
    }

    #[test]
    fn test_encrypt_leaves_source_and_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let source = write(&temp, "a.txt", b"abc");

        engine().encrypt(&source, b"pw", Algorithm::ChaCha20).unwrap();

        assert_eq!(fs::read(&source).unwrap(), b"abc");
        assert_eq!(entries(&temp), vec!["a.txt", "a.txt.hxc"]);
    }

    #[test]
    fn test_encrypt_missing_source() {
        let temp = TempDir::new().unwrap();
        let result = engine().encrypt(&temp.path().join("nope"), b"pw", Algorithm::Aes256Ctr);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_already_encrypted_guard() {
        let temp = TempDir::new().unwrap();
        let engine = engine();
        let source = write(&temp, "a.txt", b"abc");
        let encrypted = engine.encrypt(&source, b"pw", Algorithm::Aes256Ctr).unwrap();
        let before = entries(&temp);

        let result = engine.encrypt(&encrypted, b"pw", Algorithm::Aes256Ctr);

        assert!(matches!(result, Err(Error::AlreadyEncrypted)));
        assert_eq!(entries(&temp), before);
    }

    #[test]
    fn test_rsa_not_supported_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let source = write(&temp, "a.txt", b"abc");

        let result = engine().encrypt(&source, b"pw", Algorithm::Rsa);

        assert!(matches!(result, Err(Error::UnsupportedAlgorithm(_))));
        assert_eq!(entries(&temp), vec!["a.txt"]);
    }

    #[test]
    fn test_encrypt_directory_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("folder");
        fs::create_dir(&dir).unwrap();

        let result = engine().encrypt(&dir, b"pw", Algorithm::Aes256Ctr);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_empty_file_roundtrip() {
        let temp = TempDir::new().unwrap();
        let engine = engine();
        let source = write(&temp, "empty", b"");
        let encrypted = engine.encrypt(&source, b"pw", Algorithm::ChaCha20).unwrap();
        fs::remove_file(&source).unwrap();

        let restored = engine.decrypt(&encrypted, b"pw").unwrap();
        assert!(fs::read(restored).unwrap().is_empty());
    }

    #[test]
    fn test_fresh_salt_and_iv_per_encryption() {
        let temp = TempDir::new().unwrap();
        let engine = engine();
        let source = write(&temp, "a.txt", b"same content");

        let first = fs::read(engine.encrypt(&source, b"pw", Algorithm::Aes256Ctr).unwrap()).unwrap();
        let second = fs::read(engine.encrypt(&source, b"pw", Algorithm::Aes256Ctr).unwrap()).unwrap();

        let a = HexHeader::unpack(&first).unwrap();
        let b = HexHeader::unpack(&second).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(first[HEADER_SIZE..], second[HEADER_SIZE..]);
    }

    #[test]
    fn test_wrong_password_is_authentication_error() {
        let temp = TempDir::new().unwrap();
        let engine = engine();
        let source = write(&temp, "a.txt", b"secret");
        let encrypted = engine.encrypt(&source, b"right", Algorithm::Aes256Ctr).unwrap();
        fs::remove_file(&source).unwrap();

        let result = engine.decrypt(&encrypted, b"wrong");

        assert!(matches!(result, Err(Error::WrongPasswordOrTamperedHeader)));
        assert_eq!(entries(&temp), vec!["a.txt.hxc"]);
    }

    #[test]
    fn test_tampered_checksum_is_authentication_error() {
        let temp = TempDir::new().unwrap();
        let engine = engine();
        let source = write(&temp, "a.txt", b"secret");
        let encrypted = engine.encrypt(&source, b"pw", Algorithm::ChaCha20).unwrap();
        fs::remove_file(&source).unwrap();
        flip(&encrypted, CHECKSUM_OFFSET + 5);

        let result = engine.decrypt(&encrypted, b"pw");

        assert!(matches!(result, Err(Error::WrongPasswordOrTamperedHeader)));
        assert_eq!(entries(&temp), vec!["a.txt.hxc"]);
    }

    #[test]
    fn test_tampered_body_is_integrity_error() {
        let temp = TempDir::new().unwrap();
        let engine = engine();
        let source = write(&temp, "a.txt", b"some longer secret text");
        let encrypted = engine.encrypt(&source, b"pw", Algorithm::Aes256Ctr).unwrap();
        fs::remove_file(&source).unwrap();
        flip(&encrypted, HEADER_SIZE + BODY_IV_SIZE + 3);

        let result = engine.decrypt(&encrypted, b"pw");

        assert!(matches!(result, Err(Error::IntegrityCheckFailed)));
        assert_eq!(entries(&temp), vec!["a.txt.hxc"]);
    }

    #[test]
    fn test_truncated_body_is_integrity_error() {
        let temp = TempDir::new().unwrap();
        let engine = engine();
        let source = write(&temp, "a.txt", b"payload");
        let encrypted = engine.encrypt(&source, b"pw", Algorithm::Aes256Ctr).unwrap();
        fs::remove_file(&source).unwrap();
        let bytes = fs::read(&encrypted).unwrap();
        fs::write(&encrypted, &bytes[..HEADER_SIZE + 4]).unwrap();

        assert!(matches!(engine.decrypt(&encrypted, b"pw"), Err(Error::IntegrityCheckFailed)));
        assert!(!source.exists());
    }

    #[test]
    fn test_decrypt_format_errors() {
        let temp = TempDir::new().unwrap();
        let engine = engine();

        let short = write(&temp, "short.hxc", b"HEXC");
        assert!(matches!(engine.decrypt(&short, b"pw"), Err(Error::TruncatedHeader)));

        let foreign = write(&temp, "foreign.hxc", &[0u8; 200]);
        assert!(matches!(engine.decrypt(&foreign, b"pw"), Err(Error::BadSignature)));
    }

    #[test]
    fn test_decrypt_unsupported_version() {
        let temp = TempDir::new().unwrap();
        let engine = engine();
        let source = write(&temp, "a.txt", b"abc");
        let encrypted = engine.encrypt(&source, b"pw", Algorithm::Aes256Ctr).unwrap();
        let mut bytes = fs::read(&encrypted).unwrap();
        bytes[4] = 2;
        fs::write(&encrypted, bytes).unwrap();

        assert!(matches!(engine.decrypt(&encrypted, b"pw"), Err(Error::UnsupportedVersion(2))));
        assert_eq!(engine.verify(&encrypted).unwrap(), IntegrityStatus::Invalid);
    }

    #[test]
    fn test_decrypt_without_extension_appends_suffix() {
        let temp = TempDir::new().unwrap();
        let engine = engine();
        let source = write(&temp, "data.bin", b"xyz");
        let encrypted = engine.encrypt(&source, b"pw", Algorithm::Aes256Ctr).unwrap();
        let renamed = temp.path().join("blob");
        fs::rename(&encrypted, &renamed).unwrap();

        let restored = engine.decrypt(&renamed, b"pw").unwrap();

        assert_eq!(restored, temp.path().join("blob.decrypted"));
        assert_eq!(fs::read(restored).unwrap(), b"xyz");
    }

    #[test]
    fn test_verify_statuses() {
        let temp = TempDir::new().unwrap();
        let engine = engine();
        let source = write(&temp, "a.txt", b"verify me");
        let encrypted = engine.encrypt(&source, b"pw", Algorithm::ChaCha20).unwrap();

        assert_eq!(engine.verify(&encrypted).unwrap(), IntegrityStatus::Ok);
        assert_eq!(engine.verify(&source).unwrap(), IntegrityStatus::Invalid);

        flip(&encrypted, HEADER_SIZE + 1);
        assert_eq!(engine.verify(&encrypted).unwrap(), IntegrityStatus::Corrupted);
    }

    #[test]
    fn test_verify_is_idempotent_and_read_only() {
        let temp = TempDir::new().unwrap();
        let engine = engine();
        let source = write(&temp, "a.txt", b"verify me twice");
        let encrypted = engine.encrypt(&source, b"pw", Algorithm::Aes256Ctr).unwrap();
        let before = fs::read(&encrypted).unwrap();
        let listing = entries(&temp);

        let first = engine.verify(&encrypted).unwrap();
        let second = engine.verify(&encrypted).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read(&encrypted).unwrap(), before);
        assert_eq!(entries(&temp), listing);
    }

    #[test]
    fn test_verify_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            engine().verify(&temp.path().join("gone.hxc")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_inspect() {
        let temp = TempDir::new().unwrap();
        let engine = engine();
        let source = write(&temp, "a.txt", b"0123456789");
        let encrypted = engine.encrypt(&source, b"pw", Algorithm::ChaCha20).unwrap();

        let info = engine.inspect(&encrypted).unwrap();

        assert_eq!(info.version, VERSION);
        assert_eq!(info.algorithm, "CHACHA20");
        assert_eq!(info.body_len, 10);
        assert_eq!(info.checksum.len(), 64);
    }

    #[test]
    fn test_inspect_serializes_to_json() {
        let temp = TempDir::new().unwrap();
        let engine = engine();
        let source = write(&temp, "a.txt", b"0123456789");
        let encrypted = engine.encrypt(&source, b"pw", Algorithm::Aes256Ctr).unwrap();
        let info = engine.inspect(&encrypted).unwrap();

        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["version"], VERSION);
        assert_eq!(json["algorithm"], "AES-256");
        assert_eq!(json["body_len"], 10);
        assert_eq!(json["checksum"], info.checksum.as_str());
    }

    #[test]
    fn test_decrypt_never_replaces_existing_file() {
        let temp = TempDir::new().unwrap();
        let engine = engine();
        let source = write(&temp, "notes.txt", b"new contents");
        let encrypted = engine.encrypt(&source, b"pw", Algorithm::ChaCha20).unwrap();
        fs::write(&source, b"someone else's notes").unwrap();

        let result = engine.decrypt(&encrypted, b"pw");

        assert!(matches!(result, Err(Error::OutputExists(_))));
        assert_eq!(fs::read(&source).unwrap(), b"someone else's notes");
        assert_eq!(entries(&temp), vec!["notes.txt", "notes.txt.hxc"]);
    }

    // Written by the earlier HexCore release: 42-byte plaintext, password "1234",
    // standard KDF parameters. The ChaCha20 body IV starts at block 1252575372.
    const LEGACY_PLAINTEXT: &[u8] = b"Quarterly figures: 42, 17, 99. Keep safe.\n";
    const LEGACY_AES: &str = "4845584301007f790d1170eca2c3bcf6fc54263357c37724aa205a66c20448863c95f281ebcf8e370e3dc68805e59ffb2e051769a6c9606fbf818965ae6138b165d6614176c6600f850958a24cc51731351f3d8b6e6cd50a9089995d44696fa0a5313ab5e5d85828b451af42a4e976f4000aa983acd91aa39eb84cc7c5e2faaf5af05c6242deb091c8057efd50eeb0f634bf1a3cb3db5f13a6a9336d6bcf551e7a44d597fc3cf58a9fae613a";
    const LEGACY_CHACHA: &str = "484558430101171a4e0e57e362313c670a3f74a631b8a120ed3edad2ea6ab25746319e36a76ad1a429060c2e0ed36ddc77b6c9d68350217931866ac789f203ce323198778c02c31d2b87d5086f963be131858e313a9dd9330f72c510840cb08fdf9147776b4e9e2691b514e6020b507b0e718cc8a84aefd6c7bfcac44a7bbeec1b7feab7c75ec6e6ec1a43e6489440e75c098863ae96dddd6b22cb212e86a9d6329d084a3e4878f5a912c475";

    #[test]
    fn test_decrypts_legacy_files_for_both_algorithms() {
        let engine = EncryptionEngine::new();

        for (fixture, algorithm_id) in [(LEGACY_AES, 0u8), (LEGACY_CHACHA, 1u8)] {
            let temp = TempDir::new().unwrap();
            let bytes = hex::decode(fixture).unwrap();
            assert_eq!(bytes[5], algorithm_id);
            let path = temp.path().join("doc.txt.hxc");
            fs::write(&path, &bytes).unwrap();

            assert_eq!(engine.verify(&path).unwrap(), IntegrityStatus::Ok);
            let restored = engine.decrypt(&path, b"1234").unwrap();

            assert_eq!(restored, temp.path().join("doc.txt"));
            assert_eq!(fs::read(&restored).unwrap(), LEGACY_PLAINTEXT);
        }
    }

    #[test]
    fn test_plaintext_path_rules() {
        assert_eq!(plaintext_path(Path::new("/v/a.txt.hxc")), PathBuf::from("/v/a.txt"));
        assert_eq!(plaintext_path(Path::new("/v/a.txt")), PathBuf::from("/v/a.txt.decrypted"));
        assert_eq!(encrypted_path(Path::new("notes")), PathBuf::from("notes.hxc"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_roundtrip(
            data in proptest::collection::vec(any::<u8>(), 1..4096),
            password in proptest::collection::vec(any::<u8>(), 0..32),
            chacha in any::<bool>(),
        ) {
            let temp = TempDir::new().unwrap();
            let engine = engine();
            let algorithm = if chacha { Algorithm::ChaCha20 } else { Algorithm::Aes256Ctr };
            let source = write(&temp, "p.bin", &data);

            let encrypted = engine.encrypt(&source, &password, algorithm).unwrap();
            fs::remove_file(&source).unwrap();
            let restored = engine.decrypt(&encrypted, &password).unwrap();

            prop_assert_eq!(fs::read(restored).unwrap(), data);
        }

        #[test]
        fn prop_any_body_bit_flip_is_detected(
            data in proptest::collection::vec(any::<u8>(), 1..512),
            index in any::<proptest::sample::Index>(),
            bit in 0u8..8,
        ) {
            let temp = TempDir::new().unwrap();
            let engine = engine();
            let source = write(&temp, "p.bin", &data);
            let encrypted = engine.encrypt(&source, b"pw", Algorithm::Aes256Ctr).unwrap();
            fs::remove_file(&source).unwrap();

            let mut bytes = fs::read(&encrypted).unwrap();
            let offset = HEADER_SIZE + index.index(bytes.len() - HEADER_SIZE);
            bytes[offset] ^= 1 << bit;
            fs::write(&encrypted, bytes).unwrap();

            prop_assert!(matches!(engine.decrypt(&encrypted, b"pw"), Err(Error::IntegrityCheckFailed)));
            prop_assert!(!source.exists());
        }
    }
}
