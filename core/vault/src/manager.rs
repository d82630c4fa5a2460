//! Vault manager: moves files into the encrypted store and back out.
//!
//! The manager owns two directories: the vault, holding `.hxc` files, and
//! the export directory, receiving restored plaintext. It never touches
//! cryptography itself; an engine is injected per call.

use serde::Serialize;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::VaultSettings;
use hexcore_common::{Algorithm, Error, IntegrityStatus, Result};
use hexcore_crypto::{is_encrypted_name, plaintext_path, FileEngine};

/// Default vault directory name.
pub const DEFAULT_VAULT_DIR: &str = "HEX_VAULT";

/// Default export directory name.
pub const DEFAULT_EXPORT_DIR: &str = "HEX_EXPORTS";

/// Outcome of a successful [`VaultManager::encrypt_and_store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreStatus {
    /// Encrypted file is in the vault; the original was removed or kept on request.
    Stored { vault_path: PathBuf },
    /// Encrypted file is in the vault but the original could not be removed.
    OriginalNotRemoved { vault_path: PathBuf, reason: String },
}

impl StoreStatus {
    /// Path of the encrypted file inside the vault.
    pub fn vault_path(&self) -> &Path {
        match self {
            Self::Stored { vault_path } | Self::OriginalNotRemoved { vault_path, .. } => vault_path,
        }
    }
}

/// Progress of a batch operation, reported after each file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    pub done: usize,
    pub total: usize,
    pub file_name: String,
}

impl BatchProgress {
    /// Completed fraction in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f32 / self.total as f32
        }
    }
}

/// Accumulated result of a batch restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub success: usize,
    pub failed: usize,
    /// One human-readable reason per failed file.
    pub errors: Vec<String>,
    /// Exported files whose encrypted copy could not be removed from the vault.
    pub retained: Vec<String>,
}

/// Per-file verification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyEntry {
    pub file: String,
    pub status: IntegrityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Result of a batch integrity scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub entries: Vec<VerifyEntry>,
}

impl VerifyReport {
    /// Entries that did not verify.
    pub fn issues(&self) -> impl Iterator<Item = &VerifyEntry> {
        self.entries.iter().filter(|e| !e.status.is_ok())
    }

    /// Number of entries that did not verify.
    pub fn issue_count(&self) -> usize {
        self.issues().count()
    }
}

/// Manager for one vault directory and its export directory.
#[derive(Debug, Clone)]
pub struct VaultManager {
    vault_dir: PathBuf,
    export_dir: PathBuf,
}

impl VaultManager {
    /// Create a manager. Directories are created on first use.
    pub fn new(vault_dir: impl Into<PathBuf>, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            vault_dir: vault_dir.into(),
            export_dir: export_dir.into(),
        }
    }

    /// Create a manager from loaded settings.
    pub fn from_settings(settings: &VaultSettings) -> Self {
        Self::new(&settings.vault_dir, &settings.export_dir)
    }

    /// The vault directory.
    pub fn vault_dir(&self) -> &Path {
        &self.vault_dir
    }

    /// The export directory.
    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Encrypt a file and move the result into the vault.
    ///
    /// # Preconditions
    /// - `src` exists and is outside the vault
    ///
    /// # Postconditions
    /// - The vault holds `<name>.hxc`, replacing any file of that name
    /// - With `delete_original`, the plaintext source is gone unless the
    ///   status is [`StoreStatus::OriginalNotRemoved`]
    ///
    /// # Errors
    /// - `NotFound` if the source does not exist
    /// - `AlreadyInVault` if the source lies inside the vault directory
    /// - Any engine error; the source is never touched in that case
    pub fn encrypt_and_store(
        &self,
        src: &Path,
        engine: &dyn FileEngine,
        password: &[u8],
        algorithm: Algorithm,
        delete_original: bool,
    ) -> Result<StoreStatus> {
        if !src.exists() {
            return Err(Error::NotFound(src.display().to_string()));
        }
        ensure_dir(&self.vault_dir)?;

        let abs_src = src.canonicalize()?;
        let abs_vault = self.vault_dir.canonicalize()?;
        if abs_src.starts_with(&abs_vault) {
            return Err(Error::AlreadyInVault);
        }

        let encrypted = engine.encrypt_file(src, password, algorithm)?;
        let file_name = encrypted
            .file_name()
            .ok_or_else(|| Error::operation_failed("engine returned a path without a file name"))?;
        let dest = self.vault_dir.join(file_name);

        if dest.exists() {
            debug!(path = %dest.display(), "Replacing existing vault file");
            fs::remove_file(&dest)?;
        }
        if let Err(e) = move_file(&encrypted, &dest) {
            // The source is intact, so the stray ciphertext can go
            let _ = fs::remove_file(&encrypted);
            return Err(e.into());
        }
        info!(path = %dest.display(), "File stored in vault");

        if delete_original {
            if let Err(e) = fs::remove_file(src) {
                warn!(path = %src.display(), error = %e, "Encrypted, but failed to delete original");
                return Ok(StoreStatus::OriginalNotRemoved {
                    vault_path: dest,
                    reason: e.to_string(),
                });
            }
        }

        Ok(StoreStatus::Stored { vault_path: dest })
    }

    /// Every `.hxc` file in the vault, sorted by name.
    pub fn list_vault(&self) -> Result<Vec<PathBuf>> {
        ensure_dir(&self.vault_dir)?;

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.vault_dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_file() && is_encrypted_name(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Decrypt every vault file into the export directory.
    ///
    /// See [`VaultManager::decrypt_vault_with_progress`].
    pub fn decrypt_vault(
        &self,
        engine: &dyn FileEngine,
        password: &[u8],
        delete_encrypted: bool,
    ) -> Result<BatchStats> {
        self.decrypt_vault_with_progress(engine, password, delete_encrypted, |_| {})
    }

    /// Decrypt every vault file into the export directory, reporting progress.
    ///
    /// Each file is handled independently: a failure is recorded in the
    /// returned stats and the batch moves on. Name collisions in the export
    /// directory get a numeric suffix (`name_1.ext`, `name_2.ext`, ...).
    /// A vault file whose plaintext name is already taken inside the vault
    /// fails with `OutputExists` and stays where it is.
    ///
    /// # Errors
    /// - `VaultEmpty` if the vault holds no `.hxc` files
    /// - I/O errors listing the vault or creating the export directory
    pub fn decrypt_vault_with_progress(
        &self,
        engine: &dyn FileEngine,
        password: &[u8],
        delete_encrypted: bool,
        mut on_progress: impl FnMut(BatchProgress),
    ) -> Result<BatchStats> {
        let files = self.list_vault()?;
        if files.is_empty() {
            return Err(Error::VaultEmpty);
        }
        ensure_dir(&self.export_dir)?;

        let total = files.len();
        let mut stats = BatchStats::default();

        for (i, encrypted) in files.iter().enumerate() {
            let name = display_name(encrypted);

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.restore_one(engine, encrypted, password)
            }));

            match outcome {
                Ok(Ok(exported)) => {
                    stats.success += 1;
                    info!(file = %name, export = %exported.display(), "File restored");
                    if delete_encrypted {
                        if let Err(e) = fs::remove_file(encrypted) {
                            warn!(file = %name, error = %e, "Restored, but encrypted copy was not removed");
                            stats.retained.push(name.clone());
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!(file = %name, error = %e, "Restore failed");
                    stats.failed += 1;
                    stats.errors.push(format!("{}: {}", name, e));
                }
                Err(_) => {
                    warn!(file = %name, "Restore panicked");
                    stats.failed += 1;
                    stats.errors.push(format!("Crash on {}", name));
                }
            }

            on_progress(BatchProgress {
                done: i + 1,
                total,
                file_name: name,
            });
        }

        info!(
            success = stats.success,
            failed = stats.failed,
            "Vault restore complete"
        );
        Ok(stats)
    }

    /// Decrypt one vault file in place, then move the plaintext out.
    ///
    /// A file already sitting in the vault under the plaintext name is left
    /// alone and the vault file counts as failed.
    fn restore_one(&self, engine: &dyn FileEngine, encrypted: &Path, password: &[u8]) -> Result<PathBuf> {
        let expected = plaintext_path(encrypted);
        if expected.exists() {
            return Err(Error::OutputExists(display_name(&expected)));
        }
        let plaintext = engine.decrypt_file(encrypted, password)?;

        // Engine reported success but nothing is there
        if !plaintext.exists() {
            return Err(Error::operation_failed(format!(
                "decryption reported success but {} is missing",
                display_name(&plaintext)
            )));
        }

        let file_name = display_name(&plaintext);
        let target = unique_destination(&self.export_dir, &file_name);
        if let Err(e) = move_file(&plaintext, &target) {
            // Keep the vault free of plaintext; the encrypted copy is still there
            let _ = fs::remove_file(&plaintext);
            return Err(e.into());
        }
        Ok(target)
    }

    /// Check every vault file's body checksum, reporting progress.
    ///
    /// # Errors
    /// - `VaultEmpty` if the vault holds no `.hxc` files
    pub fn verify_vault(
        &self,
        engine: &dyn FileEngine,
        mut on_progress: impl FnMut(BatchProgress),
    ) -> Result<VerifyReport> {
        let files = self.list_vault()?;
        if files.is_empty() {
            return Err(Error::VaultEmpty);
        }

        let total = files.len();
        let mut report = VerifyReport::default();

        for (i, path) in files.iter().enumerate() {
            let name = display_name(path);
            let entry = match engine.verify_integrity(path) {
                Ok(status) => VerifyEntry {
                    file: name.clone(),
                    status,
                    detail: None,
                },
                Err(e) => VerifyEntry {
                    file: name.clone(),
                    status: IntegrityStatus::Invalid,
                    detail: Some(e.to_string()),
                },
            };
            if !entry.status.is_ok() {
                warn!(file = %name, status = %entry.status, "Integrity check failed");
            }
            report.entries.push(entry);

            on_progress(BatchProgress {
                done: i + 1,
                total,
                file_name: name,
            });
        }

        info!(total, issues = report.issue_count(), "Vault scan complete");
        Ok(report)
    }
}

impl Default for VaultManager {
    fn default() -> Self {
        Self::new(DEFAULT_VAULT_DIR, DEFAULT_EXPORT_DIR)
    }
}

/// First free path for `file_name` in `dir`: `name.ext`, `name_1.ext`, ...
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let ext = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1u64..)
        .map(|n| dir.join(format!("{}_{}{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Rename, falling back to copy and delete across file systems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(error = %rename_err, "Rename failed, copying instead");
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

fn ensure_dir(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
