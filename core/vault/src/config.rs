//! Vault settings and their persistence.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::manager::{DEFAULT_EXPORT_DIR, DEFAULT_VAULT_DIR};
use hexcore_common::{Algorithm, Error, Result};

/// Environment variable overriding the vault directory.
pub const ENV_VAULT_DIR: &str = "HEX_VAULT_DIR";

/// Environment variable overriding the export directory.
pub const ENV_EXPORT_DIR: &str = "HEX_EXPORT_DIR";

/// User-facing vault settings.
///
/// The access PIN is deliberately not part of this structure; see
/// [`crate::gate::AccessGate::from_env`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    /// Directory holding `.hxc` files.
    pub vault_dir: PathBuf,
    /// Directory receiving restored plaintext.
    pub export_dir: PathBuf,
    /// Body cipher used when none is given explicitly.
    pub default_algorithm: Algorithm,
    /// Remove the plaintext source after it is stored.
    pub delete_original: bool,
    /// Remove vault files after a successful restore.
    pub delete_encrypted: bool,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            vault_dir: PathBuf::from(DEFAULT_VAULT_DIR),
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            default_algorithm: Algorithm::default(),
            delete_original: true,
            delete_encrypted: true,
        }
    }
}

impl VaultSettings {
    /// Load settings: the optional JSON file first, then environment overrides.
    ///
    /// A missing `path` means defaults; a named file that does not exist is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let json = fs::read_to_string(path).map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
                    _ => Error::Io(e),
                })?;
                debug!(path = %path.display(), "Loaded settings file");
                Self::from_json(&json)?
            }
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_VAULT_DIR).filter(|v| !v.is_empty()) {
            self.vault_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_EXPORT_DIR).filter(|v| !v.is_empty()) {
            self.export_dir = PathBuf::from(dir);
        }
    }

    /// Write settings as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Create the vault and export directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.vault_dir)?;
        fs::create_dir_all(&self.export_dir)?;
        Ok(())
    }

    /// Serialize settings to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize settings from JSON; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}
