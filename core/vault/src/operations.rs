//! Vault operations run as background tasks.
//!
//! Each operation reports through a [`TaskReporter`] with the log lines and
//! banners a front end shows while the work is in progress.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::VaultSettings;
use crate::gate::Credential;
use crate::manager::{StoreStatus, VaultManager};
use crate::task::{spawn_task, TaskHandle, TaskReporter};
use hexcore_common::{Algorithm, Error, Result};
use hexcore_crypto::FileEngine;

/// Unlocked access to one vault.
///
/// Only constructible from a [`Credential`], so every operation here has
/// passed the access gate.
#[derive(Clone)]
pub struct VaultOperations {
    manager: VaultManager,
    engine: Arc<dyn FileEngine>,
    credential: Credential,
    delete_original: bool,
    delete_encrypted: bool,
}

impl VaultOperations {
    /// Bind a manager and engine to an unlocked credential.
    pub fn new(manager: VaultManager, engine: Arc<dyn FileEngine>, credential: Credential) -> Self {
        Self {
            manager,
            engine,
            credential,
            delete_original: true,
            delete_encrypted: true,
        }
    }

    /// Build from settings, taking the delete flags from them.
    pub fn from_settings(
        settings: &VaultSettings,
        engine: Arc<dyn FileEngine>,
        credential: Credential,
    ) -> Self {
        Self::new(VaultManager::from_settings(settings), engine, credential)
            .delete_original(settings.delete_original)
            .delete_encrypted(settings.delete_encrypted)
    }

    /// Whether stored sources are removed.
    pub fn delete_original(mut self, yes: bool) -> Self {
        self.delete_original = yes;
        self
    }

    /// Whether restored vault files are removed.
    pub fn delete_encrypted(mut self, yes: bool) -> Self {
        self.delete_encrypted = yes;
        self
    }

    /// Whether a restore removes vault files it exported.
    pub fn deletes_encrypted(&self) -> bool {
        self.delete_encrypted
    }

    /// The underlying manager.
    pub fn manager(&self) -> &VaultManager {
        &self.manager
    }

    /// Password for direct engine calls.
    pub fn password(&self) -> &[u8] {
        self.credential.password()
    }

    /// The engine shared by every operation.
    pub fn engine(&self) -> &dyn FileEngine {
        self.engine.as_ref()
    }

    /// Encrypt `path` into the vault on a background thread.
    pub fn encrypt_task(&self, path: impl Into<PathBuf>, algorithm: Algorithm) -> Result<TaskHandle> {
        let ops = self.clone();
        let path = path.into();
        spawn_task("encrypt", move |r| ops.run_encrypt(r, &path, algorithm))
    }

    /// Restore the whole vault on a background thread.
    pub fn restore_task(&self) -> Result<TaskHandle> {
        let ops = self.clone();
        spawn_task("restore", move |r| ops.run_restore(r))
    }

    /// Scan the whole vault on a background thread.
    pub fn verify_task(&self) -> Result<TaskHandle> {
        let ops = self.clone();
        spawn_task("verify", move |r| ops.run_verify(r))
    }

    fn run_encrypt(&self, r: &TaskReporter, path: &Path, algorithm: Algorithm) {
        r.progress(0.1);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        r.log(format!("ENCRYPTING: {}", name));

        match self.manager.encrypt_and_store(
            path,
            self.engine.as_ref(),
            self.credential.password(),
            algorithm,
            self.delete_original,
        ) {
            Ok(status) => {
                r.important("ENCRYPTION SUCCESSFUL");
                r.log("FILE MOVED TO VAULT");
                if let StoreStatus::OriginalNotRemoved { reason, .. } = status {
                    r.log(format!("ORIGINAL NOT DELETED: {}", reason));
                }
            }
            Err(e) => r.important(format!("FAILED: {}", e)),
        }
        r.progress(1.0);
    }

    fn run_restore(&self, r: &TaskReporter) {
        r.progress(0.1);
        r.log("UNLOCKING VAULT...");

        match self.manager.decrypt_vault_with_progress(
            self.engine.as_ref(),
            self.credential.password(),
            self.delete_encrypted,
            |p| r.progress(p.fraction()),
        ) {
            Ok(stats) => {
                r.log(format!("SUCCESS: {} | FAIL: {}", stats.success, stats.failed));
                for err in &stats.errors {
                    r.log(format!("ERR: {}", err));
                }
                for name in &stats.retained {
                    r.log(format!("KEPT IN VAULT: {}", name));
                }
                r.important("VAULT RESTORE COMPLETE");
            }
            Err(e) => r.important(e.to_string()),
        }
        r.progress(1.0);
    }

    fn run_verify(&self, r: &TaskReporter) {
        r.progress(0.1);
        r.log("SCANNING VAULT INTEGRITY...");

        match self
            .manager
            .verify_vault(self.engine.as_ref(), |p| r.progress(p.fraction()))
        {
            Ok(report) => {
                for entry in report.issues() {
                    r.log(format!("FAIL: {} [{}]", entry.file, entry.status));
                }
                match report.issue_count() {
                    0 => r.important("ALL FILES VERIFIED OK"),
                    n => r.important(format!("FOUND {} CORRUPTED FILES", n)),
                }
            }
            Err(Error::VaultEmpty) => r.important("VAULT IS EMPTY"),
            Err(e) => r.important(format!("FAILED: {}", e)),
        }
        r.progress(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::AccessGate;
    use crate::task::TaskEvent;
    use hexcore_crypto::{EncryptionEngine, KdfParams};
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, VaultOperations) {
        let temp = TempDir::new().unwrap();
        let manager = VaultManager::new(temp.path().join("vault"), temp.path().join("exports"));
        let engine = Arc::new(EncryptionEngine::with_kdf_params(KdfParams::light()));
        let credential = AccessGate::new("1234").unwrap().unlock("1234").unwrap();
        (temp, VaultOperations::new(manager, engine, credential))
    }

    fn banners(events: &[TaskEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::Important(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    fn logs(events: &[TaskEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::Log(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    fn assert_well_formed(events: &[TaskEvent]) {
        assert_eq!(events.first(), Some(&TaskEvent::Progress(0.1)));
        assert_eq!(events.last(), Some(&TaskEvent::Finished));
        assert_eq!(events.iter().filter(|e| **e == TaskEvent::Finished).count(), 1);
        let mut last = 0.0;
        for e in events {
            if let TaskEvent::Progress(p) = e {
                assert!(*p >= last);
                last = *p;
            }
        }
        assert_eq!(last, 1.0);
    }

    fn plant(temp: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = temp.path().join(name);
        fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_encrypt_task_messages() {
        let (temp, ops) = setup();
        let src = plant(&temp, "photo.jpg", b"jpeg bytes");

        let events = ops.encrypt_task(&src, Algorithm::ChaCha20).unwrap().wait();

        assert_well_formed(&events);
        assert_eq!(banners(&events), vec!["ENCRYPTION SUCCESSFUL"]);
        assert_eq!(logs(&events), vec!["ENCRYPTING: photo.jpg", "FILE MOVED TO VAULT"]);
        assert!(!src.exists());
        assert_eq!(ops.manager().list_vault().unwrap().len(), 1);
    }

    #[test]
    fn test_encrypt_task_failure_banner() {
        let (temp, ops) = setup();
        let src = plant(&temp, "doc.txt", b"text");

        let events = ops.encrypt_task(&src, Algorithm::Rsa).unwrap().wait();

        assert_well_formed(&events);
        let banner = banners(&events)[0];
        assert!(banner.starts_with("FAILED: "), "{banner}");
        assert!(src.exists());
    }

    #[test]
    fn test_encrypt_task_respects_keep_original() {
        let (temp, ops) = setup();
        let ops = ops.delete_original(false);
        let src = plant(&temp, "keep.txt", b"text");

        ops.encrypt_task(&src, Algorithm::Aes256Ctr).unwrap().wait();
        assert!(src.exists());
    }

    #[test]
    fn test_restore_task_reports_stats() {
        let (temp, ops) = setup();
        for name in ["a.txt", "b.txt"] {
            let src = plant(&temp, name, name.as_bytes());
            ops.encrypt_task(&src, Algorithm::Aes256Ctr).unwrap().wait();
        }
        let vault_files = ops.manager().list_vault().unwrap();
        let mut bytes = fs::read(&vault_files[1]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x80;
        fs::write(&vault_files[1], bytes).unwrap();

        let events = ops.restore_task().unwrap().wait();

        assert_well_formed(&events);
        let lines = logs(&events);
        assert_eq!(lines[0], "UNLOCKING VAULT...");
        assert_eq!(lines[1], "SUCCESS: 1 | FAIL: 1");
        assert!(lines[2].starts_with("ERR: b.txt.hxc"));
        assert_eq!(banners(&events), vec!["VAULT RESTORE COMPLETE"]);
        // Progress after each file, not only at the boundaries
        assert!(events.contains(&TaskEvent::Progress(0.5)));
    }

    #[test]
    fn test_restore_task_empty_vault() {
        let (_temp, ops) = setup();
        let events = ops.restore_task().unwrap().wait();

        assert_well_formed(&events);
        assert_eq!(banners(&events), vec!["Vault is empty"]);
    }

    #[test]
    fn test_verify_task_all_ok() {
        let (temp, ops) = setup();
        let src = plant(&temp, "a.txt", b"a");
        ops.encrypt_task(&src, Algorithm::Aes256Ctr).unwrap().wait();

        let events = ops.verify_task().unwrap().wait();

        assert_well_formed(&events);
        assert_eq!(logs(&events), vec!["SCANNING VAULT INTEGRITY..."]);
        assert_eq!(banners(&events), vec!["ALL FILES VERIFIED OK"]);
    }

    #[test]
    fn test_verify_task_counts_issues() {
        let (temp, ops) = setup();
        let src = plant(&temp, "a.txt", b"a");
        ops.encrypt_task(&src, Algorithm::Aes256Ctr).unwrap().wait();
        fs::write(ops.manager().vault_dir().join("fake.hxc"), b"garbage").unwrap();

        let events = ops.verify_task().unwrap().wait();

        assert_well_formed(&events);
        assert!(logs(&events).contains(&"FAIL: fake.hxc [INVALID FILE]"));
        assert_eq!(banners(&events), vec!["FOUND 1 CORRUPTED FILES"]);
    }

    #[test]
    fn test_verify_task_empty_vault() {
        let (_temp, ops) = setup();
        let events = ops.verify_task().unwrap().wait();

        assert_well_formed(&events);
        assert_eq!(banners(&events), vec!["VAULT IS EMPTY"]);
    }
}
