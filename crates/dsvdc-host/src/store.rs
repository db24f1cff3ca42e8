//! YAML-backed state store with atomic writes and backup recovery.
//!
//! Write strategy:
//! 1. Copy the current file to `<path>.bak` (best effort).
//! 2. Write the new tree to `<path>.tmp`.
//! 3. Atomically rename `<path>.tmp` onto `<path>`.
//!
//! Load strategy: primary first; on failure the backup, restoring the
//! primary from it; otherwise "no state" so the host starts fresh.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::persist::StateFile;

const BACKUP_SUFFIX: &str = ".bak";
const TMP_SUFFIX: &str = ".tmp";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// File-based store for the persisted host property tree.
#[derive(Debug, Clone)]
pub struct PropertyStore {
    path: PathBuf,
    backup_path: PathBuf,
    tmp_path: PathBuf,
}

impl PropertyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut name = path.as_os_str().to_os_string();
        name.push(BACKUP_SUFFIX);
        let backup_path = PathBuf::from(&name);
        let mut name = path.as_os_str().to_os_string();
        name.push(TMP_SUFFIX);
        let tmp_path = PathBuf::from(&name);
        Self {
            path,
            backup_path,
            tmp_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Persist `state` atomically (backup, temp write, rename).
    pub fn save(&self, state: &StateFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        if self.path.is_file() {
            if let Err(err) = fs::copy(&self.path, &self.backup_path) {
                warn!(
                    "failed to back up {} to {}: {err}",
                    self.path.display(),
                    self.backup_path.display()
                );
            } else {
                debug!(
                    "backed up {} to {}",
                    self.path.display(),
                    self.backup_path.display()
                );
            }
        }

        let yaml = serde_yaml::to_string(state)?;
        fs::write(&self.tmp_path, yaml).map_err(|source| StoreError::Io {
            path: self.tmp_path.clone(),
            source,
        })?;
        fs::rename(&self.tmp_path, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        info!("saved host state to {}", self.path.display());
        Ok(())
    }

    /// Load the persisted state, falling back to the backup. Returns
    /// `None` when neither file is usable (start fresh).
    pub fn load(&self) -> Option<StateFile> {
        if let Some(state) = Self::try_load(&self.path) {
            return Some(state);
        }

        warn!(
            "primary state file {} not usable, trying backup {}",
            self.path.display(),
            self.backup_path.display()
        );
        if let Some(state) = Self::try_load(&self.backup_path) {
            // Restore the primary so the next save has a clean base.
            match fs::copy(&self.backup_path, &self.path) {
                Ok(_) => info!(
                    "restored primary state file from backup {}",
                    self.backup_path.display()
                ),
                Err(err) => warn!("could not restore primary from backup: {err}"),
            }
            return Some(state);
        }

        info!("no persisted state found, starting fresh");
        None
    }

    /// Remove primary, backup and temp files (if present).
    pub fn delete(&self) {
        for path in [&self.path, &self.backup_path, &self.tmp_path] {
            if let Err(err) = fs::remove_file(path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!("could not remove {}: {err}", path.display());
                }
            }
        }
    }

    fn try_load(path: &Path) -> Option<StateFile> {
        if !path.is_file() {
            return None;
        }
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) => {
                warn!("failed to read {}: {err}", path.display());
                return None;
            }
        };
        match serde_yaml::from_str::<StateFile>(&data) {
            Ok(state) => Some(state),
            Err(err) => {
                warn!("failed to parse {}: {err}", path.display());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::HostRecord;

    fn sample_state(name: &str) -> StateFile {
        StateFile {
            vdc_host: HostRecord {
                dsuid: "00".repeat(17),
                mac: Some("AA:BB:CC:DD:EE:FF".into()),
                port: Some(8444),
                name: Some(name.into()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = PropertyStore::new(dir.path().join("state.yaml"));

        store.save(&sample_state("first")).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.vdc_host.name.as_deref(), Some("first"));
        assert!(!store.backup_path().exists());

        // Second save creates the backup of the first.
        store.save(&sample_state("second")).unwrap();
        assert!(store.backup_path().exists());
        assert_eq!(store.load().unwrap().vdc_host.name.as_deref(), Some("second"));
    }

    #[test]
    fn corrupt_primary_falls_back_to_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = PropertyStore::new(dir.path().join("state.yaml"));

        store.save(&sample_state("one")).unwrap();
        store.save(&sample_state("two")).unwrap();
        fs::write(store.path(), ":#( not yaml [").unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.vdc_host.name.as_deref(), Some("one"));
        // Primary got restored from the backup.
        let restored = fs::read_to_string(store.path()).unwrap();
        assert!(restored.contains("one"));
    }

    #[test]
    fn missing_files_mean_fresh_start() {
        let dir = tempfile::tempdir().unwrap();
        let store = PropertyStore::new(dir.path().join("state.yaml"));
        assert!(store.load().is_none());
    }

    #[test]
    fn delete_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = PropertyStore::new(dir.path().join("state.yaml"));
        store.save(&sample_state("x")).unwrap();
        store.save(&sample_state("y")).unwrap();
        store.delete();
        assert!(!store.path().exists());
        assert!(!store.backup_path().exists());
    }
}
