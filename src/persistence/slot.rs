//! On-disk save slot with backup rotation

use std::fs;
use std::path::{Path, PathBuf};

use super::snapshot::Snapshot;
use super::{PersistError, PersistResult};
use crate::sim::state::SessionState;

/// A single save file plus its `.tmp` and `.bak` siblings
#[derive(Debug, Clone)]
pub struct SaveSlot {
    path: PathBuf,
}

impl SaveSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        self.path.with_extension("bak")
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    pub fn exists(&self) -> bool {
        self.path.exists() || self.backup_path().exists()
    }

    /// Write a snapshot: tmp file first, then rotate the old save to backup
    pub fn write(&self, snapshot: &Snapshot) -> PersistResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, snapshot.encode())?;

        if self.path.exists() {
            fs::rename(&self.path, self.backup_path())?;
        }
        fs::rename(&tmp, &self.path)?;

        log::info!(
            "Saved level {} ({} blocks) to {}",
            snapshot.level,
            snapshot.blocks.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Read the primary save, falling back to the backup
    pub fn read(&self) -> PersistResult<Snapshot> {
        let primary = read_snapshot(&self.path);
        let err = match primary {
            Ok(snapshot) => return Ok(snapshot),
            Err(e) => e,
        };

        let backup = self.backup_path();
        if !backup.exists() {
            return Err(err);
        }
        log::warn!(
            "Save {} unreadable ({}), trying backup",
            self.path.display(),
            err
        );
        read_snapshot(&backup)
    }

    /// Snapshot the session and write it
    pub fn save(&self, state: &SessionState) -> PersistResult<()> {
        self.write(&Snapshot::capture(state))
    }

    /// Load into the session; on any failure the session is untouched
    pub fn load_into(&self, state: &mut SessionState) -> PersistResult<()> {
        let snapshot = self.read()?;
        snapshot.check_rules(&state.rules)?;
        snapshot.apply(state);
        log::info!(
            "Loaded level {} (score {}, lives {}) from {}",
            state.level,
            state.score,
            state.lives,
            self.path.display()
        );
        Ok(())
    }
}

fn read_snapshot(path: &Path) -> PersistResult<Snapshot> {
    let bytes = fs::read(path).map_err(PersistError::from)?;
    Snapshot::decode(&bytes)
}
