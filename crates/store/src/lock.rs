use crate::{Result, StoreError};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE_NAME: &str = "codesearch.lock";

/// Advisory lock marking a process as the single writer of an index directory.
pub(crate) struct DirectoryLock {
    file: File,
    path: PathBuf,
}

impl DirectoryLock {
    pub(crate) fn acquire(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| StoreError::Other(format!("open index lock {}: {err}", path.display())))?;
        file.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(dir.display().to_string()))?;
        log::debug!("Acquired index lock {}", path.display());
        Ok(Self { file, path })
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            log::warn!("Failed to release index lock {}: {err}", self.path.display());
        }
    }
}
