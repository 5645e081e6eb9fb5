//! Advisory lock around the index archive (fs2).
//!
//! Exclusive: an import run, which reads, extends and replaces the archive.
//! Shared: `list`/`check`, and dry runs.
//!
//! The lock lives in `<archive>.lock`, not in the archive itself: the archive
//! is replaced by rename, and a lock held on the old inode would guard nothing.
//! Released on Drop.
//!
//! Only exclusive locks create missing parent directories. A shared lock
//! needs the archive's directory to exist already (it still creates the
//! `.lock` file in it); see [`try_shared_lock_if_present`] for readers that
//! must not touch a missing tree.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

pub struct LockGuard {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // the fd is closed right after; the OS releases the lock either way
        let _ = FileExt::unlock(&self.file);
    }
}

/// `<archive>.lock`, next to the archive.
pub fn lock_file_path(archive: &Path) -> PathBuf {
    let mut name = OsString::from(archive.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

fn lock_with(archive: &Path, mode: LockMode, wait: bool) -> Result<LockGuard> {
    let path = lock_file_path(archive);
    if mode == LockMode::Exclusive {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create dir {}", dir.display()))?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;

    // fs2 methods spelled out: newer std has inherent File locks with other error types
    let res = match (mode, wait) {
        (LockMode::Shared, true) => FileExt::lock_shared(&file),
        (LockMode::Shared, false) => FileExt::try_lock_shared(&file),
        (LockMode::Exclusive, true) => FileExt::lock_exclusive(&file),
        (LockMode::Exclusive, false) => FileExt::try_lock_exclusive(&file),
    };
    res.with_context(|| {
        format!(
            "{:?} lock on {} ({})",
            mode,
            path.display(),
            if wait { "blocking" } else { "held by another process" }
        )
    })?;
    Ok(LockGuard { file, path, mode })
}

/// Blocks until acquired.
pub fn acquire_lock(archive: &Path, mode: LockMode) -> Result<LockGuard> {
    lock_with(archive, mode, true)
}

/// Returns Err at once if the lock is taken in a conflicting mode.
pub fn try_acquire_lock(archive: &Path, mode: LockMode) -> Result<LockGuard> {
    lock_with(archive, mode, false)
}

pub fn acquire_exclusive_lock(archive: &Path) -> Result<LockGuard> {
    acquire_lock(archive, LockMode::Exclusive)
}

pub fn try_acquire_exclusive_lock(archive: &Path) -> Result<LockGuard> {
    try_acquire_lock(archive, LockMode::Exclusive)
}

pub fn acquire_shared_lock(archive: &Path) -> Result<LockGuard> {
    acquire_lock(archive, LockMode::Shared)
}

/// Shared lock if the archive's directory exists, None otherwise. With no
/// directory there is no archive to protect, and nothing is created.
pub fn try_shared_lock_if_present(archive: &Path) -> Result<Option<LockGuard>> {
    let dir_exists = match archive.parent().filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => dir.is_dir(),
        None => true,
    };
    if !dir_exists {
        return Ok(None);
    }
    acquire_shared_lock(archive).map(Some)
}
