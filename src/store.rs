// src/store.rs: archive file boundary
//
// Политика:
// - Наличие файла проверяется один раз: нет файла → пустой архив, есть → decode.
// - Атомарная запись: tmp+rename, затем fsync родительского каталога (best‑effort на Windows).
// - Ошибка decode никогда не приводит к записи: вызывающий просто не доходит до write.

use anyhow::{Context, Result};
use log::{debug, info};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
#[cfg(unix)]
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::archive::Archive;
use crate::consts::FORMAT_VERSION_V0;

/// Where the archive came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Decoded from an existing file.
    Existing,
    /// No file on disk; started from an empty archive.
    Fresh,
}

#[inline]
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(unix)]
fn fsync_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
    }
    Ok(())
}
#[cfg(not(unix))]
fn fsync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Read the archive file, or None if it does not exist.
pub fn read_archive_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(b) => Ok(Some(b)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("read archive {}", path.display())),
    }
}

/// Decode the archive at `path`, or start an empty one if the file is absent.
pub fn load_archive(path: &Path) -> Result<(Archive, Origin)> {
    match read_archive_bytes(path)? {
        Some(bytes) => {
            let a = Archive::decode(&bytes)
                .with_context(|| format!("decode archive {}", path.display()))?;
            debug!("store: loaded {} ({} entries)", path.display(), a.len());
            Ok((a, Origin::Existing))
        }
        None => {
            info!("store: {} not found, starting an empty archive", path.display());
            Ok((Archive::new_empty(FORMAT_VERSION_V0)?, Origin::Fresh))
        }
    }
}

/// Encode and replace the archive at `path` via tmp+rename. Until the rename
/// lands the old file stays intact.
pub fn write_archive_atomic(path: &Path, archive: &Archive) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
    }

    let bytes = archive.encode();
    let tmp = tmp_path(path);
    let _ = fs::remove_file(&tmp); // best‑effort

    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)
        .with_context(|| format!("open archive tmp {}", tmp.display()))?;
    f.write_all(&bytes)
        .with_context(|| format!("write archive tmp {}", tmp.display()))?;
    f.sync_all()?; // flush tmp to disk
    drop(f);

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    let _ = fsync_dir(path);

    debug!(
        "store: wrote {} ({} entries, {} B)",
        path.display(),
        archive.len(),
        bytes.len()
    );
    Ok(())
}

/// Write an empty archive unless a file already exists. Returns true if created.
pub fn init_archive(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    write_archive_atomic(path, &Archive::new_empty(FORMAT_VERSION_V0)?)?;
    Ok(true)
}
