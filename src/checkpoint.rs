//! Checkpoint backup tree scanner.
//!
//! Layout:
//!   <root>/0x<program id> <title name>/<backup name>/<save files...>
//!
//! Backups are named by date (e.g. `20240102-153000`), so the greatest name
//! is the newest backup. File mtimes are not consulted.

use anyhow::{Context, Result};
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};

use crate::util::parse_hex_u64;

/// One title folder in the backup tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTitle {
    pub program_id: u64,
    pub name: String,
    pub path: PathBuf,
    /// Newest backup folder; None if the title folder holds no backups.
    pub latest_backup: Option<PathBuf>,
}

/// "0x0100F2C0115B6000 Some Game" → (0x0100F2C0115B6000, "Some Game").
pub fn parse_title_folder(name: &str) -> Option<(u64, String)> {
    let mut parts = name.splitn(2, char::is_whitespace);
    let id = parts.next()?;
    let hex = id.strip_prefix("0x").or_else(|| id.strip_prefix("0X"))?;
    let program_id = parse_hex_u64(hex).ok()?;
    let title = parts.next().unwrap_or("").trim().to_string();
    Some((program_id, title))
}

fn subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let rd = fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
    for e in rd {
        let e = e.with_context(|| format!("read dir entry in {}", dir.display()))?;
        if e.file_type()?.is_dir() {
            out.push(e.path());
        }
    }
    out.sort();
    Ok(out)
}

/// Greatest-named backup folder inside a title folder.
pub fn latest_backup(title_dir: &Path) -> Result<Option<PathBuf>> {
    Ok(subdirs(title_dir)?.into_iter().max_by(|a, b| a.file_name().cmp(&b.file_name())))
}

/// All parseable title folders under `root`, ordered by folder name.
pub fn scan_checkpoint(root: &Path) -> Result<Vec<BackupTitle>> {
    let mut titles = Vec::new();
    for path in subdirs(root)? {
        let folder = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some((program_id, name)) = parse_title_folder(&folder) else {
            warn!("checkpoint: skipping {:?} (not `0x<program id> <name>`)", folder);
            continue;
        };
        let latest = latest_backup(&path)?;
        titles.push(BackupTitle {
            program_id,
            name,
            path,
            latest_backup: latest,
        });
    }
    Ok(titles)
}
