//! Emulator save directory: one folder per save-data id, named `{:016x}`,
//! committed files under `<folder>/0/`.

use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::consts::{FIRST_SAVE_DATA_ID, SAVE_COMMITTED_DIR};
use crate::extradata::read_program_id;

#[inline]
pub fn folder_name(save_data_id: u64) -> String {
    format!("{:016x}", save_data_id)
}

#[inline]
pub fn save_folder(root: &Path, save_data_id: u64) -> PathBuf {
    root.join(folder_name(save_data_id))
}

#[inline]
pub fn committed_dir(root: &Path, save_data_id: u64) -> PathBuf {
    save_folder(root, save_data_id).join(SAVE_COMMITTED_DIR)
}

fn parse_folder_name(name: &str) -> Option<u64> {
    if name.len() != 16 || !name.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(name, 16).ok()
}

/// Save-data ids of all `{:016x}` folders under `root`, ascending.
/// A missing root is an empty save directory.
pub fn list_save_ids(root: &Path) -> Result<Vec<u64>> {
    let rd = match fs::read_dir(root) {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("read dir {}", root.display())),
    };
    let mut ids = Vec::new();
    for e in rd {
        let e = e.with_context(|| format!("read dir entry in {}", root.display()))?;
        if !e.file_type()?.is_dir() {
            continue;
        }
        if let Some(id) = parse_folder_name(&e.file_name().to_string_lossy()) {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Next free id: one past the largest of the folders on disk and
/// `index_max` (user-space ids already handed out in the archive).
pub fn next_save_data_id(root: &Path, index_max: u64) -> Result<u64> {
    let disk_max = list_save_ids(root)?.last().copied().unwrap_or(0);
    let max = disk_max.max(index_max);
    Ok(if max == 0 { FIRST_SAVE_DATA_ID } else { max + 1 })
}

/// Folders whose ExtraData0 names `program_id`, ascending.
pub fn find_folders_by_program_id(root: &Path, program_id: u64) -> Result<Vec<u64>> {
    let mut out = Vec::new();
    for id in list_save_ids(root)? {
        if read_program_id(&save_folder(root, id))? == Some(program_id) {
            debug!("savedir: {:016x} belongs to {:016x}", id, program_id);
            out.push(id);
        }
    }
    Ok(out)
}

/// Recursively copy `src` into `dst` (created if needed), overwriting files.
/// Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<u64> {
    fs::create_dir_all(dst).with_context(|| format!("create dir {}", dst.display()))?;
    let mut files = 0u64;
    let rd = fs::read_dir(src).with_context(|| format!("read dir {}", src.display()))?;
    for e in rd {
        let e = e.with_context(|| format!("read dir entry in {}", src.display()))?;
        let from = e.path();
        let to = dst.join(e.file_name());
        if e.file_type()?.is_dir() {
            files += copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to)
                .with_context(|| format!("copy {} -> {}", from.display(), to.display()))?;
            files += 1;
        }
    }
    Ok(files)
}
