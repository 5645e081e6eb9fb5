//! Import run: Checkpoint backups → save directory + index archive.
//!
//! Порядок:
//! 1) exclusive lock on the archive (shared for dry runs, none if the index
//!    directory does not exist yet)
//! 2) load archive (decode, or empty if the file is absent)
//! 3) per title: find record, else adopt a folder whose ExtraData0 names the
//!    title, else allocate the next user save-data id; write ExtraData0 for
//!    new folders, then copy the newest backup
//! 4) write the archive once, atomically
//!
//! Any error before step 4 leaves the archive file untouched. Copied save
//! files from an aborted run are picked up again by adoption on the next run.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::checkpoint::{scan_checkpoint, BackupTitle};
use crate::config::MigrateConfig;
use crate::extradata::{build_extra_data, write_extra_data};
use crate::index::{IndexManager, SaveIdentity, SaveValue};
use crate::lock::{acquire_exclusive_lock, try_shared_lock_if_present};
use crate::savedir::{committed_dir, copy_tree, find_folders_by_program_id, next_save_data_id, save_folder};
use crate::store::{load_archive, write_archive_atomic, Origin};
use crate::util::now_secs;

#[derive(Debug, Clone)]
pub struct MigratePaths {
    /// Checkpoint backup root (title folders).
    pub checkpoint: PathBuf,
    /// Emulator user save directory (`{:016x}` folders).
    pub saves: PathBuf,
    /// Index archive file.
    pub index: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Index already had a record; its folder was reused.
    Existing,
    /// No record, but a folder's ExtraData0 named the title; record added for it.
    Adopted,
    /// New folder and new record.
    Created,
    /// Title folder without backups.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct TitleReport {
    pub program_id: String,
    pub name: String,
    pub outcome: Outcome,
    pub save_data_id: Option<String>,
    pub backup: Option<String>,
    pub files_copied: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub index: String,
    pub fresh_archive: bool,
    pub dry_run: bool,
    pub entries_before: usize,
    pub entries_after: usize,
    pub archive_written: bool,
    pub titles: Vec<TitleReport>,
}

impl MigrationReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.titles.iter().filter(|t| t.outcome == outcome).count()
    }
}

pub fn run(cfg: &MigrateConfig, paths: &MigratePaths) -> Result<MigrationReport> {
    info!(
        "import: start, checkpoint={}, saves={}, index={}, user={}, dry_run={}",
        paths.checkpoint.display(),
        paths.saves.display(),
        paths.index.display(),
        cfg.user_id,
        cfg.dry_run
    );

    // dry runs create nothing, not even the index directory
    let _lock = if cfg.dry_run {
        try_shared_lock_if_present(&paths.index)?
    } else {
        Some(acquire_exclusive_lock(&paths.index)?)
    };

    let titles = scan_checkpoint(&paths.checkpoint)
        .with_context(|| format!("scan checkpoint {}", paths.checkpoint.display()))?;
    let (mut archive, origin) = load_archive(&paths.index)?;
    let entries_before = archive.len();

    let mut reports = Vec::with_capacity(titles.len());
    {
        let mut idx = IndexManager::new(&mut archive);
        let mut next_id = next_save_data_id(&paths.saves, idx.max_user_save_data_id())?;
        let now = now_secs();

        for t in &titles {
            let r = import_title(cfg, &paths.saves, &mut idx, &mut next_id, now, t)
                .with_context(|| format!("import {:016x} ({})", t.program_id, t.name))?;
            reports.push(r);
        }
    }

    let changed = archive.len() != entries_before;
    let archive_written = !cfg.dry_run && (changed || origin == Origin::Fresh);
    if archive_written {
        write_archive_atomic(&paths.index, &archive)?;
    }

    let report = MigrationReport {
        index: paths.index.display().to_string(),
        fresh_archive: origin == Origin::Fresh,
        dry_run: cfg.dry_run,
        entries_before,
        entries_after: archive.len(),
        archive_written,
        titles: reports,
    };
    info!(
        "import: done, titles={}, created={}, adopted={}, existing={}, skipped={}, entries {} -> {}",
        report.titles.len(),
        report.count(Outcome::Created),
        report.count(Outcome::Adopted),
        report.count(Outcome::Existing),
        report.count(Outcome::Skipped),
        report.entries_before,
        report.entries_after
    );
    Ok(report)
}

fn import_title(
    cfg: &MigrateConfig,
    saves: &Path,
    idx: &mut IndexManager<'_>,
    next_id: &mut u64,
    now: u64,
    t: &BackupTitle,
) -> Result<TitleReport> {
    let mut report = TitleReport {
        program_id: format!("{:016x}", t.program_id),
        name: t.name.clone(),
        outcome: Outcome::Skipped,
        save_data_id: None,
        backup: None,
        files_copied: 0,
    };

    let Some(backup) = t.latest_backup.as_ref() else {
        warn!("import: {:016x} ({}) has no backups, skipping", t.program_id, t.name);
        return Ok(report);
    };
    report.backup = backup.file_name().map(|n| n.to_string_lossy().into_owned());

    let id = SaveIdentity::account(t.program_id, cfg.user_id);
    let (save_data_id, outcome) = match idx.value_of(&id) {
        Some(v) => (v.save_data_id, Outcome::Existing),
        None => {
            let (sid, outcome) = match adoptable_folder(saves, idx, t.program_id)? {
                Some(sid) => (sid, Outcome::Adopted),
                None => {
                    let sid = *next_id;
                    *next_id += 1;
                    (sid, Outcome::Created)
                }
            };
            idx.insert_new(&id, &cfg.attributes_for(sid, now))?;
            (sid, outcome)
        }
    };
    report.outcome = outcome;
    report.save_data_id = Some(format!("{:016x}", save_data_id));

    if !cfg.dry_run {
        // ExtraData0 first: a folder left by an interrupted copy is still adoptable
        if outcome == Outcome::Created && cfg.write_extra_data {
            let value = idx
                .value_of(&id)
                .unwrap_or_else(|| SaveValue::fresh(&cfg.attributes_for(save_data_id, now)));
            let image = build_extra_data(&id, &value, idx.archive().layout());
            write_extra_data(&save_folder(saves, save_data_id), &image)?;
        }
        report.files_copied = copy_tree(backup, &committed_dir(saves, save_data_id))?;
    }

    info!(
        "import: {:016x} ({}) -> {:016x} [{:?}], backup={}, files={}",
        t.program_id,
        t.name,
        save_data_id,
        outcome,
        report.backup.as_deref().unwrap_or("-"),
        report.files_copied
    );
    Ok(report)
}

/// First folder that names `program_id` in its ExtraData0 and that no
/// record in the index points at yet.
fn adoptable_folder(saves: &Path, idx: &IndexManager<'_>, program_id: u64) -> Result<Option<u64>> {
    for sid in find_folders_by_program_id(saves, program_id)? {
        if idx.owners_of(sid).is_empty() {
            return Ok(Some(sid));
        }
    }
    Ok(None)
}
