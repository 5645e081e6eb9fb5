use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::archive::{Archive, Record};
use crate::config::MigrateConfig;
use crate::index::{SaveIdentity, SaveValue};
use crate::lock::{acquire_exclusive_lock, try_shared_lock_if_present};
use crate::migrate::{run as run_import, MigratePaths, Outcome};
use crate::store::{init_archive, read_archive_bytes};
use crate::util::{hex_dump, parse_int_i64, to_hex};

#[derive(Parser, Debug)]
#[command(
    name = "savebridge",
    version,
    about = "Import Checkpoint save backups into an emulator save directory and its IMKV index",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Import the newest backup of every title into the save directory
    ///
    /// Пример:
    ///   savebridge import --checkpoint ./Checkpoint/saves \
    ///       --saves ./bis/user/save \
    ///       --index ./bis/system/save/8000000000000000/0/imkvdb.arc
    Import {
        /// Checkpoint backup root (folders named `0x<program id> <name>`)
        #[arg(long, short = 'c')]
        checkpoint: PathBuf,
        /// Emulator user save directory
        #[arg(long, short = 's')]
        saves: PathBuf,
        /// Index archive file (created if absent)
        #[arg(long, short = 'i')]
        index: PathBuf,
        /// Profile id, 32 hex digits (overrides SAVEBRIDGE_USER_ID)
        #[arg(long)]
        user_id: Option<String>,
        /// Data size budget for new records (decimal or 0x-hex)
        #[arg(long, value_parser = parse_size)]
        data_size: Option<i64>,
        /// Journal size for new records (decimal or 0x-hex)
        #[arg(long, value_parser = parse_size)]
        journal_size: Option<i64>,
        /// Flags for new records (decimal or 0x-hex, overrides SAVEBRIDGE_FLAGS)
        #[arg(long, value_parser = parse_flags)]
        flags: Option<u32>,
        /// Space id for new records (overrides SAVEBRIDGE_SPACE_ID)
        #[arg(long)]
        space_id: Option<u8>,
        /// Do not write ExtraData0 into new save folders
        #[arg(long, default_value_t = false)]
        no_extra_data: bool,
        /// Resolve folders and records but copy/write nothing
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// JSON report
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print every record of an index archive
    List {
        #[arg(long, short = 'i')]
        index: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Also hex-dump key/value blobs
        #[arg(long, default_value_t = false)]
        raw: bool,
    },
    /// Write an empty index archive if none exists
    Init {
        #[arg(long, short = 'i')]
        index: PathBuf,
    },
    /// Decode an archive (rejects duplicate keys) and verify byte-exact re-encode
    Check {
        #[arg(long, short = 'i')]
        index: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn parse_size(s: &str) -> Result<i64, String> {
    parse_int_i64(s).map_err(|e| e.to_string())
}

fn parse_flags(s: &str) -> Result<u32, String> {
    let n = parse_int_i64(s).map_err(|e| e.to_string())?;
    u32::try_from(n).map_err(|_| format!("flags out of range: {}", s))
}

/// One record, decoded for display.
#[derive(Debug, Serialize)]
pub struct RecordView {
    pub slot: usize,
    pub program_id: Option<String>,
    pub user_id: Option<String>,
    pub save_type: Option<&'static str>,
    pub rank: Option<u8>,
    pub index: Option<u16>,
    pub save_data_id: Option<String>,
    pub data_size: Option<i64>,
    pub journal_size: Option<i64>,
    pub flags: Option<u32>,
    pub space_id: Option<u8>,
    pub state: Option<u8>,
    pub commit_id: Option<u64>,
    pub timestamp: Option<u64>,
    pub key_hex: String,
}

impl RecordView {
    pub fn new(slot: usize, r: &Record, archive: &Archive) -> Self {
        let layout = archive.layout();
        let id = SaveIdentity::from_key(r.key(), layout);
        let v = SaveValue::from_value(r.value(), layout);
        Self {
            slot,
            program_id: id.map(|i| format!("{:016x}", i.program_id)),
            user_id: id.map(|i| i.user_id.to_string()),
            save_type: id.map(|i| i.save_type.name()),
            rank: id.map(|i| i.rank.as_u8()),
            index: id.map(|i| i.index),
            save_data_id: v.map(|v| format!("{:016x}", v.save_data_id)),
            data_size: v.map(|v| v.data_size),
            journal_size: v.map(|v| v.journal_size),
            flags: v.map(|v| v.flags),
            space_id: v.map(|v| v.space_id),
            state: v.map(|v| v.state),
            commit_id: v.map(|v| v.commit_id),
            timestamp: v.map(|v| v.timestamp),
            key_hex: to_hex(r.key()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub format_version: u32,
    pub entries: usize,
    pub bytes: usize,
    pub roundtrip_exact: bool,
    pub unknown_keys: usize,
}

impl CheckReport {
    pub fn ok(&self) -> bool {
        self.roundtrip_exact
    }
}

/// Decode `bytes` (which already rejects duplicate keys) and verify exact
/// re-encode. Keys this build cannot parse are counted, not rejected.
pub fn check_archive(bytes: &[u8]) -> Result<CheckReport> {
    let a = Archive::decode(bytes)?;
    let roundtrip_exact = a.encode() == bytes;
    let unknown_keys = a
        .entries()
        .iter()
        .filter(|r| SaveIdentity::from_key(r.key(), a.layout()).is_none())
        .count();
    Ok(CheckReport {
        format_version: a.format_version(),
        entries: a.len(),
        bytes: bytes.len(),
        roundtrip_exact,
        unknown_keys,
    })
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Import {
            checkpoint,
            saves,
            index,
            user_id,
            data_size,
            journal_size,
            flags,
            space_id,
            no_extra_data,
            dry_run,
            json,
        } => {
            let mut cfg = MigrateConfig::from_env();
            if let Some(u) = user_id {
                cfg = cfg.with_user_id_str(&u)?;
            }
            if let Some(n) = data_size {
                cfg = cfg.with_data_size(n);
            }
            if let Some(n) = journal_size {
                cfg = cfg.with_journal_size(n);
            }
            if let Some(f) = flags {
                cfg = cfg.with_flags(f);
            }
            if let Some(sp) = space_id {
                cfg = cfg.with_space_id(sp);
            }
            if no_extra_data {
                cfg = cfg.with_extra_data(false);
            }
            if dry_run {
                cfg = cfg.with_dry_run(true);
            }

            let paths = MigratePaths {
                checkpoint,
                saves,
                index,
            };
            let report = run_import(&cfg, &paths)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for t in &report.titles {
                    println!(
                        "{:<8} {} {:<40} -> {}",
                        format!("{:?}", t.outcome).to_lowercase(),
                        t.program_id,
                        t.name,
                        t.save_data_id.as_deref().unwrap_or("-")
                    );
                }
                println!(
                    "{} title(s): {} created, {} adopted, {} existing, {} skipped; index {} -> {} entries{}",
                    report.titles.len(),
                    report.count(Outcome::Created),
                    report.count(Outcome::Adopted),
                    report.count(Outcome::Existing),
                    report.count(Outcome::Skipped),
                    report.entries_before,
                    report.entries_after,
                    if report.dry_run { " (dry run)" } else { "" }
                );
            }
        }
        Cmd::List { index, json, raw } => {
            let _lock = try_shared_lock_if_present(&index)?;
            let bytes = read_archive_bytes(&index)?
                .ok_or_else(|| anyhow!("index archive {} not found", index.display()))?;
            let a = Archive::decode(&bytes)?;
            let views: Vec<RecordView> = a
                .entries()
                .iter()
                .enumerate()
                .map(|(i, r)| RecordView::new(i, r, &a))
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                println!(
                    "{}: version {}, {} entr{}",
                    index.display(),
                    a.format_version(),
                    a.len(),
                    if a.len() == 1 { "y" } else { "ies" }
                );
                for (v, r) in views.iter().zip(a.entries()) {
                    println!(
                        "  [{}] program={} user={} type={} -> save={} commit={}",
                        v.slot,
                        v.program_id.as_deref().unwrap_or("?"),
                        v.user_id.as_deref().unwrap_or("?"),
                        v.save_type.unwrap_or("?"),
                        v.save_data_id.as_deref().unwrap_or("?"),
                        v.commit_id.map(|c| c.to_string()).unwrap_or_else(|| "?".into())
                    );
                    if raw {
                        println!("  key:\n{}", hex_dump(r.key()));
                        println!("  value:\n{}", hex_dump(r.value()));
                    }
                }
            }
        }
        Cmd::Init { index } => {
            let _lock = acquire_exclusive_lock(&index)?;
            if init_archive(&index)? {
                println!("Initialized empty index archive at {}", index.display());
            } else {
                println!("Index archive already exists at {}", index.display());
            }
        }
        Cmd::Check { index, json } => {
            let _lock = try_shared_lock_if_present(&index)?;
            let bytes = read_archive_bytes(&index)?
                .ok_or_else(|| anyhow!("index archive {} not found", index.display()))?;
            let rep = check_archive(&bytes)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rep)?);
            } else {
                println!(
                    "version={} entries={} bytes={} roundtrip_exact={} unknown_keys={}",
                    rep.format_version,
                    rep.entries,
                    rep.bytes,
                    rep.roundtrip_exact,
                    rep.unknown_keys
                );
            }
            if !rep.ok() {
                return Err(anyhow!("index archive {} failed checks", index.display()));
            }
        }
    }
    Ok(())
}
