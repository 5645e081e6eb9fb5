use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use savebridge::archive::decode;
use savebridge::cli::check_archive;
use savebridge::consts::{EXTRA_DATA_FILE, EXTRA_DATA_SIZE, FRESH_COMMIT_ID};
use savebridge::extradata::read_program_id;
use savebridge::index::{IndexManager, SaveAttributes, SaveDataType, SaveIdentity, UserId};
use savebridge::lock::{lock_file_path, try_acquire_exclusive_lock};
use savebridge::migrate::{run, MigratePaths, Outcome};
use savebridge::{write_archive_atomic, Archive, ArchiveError, MigrateConfig};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("savebridge-{prefix}-{pid}-{t}-{id}"))
}

struct Fixture {
    root: PathBuf,
    paths: MigratePaths,
}

impl Fixture {
    fn new(prefix: &str) -> Result<Self> {
        let root = unique_root(prefix);
        let paths = MigratePaths {
            checkpoint: root.join("checkpoint"),
            saves: root.join("user/save"),
            index: root.join("system/save/8000000000000000/0/imkvdb.arc"),
        };
        fs::create_dir_all(&paths.checkpoint)?;
        fs::create_dir_all(&paths.saves)?;
        Ok(Self { root, paths })
    }

    /// <checkpoint>/<title>/<backup>/<file> = contents
    fn backup(&self, title: &str, backup: &str, file: &str, contents: &[u8]) -> Result<()> {
        let p = self.paths.checkpoint.join(title).join(backup).join(file);
        fs::create_dir_all(p.parent().unwrap())?;
        fs::write(p, contents)?;
        Ok(())
    }

    fn save_file(&self, save_data_id: u64, file: &str) -> PathBuf {
        self.paths
            .saves
            .join(format!("{:016x}", save_data_id))
            .join("0")
            .join(file)
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn cfg() -> MigrateConfig {
    MigrateConfig::default().with_user_id(UserId::new(1, 0))
}

const GAME_A: u64 = 0x0100_F2C0_115B_6000;
const GAME_B: u64 = 0x0100_6A80_0016_E000;

#[test]
fn fresh_install_creates_folders_extradata_and_index() -> Result<()> {
    let fx = Fixture::new("fresh")?;
    fx.backup("0x0100F2C0115B6000 Game A", "20240101-100000", "old.bin", b"old")?;
    fx.backup("0x0100F2C0115B6000 Game A", "20240301-100000", "progress.bin", b"newest")?;
    fx.backup("0x01006A800016E000 Game B", "20240202-090000", "sub/slot1", b"b1")?;
    fs::create_dir_all(fx.paths.checkpoint.join("not a title"))?;

    let report = run(&cfg(), &fx.paths)?;
    assert!(report.fresh_archive);
    assert!(report.archive_written);
    assert_eq!(report.count(Outcome::Created), 2);
    assert_eq!(report.entries_before, 0);
    assert_eq!(report.entries_after, 2);

    // titles are processed in folder-name order: B (0x01006A..) before A (0x0100F2..)
    assert_eq!(fs::read(fx.save_file(1, "sub/slot1"))?, b"b1");
    assert_eq!(fs::read(fx.save_file(2, "progress.bin"))?, b"newest");
    assert!(!fx.save_file(2, "old.bin").exists(), "only the newest backup is copied");

    let folder_a = fx.paths.saves.join("0000000000000002");
    assert_eq!(read_program_id(&folder_a)?, Some(GAME_A));
    assert_eq!(fs::metadata(folder_a.join(EXTRA_DATA_FILE))?.len(), EXTRA_DATA_SIZE as u64);

    let mut archive = decode(&fs::read(&fx.paths.index)?)?;
    let idx = IndexManager::new(&mut archive);
    let va = idx
        .value_of(&SaveIdentity::account(GAME_A, UserId::new(1, 0)))
        .expect("A indexed");
    let vb = idx
        .value_of(&SaveIdentity::account(GAME_B, UserId::new(1, 0)))
        .expect("B indexed");
    assert_eq!((vb.save_data_id, va.save_data_id), (1, 2));
    assert_eq!(va.commit_id, FRESH_COMMIT_ID);
    assert_eq!(va.journal_size, 0x10);
    Ok(())
}

#[test]
fn second_run_is_idempotent_and_refreshes_files() -> Result<()> {
    let fx = Fixture::new("idem")?;
    fx.backup("0x0100F2C0115B6000 Game A", "20240101-100000", "save.bin", b"v1")?;

    let first = run(&cfg(), &fx.paths)?;
    assert_eq!(first.count(Outcome::Created), 1);
    let bytes_after_first = fs::read(&fx.paths.index)?;

    fx.backup("0x0100F2C0115B6000 Game A", "20240102-100000", "save.bin", b"v2")?;
    let second = run(&cfg(), &fx.paths)?;
    assert_eq!(second.count(Outcome::Existing), 1);
    assert_eq!(second.entries_before, second.entries_after);
    assert!(!second.archive_written, "unchanged archive is not rewritten");
    assert_eq!(fs::read(&fx.paths.index)?, bytes_after_first);
    assert_eq!(fs::read(fx.save_file(1, "save.bin"))?, b"v2");
    Ok(())
}

#[test]
fn existing_archive_record_is_untouched_and_new_title_appended() -> Result<()> {
    let fx = Fixture::new("mixed")?;
    fx.backup("0x0100F2C0115B6000 Game A", "1", "a", b"a")?;
    run(&cfg(), &fx.paths)?;
    let before = decode(&fs::read(&fx.paths.index)?)?;

    fx.backup("0x01006A800016E000 Game B", "1", "b", b"b")?;
    let report = run(&cfg(), &fx.paths)?;
    assert_eq!(report.count(Outcome::Existing), 1);
    assert_eq!(report.count(Outcome::Created), 1);

    let after = decode(&fs::read(&fx.paths.index)?)?;
    assert_eq!(after.len(), 2);
    assert_eq!(after.entries()[0], before.entries()[0]);
    assert_eq!(fs::read(fx.save_file(2, "b"))?, b"b");
    Ok(())
}

#[test]
fn corrupt_archive_aborts_without_writing_or_copying() -> Result<()> {
    let fx = Fixture::new("corrupt")?;
    fx.backup("0x0100F2C0115B6000 Game A", "1", "a", b"a")?;
    fs::create_dir_all(fx.paths.index.parent().unwrap())?;
    let garbage = b"IMKV\0\0\0\0\x05\0\0\0short".to_vec();
    fs::write(&fx.paths.index, &garbage)?;

    let err = run(&cfg(), &fx.paths).unwrap_err();
    let arc = err
        .downcast_ref::<ArchiveError>()
        .expect("archive error in chain");
    assert!(arc.is_corrupt());

    assert_eq!(fs::read(&fx.paths.index)?, garbage, "original file left as is");
    assert!(!fx.save_file(1, "a").exists(), "nothing copied");
    Ok(())
}

#[test]
fn orphan_folder_with_matching_extradata_is_adopted() -> Result<()> {
    let fx = Fixture::new("adopt")?;
    fx.backup("0x0100F2C0115B6000 Game A", "1", "a", b"a")?;

    // first run writes folder 1 + ExtraData0; then the index is lost
    run(&cfg(), &fx.paths)?;
    fs::remove_file(&fx.paths.index)?;
    // unrelated folder with a higher id
    fs::create_dir_all(fx.paths.saves.join("0000000000000005"))?;

    let report = run(&cfg(), &fx.paths)?;
    assert_eq!(report.count(Outcome::Adopted), 1);
    assert_eq!(report.titles[0].save_data_id.as_deref(), Some("0000000000000001"));

    let mut archive = decode(&fs::read(&fx.paths.index)?)?;
    let idx = IndexManager::new(&mut archive);
    let v = idx
        .value_of(&SaveIdentity::account(GAME_A, UserId::new(1, 0)))
        .expect("adopted record");
    assert_eq!(v.save_data_id, 1);
    Ok(())
}

#[test]
fn new_ids_skip_folders_already_on_disk() -> Result<()> {
    let fx = Fixture::new("nextid")?;
    fs::create_dir_all(fx.paths.saves.join("0000000000000009"))?;
    fs::create_dir_all(fx.paths.saves.join("not-a-save"))?;
    fx.backup("0x0100F2C0115B6000 Game A", "1", "a", b"a")?;

    let report = run(&cfg(), &fx.paths)?;
    assert_eq!(report.titles[0].save_data_id.as_deref(), Some("000000000000000a"));
    assert!(fx.save_file(10, "a").exists());
    Ok(())
}

#[test]
fn dry_run_copies_and_writes_nothing() -> Result<()> {
    let fx = Fixture::new("dry")?;
    fx.backup("0x0100F2C0115B6000 Game A", "1", "a", b"a")?;

    let report = run(&cfg().with_dry_run(true), &fx.paths)?;
    assert!(report.dry_run);
    assert!(!report.archive_written);
    assert_eq!(report.count(Outcome::Created), 1);
    assert_eq!(report.entries_after, 1);
    assert!(!fx.paths.index.exists());
    assert!(
        !fx.root.join("system").exists(),
        "no index directory or lock file is created"
    );
    assert!(!fx.save_file(1, "a").exists());
    Ok(())
}

#[test]
fn title_without_backups_is_skipped() -> Result<()> {
    let fx = Fixture::new("skip")?;
    fs::create_dir_all(fx.paths.checkpoint.join("0x0100F2C0115B6000 Game A"))?;

    let report = run(&cfg(), &fx.paths)?;
    assert_eq!(report.count(Outcome::Skipped), 1);
    assert_eq!(report.entries_after, 0);
    // fresh archive is still written so the emulator finds a valid file
    assert_eq!(decode(&fs::read(&fx.paths.index)?)?.len(), 0);
    Ok(())
}

#[test]
fn exclusive_lock_blocks_second_writer() -> Result<()> {
    let fx = Fixture::new("lock")?;
    let guard = try_acquire_exclusive_lock(&fx.paths.index)?;
    assert_eq!(guard.path(), lock_file_path(&fx.paths.index).as_path());
    assert!(try_acquire_exclusive_lock(&fx.paths.index).is_err());
    drop(guard);
    assert!(try_acquire_exclusive_lock(&fx.paths.index).is_ok());
    Ok(())
}

#[test]
fn imported_archive_passes_check() -> Result<()> {
    let fx = Fixture::new("check")?;
    fx.backup("0x0100F2C0115B6000 Game A", "1", "a", b"a")?;
    fx.backup("0x01006A800016E000 Game B", "1", "b", b"b")?;
    run(&cfg(), &fx.paths)?;

    let rep = check_archive(&fs::read(&fx.paths.index)?)?;
    assert!(rep.ok());
    assert_eq!(rep.entries, 2);
    assert_eq!(rep.bytes, 12 + 2 * 140);
    assert_eq!(rep.unknown_keys, 0);
    Ok(())
}

#[test]
fn system_save_ids_do_not_pick_user_folder_names() -> Result<()> {
    let fx = Fixture::new("sysid")?;
    // system index as shipped: one system save with an id from the 0x8000.. range
    let mut archive = Archive::new_empty(0)?;
    {
        let mut idx = IndexManager::new(&mut archive);
        let sys = SaveIdentity {
            save_type: SaveDataType::System,
            static_save_data_id: 0x8000_0000_0000_0010,
            ..SaveIdentity::account(0, UserId::default())
        };
        idx.insert_new(
            &sys,
            &SaveAttributes {
                save_data_id: 0x8000_0000_0000_0010,
                space_id: 0,
                ..SaveAttributes::default()
            },
        )?;
    }
    write_archive_atomic(&fx.paths.index, &archive)?;
    fx.backup("0x0100F2C0115B6000 Game A", "1", "a", b"a")?;

    let report = run(&cfg(), &fx.paths)?;
    assert_eq!(report.titles[0].save_data_id.as_deref(), Some("0000000000000001"));
    assert!(fx.save_file(1, "a").exists());
    assert!(!fx.paths.saves.join("8000000000000011").exists());
    assert_eq!(report.entries_after, 2);
    Ok(())
}

#[test]
fn user_records_in_index_still_advance_next_id() -> Result<()> {
    let fx = Fixture::new("userid")?;
    fx.backup("0x0100F2C0115B6000 Game A", "1", "a", b"a")?;
    run(&cfg(), &fx.paths)?;
    // folder 1 is gone from disk, but the index still hands id 1 to Game A
    fs::remove_dir_all(fx.paths.saves.join("0000000000000001"))?;

    fx.backup("0x01006A800016E000 Game B", "1", "b", b"b")?;
    let report = run(&cfg(), &fx.paths)?;
    let b = report
        .titles
        .iter()
        .find(|t| t.outcome == Outcome::Created)
        .expect("B created");
    assert_eq!(b.save_data_id.as_deref(), Some("0000000000000002"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn interrupted_copy_leaves_an_adoptable_folder() -> Result<()> {
    let fx = Fixture::new("interrupt")?;
    fx.backup("0x0100F2C0115B6000 Game A", "1", "a", b"a")?;
    // dangling symlink: copy_tree fails on it after the folder was created
    let broken = fx
        .paths
        .checkpoint
        .join("0x0100F2C0115B6000 Game A/1/zz-broken");
    std::os::unix::fs::symlink(fx.root.join("missing-target"), &broken)?;

    assert!(run(&cfg(), &fx.paths).is_err());
    assert!(!fx.paths.index.exists(), "failed run writes no archive");
    let folder = fx.paths.saves.join("0000000000000001");
    assert_eq!(read_program_id(&folder)?, Some(GAME_A));

    fs::remove_file(&broken)?;
    let report = run(&cfg(), &fx.paths)?;
    assert_eq!(report.count(Outcome::Adopted), 1);
    assert_eq!(report.titles[0].save_data_id.as_deref(), Some("0000000000000001"));
    assert_eq!(fs::read(fx.save_file(1, "a"))?, b"a");
    Ok(())
}
