//! ExtraData0: per-folder descriptor the emulator keeps next to save files.
//!
//! Формат (512 B, LE):
//!   0x00 key blob (same bytes as the index key)
//!   0x40 owner_id u64 (= program id)
//!   0x48 timestamp u64
//!   0x50 flags u32
//!   0x58 data_size i64
//!   0x60 journal_size i64
//!   0x68 commit_id u64
//!   rest zero

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use crate::archive::ArchiveLayout;
use crate::consts::{EXTRA_DATA_FILE, EXTRA_DATA_SIZE};
use crate::index::{SaveIdentity, SaveValue};

const XD_OFF_KEY: usize = 0x00;
const XD_OFF_OWNER_ID: usize = 0x40;
const XD_OFF_TIMESTAMP: usize = 0x48;
const XD_OFF_FLAGS: usize = 0x50;
const XD_OFF_DATA_SIZE: usize = 0x58;
const XD_OFF_JOURNAL_SIZE: usize = 0x60;
const XD_OFF_COMMIT_ID: usize = 0x68;

/// Build the ExtraData0 image for a save folder.
pub fn build_extra_data(id: &SaveIdentity, value: &SaveValue, layout: &ArchiveLayout) -> Vec<u8> {
    let mut buf = vec![0u8; EXTRA_DATA_SIZE];
    let key = id.to_key(layout);
    buf[XD_OFF_KEY..XD_OFF_KEY + key.len()].copy_from_slice(&key);
    LittleEndian::write_u64(&mut buf[XD_OFF_OWNER_ID..XD_OFF_OWNER_ID + 8], id.program_id);
    LittleEndian::write_u64(&mut buf[XD_OFF_TIMESTAMP..XD_OFF_TIMESTAMP + 8], value.timestamp);
    LittleEndian::write_u32(&mut buf[XD_OFF_FLAGS..XD_OFF_FLAGS + 4], value.flags);
    LittleEndian::write_i64(&mut buf[XD_OFF_DATA_SIZE..XD_OFF_DATA_SIZE + 8], value.data_size);
    LittleEndian::write_i64(
        &mut buf[XD_OFF_JOURNAL_SIZE..XD_OFF_JOURNAL_SIZE + 8],
        value.journal_size,
    );
    LittleEndian::write_u64(&mut buf[XD_OFF_COMMIT_ID..XD_OFF_COMMIT_ID + 8], value.commit_id);
    buf
}

/// Write `<folder>/ExtraData0`, creating the folder if needed.
pub fn write_extra_data(folder: &Path, image: &[u8]) -> Result<()> {
    if image.len() != EXTRA_DATA_SIZE {
        return Err(anyhow!(
            "ExtraData image must be {} B, got {}",
            EXTRA_DATA_SIZE,
            image.len()
        ));
    }
    fs::create_dir_all(folder).with_context(|| format!("create dir {}", folder.display()))?;
    let path = folder.join(EXTRA_DATA_FILE);
    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;
    f.write_all(image)
        .with_context(|| format!("write {}", path.display()))?;
    f.sync_all()?;
    Ok(())
}

/// Program id recorded in `<folder>/ExtraData0`, or None if the file is
/// missing or shorter than 8 bytes.
pub fn read_program_id(folder: &Path) -> Result<Option<u64>> {
    let path = folder.join(EXTRA_DATA_FILE);
    let mut f = match File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("open {}", path.display())),
    };
    let mut head = [0u8; 8];
    match f.read_exact(&mut head) {
        Ok(()) => Ok(Some(LittleEndian::read_u64(&head))),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
    }
}
