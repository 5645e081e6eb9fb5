//! IMKV decode/encode.
//!
//! Формат (LE):
//!   header: [magic4="IMKV"][format_version u32][entry_count u32]
//!   entry:  [magic4="IMEN"][key_size u32][value_size u32][key][value]
//!
//! Key/value blobs are copied verbatim: reserved bytes and unknown fields
//! survive a round trip, so `encode(decode(b)) == b` for every accepted `b`.

use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use std::collections::HashSet;

use super::layout::layout_for;
use super::{Archive, Record};
use crate::consts::{
    ARCHIVE_HDR_SIZE, ARCHIVE_MAGIC, ARC_OFF_COUNT, ARC_OFF_MAGIC, ARC_OFF_VERSION,
    ENTRY_HDR_SIZE, ENTRY_MAGIC, ENT_OFF_KEY_SIZE, ENT_OFF_MAGIC, ENT_OFF_VALUE_SIZE,
};
use crate::error::{ArchiveError, Result};
use crate::util::to_hex;

/// Decode a whole archive file.
///
/// Either every declared record is parsed or an error is returned; a
/// partially populated archive never escapes. Two records with the same key
/// blob make the archive corrupt: lookups on it would be ambiguous.
pub fn decode(bytes: &[u8]) -> Result<Archive> {
    if bytes.len() < ARCHIVE_HDR_SIZE {
        return Err(ArchiveError::corrupt(format!(
            "file is {} B, header needs {} B",
            bytes.len(),
            ARCHIVE_HDR_SIZE
        )));
    }
    if &bytes[ARC_OFF_MAGIC..ARC_OFF_MAGIC + 4] != ARCHIVE_MAGIC {
        return Err(ArchiveError::corrupt(format!(
            "bad archive magic {:02x?}",
            &bytes[ARC_OFF_MAGIC..ARC_OFF_MAGIC + 4]
        )));
    }

    let version = LittleEndian::read_u32(&bytes[ARC_OFF_VERSION..ARC_OFF_VERSION + 4]);
    let layout = layout_for(version).ok_or(ArchiveError::UnsupportedVersion { version })?;
    let count = LittleEndian::read_u32(&bytes[ARC_OFF_COUNT..ARC_OFF_COUNT + 4]) as usize;

    let body = bytes.len() - ARCHIVE_HDR_SIZE;
    let rec_size = layout.record_size();
    let need = count
        .checked_mul(rec_size)
        .ok_or_else(|| ArchiveError::corrupt(format!("entry count {} overflows", count)))?;
    if need > body {
        return Err(ArchiveError::corrupt(format!(
            "truncated: header declares {} entries ({} B), only {} B present",
            count, need, body
        )));
    }
    if need < body {
        return Err(ArchiveError::corrupt(format!(
            "{} trailing bytes after {} entries",
            body - need,
            count
        )));
    }

    let mut entries = Vec::with_capacity(count);
    let mut seen: HashSet<&[u8]> = HashSet::with_capacity(count);
    for i in 0..count {
        let off = ARCHIVE_HDR_SIZE + i * rec_size;
        let rec = &bytes[off..off + rec_size];

        if &rec[ENT_OFF_MAGIC..ENT_OFF_MAGIC + 4] != ENTRY_MAGIC {
            return Err(ArchiveError::corrupt(format!("entry {}: bad entry magic", i)));
        }
        let key_size = LittleEndian::read_u32(&rec[ENT_OFF_KEY_SIZE..ENT_OFF_KEY_SIZE + 4]) as usize;
        let value_size =
            LittleEndian::read_u32(&rec[ENT_OFF_VALUE_SIZE..ENT_OFF_VALUE_SIZE + 4]) as usize;
        if key_size != layout.key_size || value_size != layout.value_size {
            return Err(ArchiveError::corrupt(format!(
                "entry {}: key/value size {}/{} (expected {}/{})",
                i, key_size, value_size, layout.key_size, layout.value_size
            )));
        }

        let key_start = ENTRY_HDR_SIZE;
        let value_start = key_start + key_size;
        let key = &rec[key_start..value_start];
        if !seen.insert(key) {
            return Err(ArchiveError::corrupt(format!(
                "entry {}: duplicate key {}",
                i,
                to_hex(key)
            )));
        }
        entries.push(Record::new(
            key.to_vec(),
            rec[value_start..value_start + value_size].to_vec(),
        ));
    }

    debug!(
        "archive decoded: version={}, entries={}, bytes={}",
        version,
        entries.len(),
        bytes.len()
    );
    Ok(Archive::from_parts(layout, entries))
}

/// Encode the archive. Same offsets/widths as [`decode`]; cannot fail for an
/// archive built by `decode` or `Archive::new_empty` plus index inserts.
pub fn encode(archive: &Archive) -> Vec<u8> {
    let layout = archive.layout();
    let rec_size = layout.record_size();
    let mut out = vec![0u8; ARCHIVE_HDR_SIZE + archive.len() * rec_size];

    out[ARC_OFF_MAGIC..ARC_OFF_MAGIC + 4].copy_from_slice(ARCHIVE_MAGIC);
    LittleEndian::write_u32(&mut out[ARC_OFF_VERSION..ARC_OFF_VERSION + 4], layout.version);
    LittleEndian::write_u32(&mut out[ARC_OFF_COUNT..ARC_OFF_COUNT + 4], archive.entry_count());

    for (i, r) in archive.entries().iter().enumerate() {
        let off = ARCHIVE_HDR_SIZE + i * rec_size;
        let rec = &mut out[off..off + rec_size];
        rec[ENT_OFF_MAGIC..ENT_OFF_MAGIC + 4].copy_from_slice(ENTRY_MAGIC);
        LittleEndian::write_u32(
            &mut rec[ENT_OFF_KEY_SIZE..ENT_OFF_KEY_SIZE + 4],
            layout.key_size as u32,
        );
        LittleEndian::write_u32(
            &mut rec[ENT_OFF_VALUE_SIZE..ENT_OFF_VALUE_SIZE + 4],
            layout.value_size as u32,
        );
        let key_start = ENTRY_HDR_SIZE;
        let value_start = key_start + layout.key_size;
        rec[key_start..value_start].copy_from_slice(r.key());
        rec[value_start..value_start + layout.value_size].copy_from_slice(r.value());
    }
    out
}
