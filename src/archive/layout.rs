//! Versioned field-offset tables for the IMKV archive.
//!
//! Decode, encode and the key/value blob builders all go through
//! [`layout_for`], so a new format revision is one more table entry.

use crate::consts::{ENTRY_HDR_SIZE, FORMAT_VERSION_V0};

/// A fixed-width field inside a key or value blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub off: usize,
    pub len: usize,
}

impl Field {
    const fn new(off: usize, len: usize) -> Self {
        Self { off, len }
    }

    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.off..self.off + self.len
    }
}

/// Key blob: save-data attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLayout {
    pub program_id: Field,
    pub user_id_high: Field,
    pub user_id_low: Field,
    pub static_save_data_id: Field,
    pub save_type: Field,
    pub rank: Field,
    pub index: Field,
}

/// Value blob: save-data attributes tracked by the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueLayout {
    pub save_data_id: Field,
    pub data_size: Field,
    pub journal_size: Field,
    pub flags: Field,
    pub space_id: Field,
    pub state: Field,
    pub commit_id: Field,
    pub timestamp: Field,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLayout {
    pub version: u32,
    pub key_size: usize,
    pub value_size: usize,
    pub key: KeyLayout,
    pub value: ValueLayout,
}

impl ArchiveLayout {
    /// Bytes per record on disk: entry header + key + value.
    #[inline]
    pub fn record_size(&self) -> usize {
        ENTRY_HDR_SIZE + self.key_size + self.value_size
    }
}

// v0: [program_id u64][user_id hi u64][user_id lo u64][static_id u64]
//     [type u8][rank u8][index u16][reserved 0x1C]
//   + [save_data_id u64][data_size i64][journal_size i64][flags u32]
//     [space_id u8][state u8][reserved 2][commit_id u64][timestamp u64][reserved 0x10]
const LAYOUT_V0: ArchiveLayout = ArchiveLayout {
    version: FORMAT_VERSION_V0,
    key_size: 0x40,
    value_size: 0x40,
    key: KeyLayout {
        program_id: Field::new(0x00, 8),
        user_id_high: Field::new(0x08, 8),
        user_id_low: Field::new(0x10, 8),
        static_save_data_id: Field::new(0x18, 8),
        save_type: Field::new(0x20, 1),
        rank: Field::new(0x21, 1),
        index: Field::new(0x22, 2),
    },
    value: ValueLayout {
        save_data_id: Field::new(0x00, 8),
        data_size: Field::new(0x08, 8),
        journal_size: Field::new(0x10, 8),
        flags: Field::new(0x18, 4),
        space_id: Field::new(0x1C, 1),
        state: Field::new(0x1D, 1),
        commit_id: Field::new(0x20, 8),
        timestamp: Field::new(0x28, 8),
    },
};

static LAYOUTS: &[ArchiveLayout] = &[LAYOUT_V0];

/// Layout table entry for `version`, or None if the revision is unknown.
pub fn layout_for(version: u32) -> Option<&'static ArchiveLayout> {
    LAYOUTS.iter().find(|l| l.version == version)
}

/// Versions this build can decode and encode.
pub fn supported_versions() -> impl Iterator<Item = u32> {
    LAYOUTS.iter().map(|l| l.version)
}
