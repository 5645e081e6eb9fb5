//! Value blob of a record: the save-data attributes.

use byteorder::{ByteOrder, LittleEndian};

use crate::archive::ArchiveLayout;
use crate::consts::{DEFAULT_JOURNAL_SIZE, FRESH_COMMIT_ID, SPACE_ID_USER, STATE_NORMAL};

/// Caller-supplied attributes for a record that has to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveAttributes {
    /// Names the save folder (`{:016x}`) in the save directory.
    pub save_data_id: u64,
    pub data_size: i64,
    pub journal_size: i64,
    pub flags: u32,
    pub space_id: u8,
    /// Unix seconds.
    pub timestamp: u64,
}

impl Default for SaveAttributes {
    fn default() -> Self {
        Self {
            save_data_id: 0,
            data_size: 0,
            journal_size: DEFAULT_JOURNAL_SIZE,
            flags: 0,
            space_id: SPACE_ID_USER,
            timestamp: 0,
        }
    }
}

/// Decoded view of a value blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveValue {
    pub save_data_id: u64,
    pub data_size: i64,
    pub journal_size: i64,
    pub flags: u32,
    pub space_id: u8,
    pub state: u8,
    pub commit_id: u64,
    pub timestamp: u64,
}

impl SaveValue {
    /// Value of a freshly created record: state normal, commit id = FRESH_COMMIT_ID.
    pub fn fresh(attrs: &SaveAttributes) -> Self {
        Self {
            save_data_id: attrs.save_data_id,
            data_size: attrs.data_size,
            journal_size: attrs.journal_size,
            flags: attrs.flags,
            space_id: attrs.space_id,
            state: STATE_NORMAL,
            commit_id: FRESH_COMMIT_ID,
            timestamp: attrs.timestamp,
        }
    }

    pub fn to_value(&self, layout: &ArchiveLayout) -> Vec<u8> {
        let v = &layout.value;
        let mut out = vec![0u8; layout.value_size];
        LittleEndian::write_u64(&mut out[v.save_data_id.range()], self.save_data_id);
        LittleEndian::write_i64(&mut out[v.data_size.range()], self.data_size);
        LittleEndian::write_i64(&mut out[v.journal_size.range()], self.journal_size);
        LittleEndian::write_u32(&mut out[v.flags.range()], self.flags);
        out[v.space_id.off] = self.space_id;
        out[v.state.off] = self.state;
        LittleEndian::write_u64(&mut out[v.commit_id.range()], self.commit_id);
        LittleEndian::write_u64(&mut out[v.timestamp.range()], self.timestamp);
        out
    }

    pub fn from_value(value: &[u8], layout: &ArchiveLayout) -> Option<Self> {
        if value.len() != layout.value_size {
            return None;
        }
        let v = &layout.value;
        Some(Self {
            save_data_id: LittleEndian::read_u64(&value[v.save_data_id.range()]),
            data_size: LittleEndian::read_i64(&value[v.data_size.range()]),
            journal_size: LittleEndian::read_i64(&value[v.journal_size.range()]),
            flags: LittleEndian::read_u32(&value[v.flags.range()]),
            space_id: value[v.space_id.off],
            state: value[v.state.off],
            commit_id: LittleEndian::read_u64(&value[v.commit_id.range()]),
            timestamp: LittleEndian::read_u64(&value[v.timestamp.range()]),
        })
    }
}
