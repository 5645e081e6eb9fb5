//! archive: IMKV index archive: in-memory model + binary codec.
//!
//! Разделение по подмодулям:
//! - layout.rs: versioned offset tables (header, key blob, value blob).
//! - codec.rs:  decode/encode of the whole file.
//!
//! The archive owns its records. Order is insertion order and survives a
//! decode/encode round trip untouched; the only mutation is an append.

pub mod codec;
pub mod layout;

pub use codec::{decode, encode};
pub use layout::{layout_for, supported_versions, ArchiveLayout, Field, KeyLayout, ValueLayout};

use crate::error::{ArchiveError, Result};

/// One key/value row. Blob widths always match the owning archive's layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    key: Vec<u8>,
    value: Vec<u8>,
}

impl Record {
    pub(crate) fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

/// The whole index archive in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    layout: &'static ArchiveLayout,
    entries: Vec<Record>,
}

impl Archive {
    /// Empty archive with a valid header, for when no file exists yet.
    pub fn new_empty(format_version: u32) -> Result<Self> {
        let layout = layout_for(format_version).ok_or(ArchiveError::UnsupportedVersion {
            version: format_version,
        })?;
        Ok(Self {
            layout,
            entries: Vec::new(),
        })
    }

    pub(crate) fn from_parts(layout: &'static ArchiveLayout, entries: Vec<Record>) -> Self {
        Self { layout, entries }
    }

    /// Decode a whole archive file. See [`codec::decode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        codec::decode(bytes)
    }

    /// Encode the archive back to bytes. See [`codec::encode`].
    pub fn encode(&self) -> Vec<u8> {
        codec::encode(self)
    }

    pub fn format_version(&self) -> u32 {
        self.layout.version
    }

    pub fn layout(&self) -> &'static ArchiveLayout {
        self.layout
    }

    pub fn entries(&self) -> &[Record] {
        &self.entries
    }

    /// Entry count as written in the header.
    pub fn entry_count(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append-only. Callers in this crate check key uniqueness first.
    pub(crate) fn push(&mut self, record: Record) -> usize {
        self.entries.push(record);
        self.entries.len() - 1
    }
}
