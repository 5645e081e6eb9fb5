//! index: lookup and append of save records on a decoded [`Archive`].
//!
//! Lookup is a linear scan comparing whole key blobs. Archives hold one row
//! per installed game and profile (low hundreds at most), and the file is
//! insertion-ordered anyway, so there is no side index.
//!
//! Per identity: unseen → find → {found, absent}; absent → insert → found.
//! Nothing is ever removed or reordered.

pub mod identity;
pub mod value;

pub use identity::{SaveDataRank, SaveDataType, SaveIdentity, UserId};
pub use value::{SaveAttributes, SaveValue};

use log::debug;

use crate::archive::{Archive, Record};
use crate::consts::SPACE_ID_USER;
use crate::error::{ArchiveError, Result};
use crate::util::to_hex;

/// Result of [`IndexManager::find_or_insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Record already present at this slot.
    Found(usize),
    /// Record appended at this slot.
    Inserted(usize),
}

impl Lookup {
    pub fn slot(self) -> usize {
        match self {
            Lookup::Found(i) | Lookup::Inserted(i) => i,
        }
    }

    pub fn inserted(self) -> bool {
        matches!(self, Lookup::Inserted(_))
    }
}

/// Mutable view of an archive for the duration of a migration run.
pub struct IndexManager<'a> {
    archive: &'a mut Archive,
}

impl<'a> IndexManager<'a> {
    pub fn new(archive: &'a mut Archive) -> Self {
        Self { archive }
    }

    pub fn archive(&self) -> &Archive {
        self.archive
    }

    /// Slot of the record whose key equals the canonical key of `id`.
    pub fn position(&self, id: &SaveIdentity) -> Option<usize> {
        let key = id.to_key(self.archive.layout());
        self.position_of_key(&key)
    }

    fn position_of_key(&self, key: &[u8]) -> Option<usize> {
        self.archive.entries().iter().position(|r| r.key() == key)
    }

    /// Absence is a normal outcome, not an error.
    pub fn find_by_identity(&self, id: &SaveIdentity) -> Option<&Record> {
        self.position(id).map(|i| &self.archive.entries()[i])
    }

    /// Decoded value of the record for `id`, if present and well-formed.
    pub fn value_of(&self, id: &SaveIdentity) -> Option<SaveValue> {
        let r = self.find_by_identity(id)?;
        SaveValue::from_value(r.value(), self.archive.layout())
    }

    /// Append a new record for `id`. Fails with `DuplicateKey` if one exists;
    /// callers are expected to have seen a miss from `find_by_identity`.
    pub fn insert_new(&mut self, id: &SaveIdentity, attrs: &SaveAttributes) -> Result<&Record> {
        let slot = self.insert_slot(id, attrs)?;
        Ok(&self.archive.entries()[slot])
    }

    fn insert_slot(&mut self, id: &SaveIdentity, attrs: &SaveAttributes) -> Result<usize> {
        let layout = self.archive.layout();
        let key = id.to_key(layout);
        if self.position_of_key(&key).is_some() {
            return Err(ArchiveError::DuplicateKey {
                key: format!("{} ({})", id, to_hex(&key)),
            });
        }
        let value = SaveValue::fresh(attrs).to_value(layout);
        let slot = self.archive.push(Record::new(key, value));
        debug!(
            "index: appended {} at slot {} (save_data_id={:016x})",
            id, slot, attrs.save_data_id
        );
        Ok(slot)
    }

    /// Find, or insert on a miss. `attrs` is only consulted on a miss.
    pub fn find_or_insert(&mut self, id: &SaveIdentity, attrs: &SaveAttributes) -> Result<Lookup> {
        if let Some(i) = self.position(id) {
            debug!("index: hit {} at slot {}", id, i);
            return Ok(Lookup::Found(i));
        }
        self.insert_slot(id, attrs).map(Lookup::Inserted)
    }

    /// Largest save-data id recorded in the archive (0 if none).
    pub fn max_save_data_id(&self) -> u64 {
        let layout = self.archive.layout();
        self.archive
            .entries()
            .iter()
            .filter_map(|r| SaveValue::from_value(r.value(), layout))
            .map(|v| v.save_data_id)
            .max()
            .unwrap_or(0)
    }

    /// Largest save-data id among user-space records (0 if none). System
    /// saves live in the same archive with ids from a separate range
    /// (0x8000...), which must not leak into user save folder names.
    pub fn max_user_save_data_id(&self) -> u64 {
        let layout = self.archive.layout();
        self.archive
            .entries()
            .iter()
            .filter(|r| {
                SaveIdentity::from_key(r.key(), layout).map_or(false, |id| !id.save_type.is_system())
            })
            .filter_map(|r| SaveValue::from_value(r.value(), layout))
            .filter(|v| v.space_id == SPACE_ID_USER)
            .map(|v| v.save_data_id)
            .max()
            .unwrap_or(0)
    }

    /// Identity of every record whose value names `save_data_id`.
    pub fn owners_of(&self, save_data_id: u64) -> Vec<SaveIdentity> {
        let layout = self.archive.layout();
        self.archive
            .entries()
            .iter()
            .filter(|r| {
                SaveValue::from_value(r.value(), layout)
                    .map_or(false, |v| v.save_data_id == save_data_id)
            })
            .filter_map(|r| SaveIdentity::from_key(r.key(), layout))
            .collect()
    }
}
