//! Identity of a save: the fields that make up a record key.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::str::FromStr;

use crate::archive::ArchiveLayout;
use crate::util::parse_hex_u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveDataType {
    System,
    Account,
    Bcat,
    Device,
    Temporary,
    Cache,
    SystemBcat,
}

impl SaveDataType {
    pub fn as_u8(self) -> u8 {
        match self {
            SaveDataType::System => 0,
            SaveDataType::Account => 1,
            SaveDataType::Bcat => 2,
            SaveDataType::Device => 3,
            SaveDataType::Temporary => 4,
            SaveDataType::Cache => 5,
            SaveDataType::SystemBcat => 6,
        }
    }

    pub fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            0 => SaveDataType::System,
            1 => SaveDataType::Account,
            2 => SaveDataType::Bcat,
            3 => SaveDataType::Device,
            4 => SaveDataType::Temporary,
            5 => SaveDataType::Cache,
            6 => SaveDataType::SystemBcat,
            _ => return None,
        })
    }

    /// System-owned kinds; their save-data ids come from the system range.
    pub fn is_system(self) -> bool {
        matches!(self, SaveDataType::System | SaveDataType::SystemBcat)
    }

    pub fn name(self) -> &'static str {
        match self {
            SaveDataType::System => "system",
            SaveDataType::Account => "account",
            SaveDataType::Bcat => "bcat",
            SaveDataType::Device => "device",
            SaveDataType::Temporary => "temporary",
            SaveDataType::Cache => "cache",
            SaveDataType::SystemBcat => "system-bcat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveDataRank {
    Primary,
    Secondary,
}

impl SaveDataRank {
    pub fn as_u8(self) -> u8 {
        match self {
            SaveDataRank::Primary => 0,
            SaveDataRank::Secondary => 1,
        }
    }

    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(SaveDataRank::Primary),
            1 => Some(SaveDataRank::Secondary),
            _ => None,
        }
    }
}

/// 128-bit profile id, written as 32 hex digits (high half first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UserId {
    pub high: u64,
    pub low: u64,
}

impl UserId {
    pub const fn new(high: u64, low: u64) -> Self {
        Self { high, low }
    }

    pub fn is_zero(&self) -> bool {
        self.high == 0 && self.low == 0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.high, self.low)
    }
}

impl FromStr for UserId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 32 {
            return Err(anyhow::anyhow!(
                "user id must be 32 hex digits, got {} ({:?})",
                s.len(),
                s
            ));
        }
        Ok(Self {
            high: parse_hex_u64(&s[..16])?,
            low: parse_hex_u64(&s[16..])?,
        })
    }
}

/// (game, user, kind, rank/index): everything that addresses one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SaveIdentity {
    pub program_id: u64,
    pub user_id: UserId,
    /// Only system saves carry one; 0 otherwise.
    pub static_save_data_id: u64,
    pub save_type: SaveDataType,
    pub rank: SaveDataRank,
    pub index: u16,
}

impl SaveIdentity {
    /// Primary account save of `program_id` for `user_id`, index 0.
    pub fn account(program_id: u64, user_id: UserId) -> Self {
        Self {
            program_id,
            user_id,
            static_save_data_id: 0,
            save_type: SaveDataType::Account,
            rank: SaveDataRank::Primary,
            index: 0,
        }
    }

    /// Canonical key blob. Reserved bytes are zero.
    pub fn to_key(&self, layout: &ArchiveLayout) -> Vec<u8> {
        let k = &layout.key;
        let mut key = vec![0u8; layout.key_size];
        LittleEndian::write_u64(&mut key[k.program_id.range()], self.program_id);
        LittleEndian::write_u64(&mut key[k.user_id_high.range()], self.user_id.high);
        LittleEndian::write_u64(&mut key[k.user_id_low.range()], self.user_id.low);
        LittleEndian::write_u64(
            &mut key[k.static_save_data_id.range()],
            self.static_save_data_id,
        );
        key[k.save_type.off] = self.save_type.as_u8();
        key[k.rank.off] = self.rank.as_u8();
        LittleEndian::write_u16(&mut key[k.index.range()], self.index);
        key
    }

    /// Parse a key blob back. None if the blob has the wrong width or a
    /// kind/rank byte this build does not know.
    pub fn from_key(key: &[u8], layout: &ArchiveLayout) -> Option<Self> {
        if key.len() != layout.key_size {
            return None;
        }
        let k = &layout.key;
        Some(Self {
            program_id: LittleEndian::read_u64(&key[k.program_id.range()]),
            user_id: UserId {
                high: LittleEndian::read_u64(&key[k.user_id_high.range()]),
                low: LittleEndian::read_u64(&key[k.user_id_low.range()]),
            },
            static_save_data_id: LittleEndian::read_u64(&key[k.static_save_data_id.range()]),
            save_type: SaveDataType::from_u8(key[k.save_type.off])?,
            rank: SaveDataRank::from_u8(key[k.rank.off])?,
            index: LittleEndian::read_u16(&key[k.index.range()]),
        })
    }
}

impl fmt::Display for SaveIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:016x}/{}/{}",
            self.program_id,
            self.user_id,
            self.save_type.name()
        )?;
        if self.rank != SaveDataRank::Primary || self.index != 0 {
            write!(f, "/r{}i{}", self.rank.as_u8(), self.index)?;
        }
        Ok(())
    }
}
