//! Общие константы форматов (IMKV archive, ExtraData, save directory layout).

// -------- IMKV archive --------
pub const ARCHIVE_MAGIC: &[u8; 4] = b"IMKV";
pub const ARCHIVE_HDR_SIZE: usize = 12; // [magic4][format_version u32][entry_count u32]

// Offsets inside archive header
pub const ARC_OFF_MAGIC: usize = 0;
pub const ARC_OFF_VERSION: usize = 4;
pub const ARC_OFF_COUNT: usize = 8;

// -------- IMEN entry --------
pub const ENTRY_MAGIC: &[u8; 4] = b"IMEN";
pub const ENTRY_HDR_SIZE: usize = 12; // [magic4][key_size u32][value_size u32]

pub const ENT_OFF_MAGIC: usize = 0;
pub const ENT_OFF_KEY_SIZE: usize = 4;
pub const ENT_OFF_VALUE_SIZE: usize = 8;

/// The only layout revision in the wild so far.
pub const FORMAT_VERSION_V0: u32 = 0;

// -------- Records --------

/// Commit id of a record that was just created (the platform treats 0 as "never committed").
pub const FRESH_COMMIT_ID: u64 = 1;

/// Record state byte for a usable save.
pub const STATE_NORMAL: u8 = 0;

/// Space id of user save data.
pub const SPACE_ID_USER: u8 = 1;

// -------- ExtraData --------
pub const EXTRA_DATA_FILE: &str = "ExtraData0";
pub const EXTRA_DATA_SIZE: usize = 512;

// -------- Save directory --------

/// Subfolder of a save folder that holds the committed save files.
pub const SAVE_COMMITTED_DIR: &str = "0";

/// First save-data id handed out in an empty save directory.
pub const FIRST_SAVE_DATA_ID: u64 = 1;

/// Default profile id of a fresh emulator install.
pub const DEFAULT_USER_ID: &str = "00000000000000010000000000000000";

pub const DEFAULT_JOURNAL_SIZE: i64 = 0x10;
