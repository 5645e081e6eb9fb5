//! Centralized configuration and builder for an import run.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - MigrateConfig::from_env() reads SAVEBRIDGE_* variables; CLI flags are
//!   applied on top through the with_* builder methods.
//!
//! The attribute defaults only matter for records that have to be created;
//! existing records are never rewritten.

use anyhow::Result;
use log::warn;

use crate::consts::{DEFAULT_JOURNAL_SIZE, DEFAULT_USER_ID, SPACE_ID_USER};
use crate::index::{SaveAttributes, UserId};
use crate::util::{env_flag, parse_int_i64};

#[derive(Clone, Debug)]
pub struct MigrateConfig {
    /// Profile that owns the imported saves.
    /// Env: SAVEBRIDGE_USER_ID (32 hex digits, default 00000000000000010000000000000000)
    pub user_id: UserId,

    /// Data size budget for new records.
    /// Env: SAVEBRIDGE_DATA_SIZE (default 0)
    pub data_size: i64,

    /// Journal size for new records.
    /// Env: SAVEBRIDGE_JOURNAL_SIZE (default 0x10)
    pub journal_size: i64,

    /// Flags for new records.
    /// Env: SAVEBRIDGE_FLAGS (default 0)
    pub flags: u32,

    /// Space id for new records.
    /// Env: SAVEBRIDGE_SPACE_ID (default 1 = user)
    pub space_id: u8,

    /// Write ExtraData0 into newly created save folders.
    /// Env: SAVEBRIDGE_EXTRA_DATA (default true)
    pub write_extra_data: bool,

    /// Resolve everything but copy/write nothing.
    /// Env: SAVEBRIDGE_DRY_RUN (default false)
    pub dry_run: bool,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            data_size: 0,
            journal_size: DEFAULT_JOURNAL_SIZE,
            flags: 0,
            space_id: SPACE_ID_USER,
            write_extra_data: true,
            dry_run: false,
        }
    }
}

fn default_user_id() -> UserId {
    DEFAULT_USER_ID.parse().unwrap_or(UserId::new(1, 0))
}

impl MigrateConfig {
    /// Load configuration from environment variables. Unparseable values are
    /// logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = get("SAVEBRIDGE_USER_ID") {
            match v.parse::<UserId>() {
                Ok(u) => cfg.user_id = u,
                Err(e) => warn!("config: ignoring SAVEBRIDGE_USER_ID: {}", e),
            }
        }
        if let Some(v) = get("SAVEBRIDGE_DATA_SIZE") {
            match parse_int_i64(&v) {
                Ok(n) => cfg.data_size = n,
                Err(e) => warn!("config: ignoring SAVEBRIDGE_DATA_SIZE: {}", e),
            }
        }
        if let Some(v) = get("SAVEBRIDGE_JOURNAL_SIZE") {
            match parse_int_i64(&v) {
                Ok(n) => cfg.journal_size = n,
                Err(e) => warn!("config: ignoring SAVEBRIDGE_JOURNAL_SIZE: {}", e),
            }
        }
        if let Some(v) = get("SAVEBRIDGE_FLAGS") {
            match parse_int_i64(&v).map(u32::try_from) {
                Ok(Ok(n)) => cfg.flags = n,
                _ => warn!("config: ignoring SAVEBRIDGE_FLAGS={:?}", v),
            }
        }
        if let Some(v) = get("SAVEBRIDGE_SPACE_ID") {
            match parse_int_i64(&v).map(u8::try_from) {
                Ok(Ok(n)) => cfg.space_id = n,
                _ => warn!("config: ignoring SAVEBRIDGE_SPACE_ID={:?}", v),
            }
        }
        if let Some(v) = get("SAVEBRIDGE_EXTRA_DATA") {
            cfg.write_extra_data = env_flag(&v);
        }
        if let Some(v) = get("SAVEBRIDGE_DRY_RUN") {
            cfg.dry_run = env_flag(&v);
        }

        cfg
    }

    // -------- builder --------

    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_user_id_str(self, s: &str) -> Result<Self> {
        Ok(self.with_user_id(s.parse()?))
    }

    pub fn with_data_size(mut self, n: i64) -> Self {
        self.data_size = n;
        self
    }

    pub fn with_journal_size(mut self, n: i64) -> Self {
        self.journal_size = n;
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_space_id(mut self, space_id: u8) -> Self {
        self.space_id = space_id;
        self
    }

    pub fn with_extra_data(mut self, on: bool) -> Self {
        self.write_extra_data = on;
        self
    }

    pub fn with_dry_run(mut self, on: bool) -> Self {
        self.dry_run = on;
        self
    }

    /// Attributes for a record created now under `save_data_id`.
    pub fn attributes_for(&self, save_data_id: u64, timestamp: u64) -> SaveAttributes {
        SaveAttributes {
            save_data_id,
            data_size: self.data_size,
            journal_size: self.journal_size,
            flags: self.flags,
            space_id: self.space_id,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg_from(pairs: &[(&str, &str)]) -> MigrateConfig {
        let m: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MigrateConfig::from_lookup(|k| m.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let c = cfg_from(&[]);
        assert_eq!(c.user_id, UserId::new(1, 0));
        assert_eq!(c.journal_size, 0x10);
        assert_eq!(c.space_id, SPACE_ID_USER);
        assert!(c.write_extra_data);
        assert!(!c.dry_run);
    }

    #[test]
    fn env_overrides_and_bad_values() {
        let c = cfg_from(&[
            ("SAVEBRIDGE_USER_ID", "000000000000000200000000000000ff"),
            ("SAVEBRIDGE_DATA_SIZE", "0x400000"),
            ("SAVEBRIDGE_FLAGS", "-1"),
            ("SAVEBRIDGE_SPACE_ID", "300"),
            ("SAVEBRIDGE_DRY_RUN", "yes"),
            ("SAVEBRIDGE_EXTRA_DATA", "0"),
        ]);
        assert_eq!(c.user_id, UserId::new(2, 0xff));
        assert_eq!(c.data_size, 0x40_0000);
        assert_eq!(c.flags, 0, "negative flags are ignored");
        assert_eq!(c.space_id, SPACE_ID_USER, "out of range space id is ignored");
        assert!(c.dry_run);
        assert!(!c.write_extra_data);
    }

    #[test]
    fn builder_and_attributes() {
        let c = MigrateConfig::default()
            .with_data_size(100)
            .with_flags(4)
            .with_user_id_str("0000000000000003000000000000000a")
            .unwrap();
        let a = c.attributes_for(9, 42);
        assert_eq!(a.save_data_id, 9);
        assert_eq!(a.data_size, 100);
        assert_eq!(a.flags, 4);
        assert_eq!(a.timestamp, 42);
        assert_eq!(c.user_id, UserId::new(3, 0xa));
    }
}
