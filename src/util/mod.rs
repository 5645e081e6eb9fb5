//! util: общие утилиты.
//!
//! - now_secs(): текущее Unix-время в секундах.
//! - parse_hex_u64() / parse_int_i64(): разбор чисел из имён папок, ENV и CLI.
//! - to_hex() / hex_dump(): вывод бинарных ключей.

use anyhow::{anyhow, Result};

/// Текущее Unix-время в секундах.
#[inline]
pub fn now_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Up to 16 hex digits, optional `0x` prefix.
pub fn parse_hex_u64(s: &str) -> Result<u64> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if s.is_empty() || s.len() > 16 {
        return Err(anyhow!("expected 1..=16 hex digits, got {:?}", s));
    }
    u64::from_str_radix(s, 16).map_err(|e| anyhow!("invalid hex {:?}: {}", s, e))
}

/// Decimal, or hex with `0x`. Used for sizes/flags in ENV and CLI.
pub fn parse_int_i64(s: &str) -> Result<i64> {
    let s = s.trim();
    if let Some(x) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        i64::from_str_radix(x, 16).map_err(|e| anyhow!("invalid hex {:?}: {}", s, e))
    } else {
        s.parse::<i64>()
            .map_err(|e| anyhow!("invalid number {:?}: {}", s, e))
    }
}

pub fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            if i % 16 == 0 {
                out.push('\n');
            } else {
                out.push(' ');
            }
        }
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// "1|true|yes|on" → true (ENV flags).
pub fn env_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_u64() {
        assert_eq!(parse_hex_u64("0100F2C0115B6000").unwrap(), 0x0100_F2C0_115B_6000);
        assert_eq!(parse_hex_u64("0x1f").unwrap(), 0x1f);
        assert!(parse_hex_u64("").is_err());
        assert!(parse_hex_u64("10000000000000000").is_err());
        assert!(parse_hex_u64("xyz").is_err());
    }

    #[test]
    fn int_i64() {
        assert_eq!(parse_int_i64("16").unwrap(), 16);
        assert_eq!(parse_int_i64("0x10").unwrap(), 16);
        assert!(parse_int_i64("ten").is_err());
    }

    #[test]
    fn hex_out() {
        assert_eq!(to_hex(&[0x01, 0xab]), "01ab");
        assert_eq!(hex_dump(&[0u8; 17]).lines().count(), 2);
    }

    #[test]
    fn flags() {
        assert!(env_flag(" Yes "));
        assert!(env_flag("1"));
        assert!(!env_flag("0"));
        assert!(!env_flag("off"));
    }

    #[test]
    fn now_secs_monotonic_nonzero() {
        let a = now_secs();
        let b = now_secs();
        assert!(a > 0);
        assert!(b >= a);
    }
}
