//! Active and final path generation.
//!
//! For a base path `/var/log/app/events`:
//! - the active file is `/var/log/app/.events`
//! - finalized artifacts are `/var/log/app/events_YYYYMMDD_HHMMSS`, with a
//!   `_<n>` sequence appended when that name was already taken, plus any
//!   suffix the finalization strategy adds.

use std::fs;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use crate::common::{Error, IoContext, Result};

const ACTIVE_PREFIX: char = '.';
const STAMP_LEN: usize = 15;

/// Sortable identity of a final name: UTC stamp, then collision sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FinalKey {
    /// `YYYYMMDD_HHMMSS` in UTC.
    pub stamp: String,
    /// Collision sequence; 0 when the plain stamped name was free.
    pub seq: u32,
}

#[derive(Debug, Clone)]
pub struct NamingScheme {
    dir: PathBuf,
    base_name: String,
}

impl NamingScheme {
    pub fn new(base_path: &Path) -> Result<Self> {
        let base_name = base_path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "base path {} has no usable file name",
                    base_path.display()
                ))
            })?;
        if base_name.starts_with(ACTIVE_PREFIX) {
            return Err(Error::Config(format!(
                "base name {base_name:?} must not start with '{ACTIVE_PREFIX}'"
            )));
        }
        let dir = match base_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self {
            dir,
            base_name: base_name.to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn active_path(&self) -> PathBuf {
        self.dir.join(format!("{ACTIVE_PREFIX}{}", self.base_name))
    }

    /// Final path before any strategy suffix is applied.
    pub fn final_path(&self, key: &FinalKey) -> PathBuf {
        let name = if key.seq == 0 {
            format!("{}_{}", self.base_name, key.stamp)
        } else {
            format!("{}_{}_{}", self.base_name, key.stamp, key.seq)
        };
        self.dir.join(name)
    }

    /// Parse a file name produced by [`final_path`](Self::final_path) with
    /// `suffix` appended.
    pub fn parse_final_name(&self, name: &str, suffix: &str) -> Option<FinalKey> {
        let rest = name
            .strip_prefix(self.base_name.as_str())?
            .strip_prefix('_')?
            .strip_suffix(suffix)?;
        if rest.len() < STAMP_LEN || !rest.is_char_boundary(STAMP_LEN) {
            return None;
        }
        let (stamp, tail) = rest.split_at(STAMP_LEN);
        let bytes = stamp.as_bytes();
        let valid_stamp = bytes.iter().enumerate().all(|(i, b)| {
            if i == 8 {
                *b == b'_'
            } else {
                b.is_ascii_digit()
            }
        });
        if !valid_stamp {
            return None;
        }
        let seq = if tail.is_empty() {
            0
        } else {
            let digits = tail.strip_prefix('_')?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok()?
        };
        Some(FinalKey {
            stamp: stamp.to_string(),
            seq,
        })
    }

    /// Existing finalized artifacts in the directory, oldest first.
    pub fn scan_finals(&self, suffix: &str) -> Result<Vec<(FinalKey, PathBuf)>> {
        let mut found = Vec::new();
        if !self.dir.exists() {
            return Ok(found);
        }
        for entry in fs::read_dir(&self.dir).at("scan", &self.dir)? {
            let entry = entry.at("scan", &self.dir)?;
            if !entry.file_type().at("scan", &entry.path())?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(key) = self.parse_final_name(name, suffix) {
                found.push((key, entry.path()));
            }
        }
        found.sort();
        Ok(found)
    }
}

/// Format a nanosecond timestamp as a UTC `YYYYMMDD_HHMMSS` stamp.
pub fn format_stamp(timestamp_ns: u64) -> String {
    let at = OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp_ns))
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // 2024-01-29 15:42:07 UTC
    const TS: u64 = 1_706_542_927_000_000_000;

    #[test]
    fn stamp_is_utc() {
        assert_eq!(format_stamp(TS), "20240129_154207");
        assert_eq!(format_stamp(0), "19700101_000000");
    }

    #[test]
    fn active_path_is_hidden_sibling() {
        let naming = NamingScheme::new(Path::new("/var/log/app/events")).unwrap();
        assert_eq!(naming.active_path(), PathBuf::from("/var/log/app/.events"));
        assert_eq!(naming.dir(), Path::new("/var/log/app"));
    }

    #[test]
    fn bare_file_name_uses_current_dir() {
        let naming = NamingScheme::new(Path::new("events")).unwrap();
        assert_eq!(naming.dir(), Path::new("."));
    }

    #[test]
    fn rejects_unusable_base() {
        assert!(NamingScheme::new(Path::new("/")).is_err());
        assert!(NamingScheme::new(Path::new("/data/.hidden")).is_err());
    }

    #[test]
    fn final_names_parse_back() {
        let naming = NamingScheme::new(Path::new("/data/my_log")).unwrap();
        let key = FinalKey {
            stamp: format_stamp(TS),
            seq: 0,
        };
        let plain = naming.final_path(&key);
        assert_eq!(plain, PathBuf::from("/data/my_log_20240129_154207"));

        let bumped = FinalKey { seq: 12, ..key.clone() };
        let name = format!(
            "{}.zip",
            naming.final_path(&bumped).file_name().unwrap().to_str().unwrap()
        );
        assert_eq!(name, "my_log_20240129_154207_12.zip");
        assert_eq!(naming.parse_final_name(&name, ".zip"), Some(bumped));
        assert_eq!(naming.parse_final_name("my_log_20240129_154207", ""), Some(key));
    }

    #[test]
    fn foreign_names_ignored() {
        let naming = NamingScheme::new(Path::new("/data/log")).unwrap();
        for name in [
            ".log",
            "log",
            "log_2024",
            "log_20240129-154207",
            "log_20240129_154207_",
            "log_20240129_154207_x",
            "log_20240129_154207.zip.tmp",
            "other_20240129_154207",
        ] {
            assert_eq!(naming.parse_final_name(name, ""), None, "{name}");
        }
        assert_eq!(naming.parse_final_name("log_20240129_154207", ".zip"), None);
    }

    #[test]
    fn scan_orders_by_stamp_then_seq() {
        let dir = TempDir::new().unwrap();
        let naming = NamingScheme::new(&dir.path().join("log")).unwrap();
        for name in [
            "log_20240129_154207_10",
            "log_20240129_154207_2",
            "log_20240129_154207",
            "log_20240101_000000",
            ".log",
            "unrelated.txt",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let found = naming.scan_finals("").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|(_, p)| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "log_20240101_000000",
                "log_20240129_154207",
                "log_20240129_154207_2",
                "log_20240129_154207_10",
            ]
        );
    }
}
