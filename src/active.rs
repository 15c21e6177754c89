//! The file currently receiving records.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::{IoContext, Result};
use crate::policy::Window;

/// Open output target plus the counters policies are evaluated against.
pub(crate) struct ActiveFile {
    path: PathBuf,
    out: BufWriter<File>,
    bytes: u64,
    records: u64,
    opened_at_ns: u64,
    last_flush_ns: u64,
    bytes_since_flush: u64,
    records_since_flush: u64,
}

impl ActiveFile {
    /// Create (or truncate) the active file.
    pub fn create(path: &Path, buffer_capacity: usize, now_ns: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .at("create", path)?;
        Ok(Self::with_file(path, file, buffer_capacity, 0, now_ns))
    }

    /// Reopen a leftover active file, appending after its existing bytes.
    pub fn resume(path: &Path, buffer_capacity: usize, now_ns: u64) -> Result<Self> {
        let file = OpenOptions::new().append(true).open(path).at("open", path)?;
        let existing = file.metadata().at("stat", path)?.len();
        Ok(Self::with_file(path, file, buffer_capacity, existing, now_ns))
    }

    fn with_file(path: &Path, file: File, buffer_capacity: usize, bytes: u64, now_ns: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            out: BufWriter::with_capacity(buffer_capacity, file),
            bytes,
            records: 0,
            opened_at_ns: now_ns,
            last_flush_ns: now_ns,
            bytes_since_flush: 0,
            records_since_flush: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    /// Append one encoded record. Counters only move once the bytes are
    /// accepted.
    pub fn append(&mut self, record: &[u8]) -> Result<()> {
        self.out.write_all(record).at("write", &self.path)?;
        let len = record.len() as u64;
        self.bytes += len;
        self.records += 1;
        self.bytes_since_flush += len;
        self.records_since_flush += 1;
        Ok(())
    }

    /// Push buffered bytes to the file and sync them to storage.
    pub fn flush(&mut self, now_ns: u64) -> Result<()> {
        self.out.flush().at("flush", &self.path)?;
        self.out.get_ref().sync_data().at("sync", &self.path)?;
        self.last_flush_ns = now_ns;
        self.bytes_since_flush = 0;
        self.records_since_flush = 0;
        Ok(())
    }

    /// Counters since the file was opened.
    pub fn since_open(&self, now_ns: u64) -> Window {
        Window::new(self.bytes, self.records, elapsed(self.opened_at_ns, now_ns))
    }

    /// Counters since the last flush.
    pub fn since_flush(&self, now_ns: u64) -> Window {
        Window::new(
            self.bytes_since_flush,
            self.records_since_flush,
            elapsed(self.last_flush_ns, now_ns),
        )
    }
}

fn elapsed(from_ns: u64, now_ns: u64) -> Duration {
    Duration::from_nanos(now_ns.saturating_sub(from_ns))
}
