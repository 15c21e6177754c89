//! Compressing finalization.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::warn;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::common::{Error, IoContext, Result};
use crate::finalize::Finalizer;

/// Suffix appended to the plain final name.
pub const ARCHIVE_SUFFIX: &str = ".zip";
/// Default deflate level.
pub const DEFAULT_LEVEL: u32 = 6;
const CHUNK_SIZE: usize = 8192;
const TMP_SUFFIX: &str = ".tmp";

/// Seals the active file into a single-entry zip archive.
///
/// The entry is named after the archive's file name minus [`ARCHIVE_SUFFIX`].
/// The active file is streamed in fixed-size chunks, so memory use does not
/// depend on its size. The archive is written to a temporary sibling and
/// renamed into place, so a failure never leaves a partial archive under the
/// final name; the active file is only removed after the archive is
/// published. Level 0 stores the entry uncompressed.
#[derive(Debug, Clone, Copy)]
pub struct CompressingFinalizer {
    level: u32,
}

impl Default for CompressingFinalizer {
    fn default() -> Self {
        Self::new(DEFAULT_LEVEL)
    }
}

fn zip_error(op: &'static str, path: &Path, err: ZipError) -> Error {
    let err = match err {
        ZipError::Io(err) => err,
        other => io::Error::new(io::ErrorKind::Other, other),
    };
    Error::io(op, path, err)
}

impl CompressingFinalizer {
    pub fn new(level: u32) -> Self {
        Self { level }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Entry name stored inside the archive at `archive_path`.
    pub fn entry_name(archive_path: &Path) -> Option<String> {
        let name = archive_path.file_name()?.to_str()?;
        let entry = name.strip_suffix(ARCHIVE_SUFFIX)?;
        (!entry.is_empty()).then(|| entry.to_string())
    }

    fn options(&self) -> FileOptions {
        let options = FileOptions::default().large_file(true);
        match self.level {
            0 => options.compression_method(CompressionMethod::Stored),
            level => options
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(level as i32)),
        }
    }

    /// Write the archive to `dst` and return its size.
    fn write_archive(&self, src: &Path, dst: &Path, entry: &str) -> Result<u64> {
        let input = File::open(src).at("open", src)?;
        let mut reader = BufReader::with_capacity(CHUNK_SIZE, input);
        let output = File::create(dst).at("create", dst)?;
        let mut archive = ZipWriter::new(BufWriter::new(output));
        archive
            .start_file(entry, self.options())
            .map_err(|err| zip_error("compress", dst, err))?;

        let mut chunk = vec![0u8; CHUNK_SIZE];
        loop {
            let read = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::io("read", src, err)),
            };
            archive.write_all(&chunk[..read]).at("compress", dst)?;
        }

        let buffered = archive
            .finish()
            .map_err(|err| zip_error("compress", dst, err))?;
        let file = buffered
            .into_inner()
            .map_err(|err| Error::io("write", dst, err.into_error()))?;
        file.sync_all().at("sync", dst)?;
        Ok(file.metadata().at("stat", dst)?.len())
    }
}

impl Finalizer for CompressingFinalizer {
    fn final_path(&self, plain: &Path) -> PathBuf {
        let mut name = OsString::from(plain.as_os_str());
        name.push(ARCHIVE_SUFFIX);
        PathBuf::from(name)
    }

    fn suffix(&self) -> &str {
        ARCHIVE_SUFFIX
    }

    fn finalize(&self, active: &Path, final_path: &Path) -> Result<u64> {
        let entry = Self::entry_name(final_path)
            .ok_or(Error::State("archive path must end with the archive suffix"))?;
        if final_path.exists() {
            return Err(Error::io(
                "compress",
                final_path,
                io::Error::new(io::ErrorKind::AlreadyExists, "final path already exists"),
            ));
        }

        let mut tmp = OsString::from(final_path.as_os_str());
        tmp.push(TMP_SUFFIX);
        let tmp = PathBuf::from(tmp);
        let _ = fs::remove_file(&tmp);

        let published = self.write_archive(active, &tmp, &entry).and_then(|size| {
            fs::rename(&tmp, final_path).at("rename", &tmp)?;
            Ok(size)
        });
        let size = match published {
            Ok(size) => size,
            Err(err) => {
                let _ = fs::remove_file(&tmp);
                return Err(err);
            }
        };

        // The engine retries the removal and reports it if this fails.
        if let Err(err) = fs::remove_file(active) {
            warn!("archived {} but could not remove it: {err}", active.display());
        }
        Ok(size)
    }
}
