use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::common::{Error, IoContext, Result};
use crate::finalize::Finalizer;

/// Seals the active file by moving it to its final name.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameFinalizer;

impl Finalizer for RenameFinalizer {
    fn final_path(&self, plain: &Path) -> PathBuf {
        plain.to_path_buf()
    }

    fn finalize(&self, active: &Path, final_path: &Path) -> Result<u64> {
        // rename(2) silently replaces an existing target.
        if final_path.exists() {
            return Err(Error::io(
                "rename",
                final_path,
                io::Error::new(io::ErrorKind::AlreadyExists, "final path already exists"),
            ));
        }
        let size = fs::metadata(active).at("stat", active)?.len();
        fs::rename(active, final_path).at("rename", active)?;
        Ok(size)
    }
}
