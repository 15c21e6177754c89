//! Finalization strategies.
//!
//! A strategy turns the closed active file into its final on-disk form:
//!
//! - [`RenameFinalizer`]: atomic move to the final name
//! - [`CompressingFinalizer`]: single-entry zip archive at the final name
//!   plus [`ARCHIVE_SUFFIX`], then removal of the active file
//!
//! On failure a strategy must leave the active file intact and must not
//! leave anything at the final path.

mod compress;
mod rename;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};

pub use compress::{CompressingFinalizer, ARCHIVE_SUFFIX, DEFAULT_LEVEL};
pub use rename::RenameFinalizer;

/// Transformation applied when sealing the active file.
pub trait Finalizer: fmt::Debug + Send + Sync {
    /// Map the plain final path produced by the naming scheme to the path
    /// this strategy writes. Must be a pure function of `plain`.
    fn final_path(&self, plain: &Path) -> PathBuf;

    /// Suffix [`final_path`](Self::final_path) appends, used to recognise
    /// existing artifacts.
    fn suffix(&self) -> &str {
        ""
    }

    /// Produce the artifact at `final_path` from `active`.
    ///
    /// Returns the size of the artifact in bytes.
    fn finalize(&self, active: &Path, final_path: &Path) -> Result<u64>;
}

/// Configured finalization strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FinalizationStrategy {
    /// Atomic rename.
    Rename,

    /// Zip archive with the given deflate level (0-9, 0 stores).
    Compress {
        /// Deflate level.
        #[serde(default = "default_level")]
        level: u32,
    },

    /// Host-provided strategy. Not representable in configuration files.
    #[serde(skip)]
    Custom(Arc<dyn Finalizer>),
}

fn default_level() -> u32 {
    DEFAULT_LEVEL
}

impl Default for FinalizationStrategy {
    fn default() -> Self {
        FinalizationStrategy::Rename
    }
}

impl FinalizationStrategy {
    pub fn compressed() -> Self {
        FinalizationStrategy::Compress {
            level: DEFAULT_LEVEL,
        }
    }

    pub fn custom(finalizer: impl Finalizer + 'static) -> Self {
        FinalizationStrategy::Custom(Arc::new(finalizer))
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            FinalizationStrategy::Compress { level } if *level > 9 => Err(Error::Config(format!(
                "compression level {level} is out of range 0-9"
            ))),
            _ => Ok(()),
        }
    }

    fn with_finalizer<R>(&self, f: impl FnOnce(&dyn Finalizer) -> R) -> R {
        match self {
            FinalizationStrategy::Rename => f(&RenameFinalizer),
            FinalizationStrategy::Compress { level } => f(&CompressingFinalizer::new(*level)),
            FinalizationStrategy::Custom(finalizer) => f(finalizer.as_ref()),
        }
    }
}

impl Finalizer for FinalizationStrategy {
    fn final_path(&self, plain: &Path) -> PathBuf {
        self.with_finalizer(|finalizer| finalizer.final_path(plain))
    }

    fn suffix(&self) -> &str {
        match self {
            FinalizationStrategy::Rename => "",
            FinalizationStrategy::Compress { .. } => ARCHIVE_SUFFIX,
            FinalizationStrategy::Custom(finalizer) => finalizer.suffix(),
        }
    }

    fn finalize(&self, active: &Path, final_path: &Path) -> Result<u64> {
        self.with_finalizer(|finalizer| finalizer.finalize(active, final_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Tagged;

    impl Finalizer for Tagged {
        fn final_path(&self, plain: &Path) -> PathBuf {
            plain.with_extension("sealed")
        }

        fn suffix(&self) -> &str {
            ".sealed"
        }

        fn finalize(&self, _active: &Path, _final_path: &Path) -> Result<u64> {
            Ok(7)
        }
    }

    #[test]
    fn dispatches_by_variant() {
        let plain = Path::new("/d/log_1");
        assert_eq!(FinalizationStrategy::Rename.final_path(plain), plain);
        assert_eq!(
            FinalizationStrategy::compressed().final_path(plain),
            Path::new("/d/log_1.zip")
        );
        let custom = FinalizationStrategy::custom(Tagged);
        assert_eq!(custom.final_path(plain), Path::new("/d/log_1.sealed"));
        assert_eq!(custom.suffix(), ".sealed");
        assert_eq!(custom.finalize(plain, plain).unwrap(), 7);
    }

    #[test]
    fn level_validated() {
        assert!(FinalizationStrategy::Compress { level: 10 }.validate().is_err());
        assert!(FinalizationStrategy::Compress { level: 0 }.validate().is_ok());
    }

    #[test]
    fn serde_default_level() {
        let parsed: FinalizationStrategy = serde_json::from_str(r#"{"type":"Compress"}"#).unwrap();
        assert!(matches!(
            parsed,
            FinalizationStrategy::Compress { level: DEFAULT_LEVEL }
        ));
        let rename: FinalizationStrategy = serde_json::from_str(r#"{"type":"Rename"}"#).unwrap();
        assert!(matches!(rename, FinalizationStrategy::Rename));
    }
}
