use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A filesystem operation failed. `op` names the operation and `path`
    /// the file it was applied to.
    #[error("{op} failed for {path:?}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Rejected at construction time; nothing was touched on disk.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The call is not valid in the writer's current state.
    #[error("invalid state: {0}")]
    State(&'static str),
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Path of the file involved, for I/O failures.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::Io { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Attaches the failed operation and offending path to an `io::Result`.
pub(crate) trait IoContext<T> {
    fn at(self, op: &'static str, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, op: &'static str, path: &Path) -> Result<T> {
        self.map_err(|source| Error::io(op, path, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn io_error_carries_path_and_op() {
        let err = Err::<(), _>(io::Error::new(io::ErrorKind::NotFound, "gone"))
            .at("rename", Path::new("/data/.events"))
            .unwrap_err();
        assert!(err.is_io());
        assert_eq!(err.path(), Some(Path::new("/data/.events")));
        let msg = err.to_string();
        assert!(msg.contains("rename"));
        assert!(msg.contains("/data/.events"));
    }

    #[test]
    fn config_error_has_no_path() {
        let err = Error::Config("cycle size must be non-zero".to_string());
        assert!(!err.is_io());
        assert!(err.path().is_none());
    }
}
