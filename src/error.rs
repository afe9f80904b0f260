use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Fatal errors on a compared root. Problems below the root are
/// recorded as [`ScanWarning`]s instead.
#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error("Folder does not exist: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("Cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FilesystemError {
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => FilesystemError::NotFound { path },
            io::ErrorKind::PermissionDenied => FilesystemError::PermissionDenied { path },
            _ => FilesystemError::Io { path, source: err },
        }
    }
}

/// An entry that was skipped during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub message: String,
}

impl ScanWarning {
    pub fn new(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
