use std::io;
use std::path::{Path, PathBuf};

use overlaykit_core::ArtifactKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("required directory does not exist: {}", path.display())]
    MissingPrerequisiteDirectory { path: PathBuf },

    #[error("failed to extract archive {}: {reason}", archive.display())]
    ArchiveExtractionFailed { archive: PathBuf, reason: String },

    #[error("extracted {} artifact not found: {}", kind.as_str(), path.display())]
    MissingExtractedArtifact { kind: ArtifactKind, path: PathBuf },

    #[error(
        "{} is held open by another process; close the process using it and retry",
        path.display()
    )]
    DirectoryLocked {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to rename {} to {}", from.display(), to.display())]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} artifact is not available: {reason}", kind.as_str())]
    ArtifactUnavailable { kind: ArtifactKind, reason: String },

    #[error("failed to encode or decode {}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "another install attempt is in progress or was interrupted (attempt={attempt_id}); run recover first"
    )]
    TransactionInProgress { attempt_id: String },

    #[error("invalid install request: {0}")]
    InvalidRequest(String),
}

impl InstallError {
    /// Wraps an I/O error, promoting "held by another process" failures to
    /// [`InstallError::DirectoryLocked`].
    pub fn io(path: &Path, action: &str, source: io::Error) -> Self {
        if is_locked_error(&source) {
            return Self::DirectoryLocked {
                path: path.to_path_buf(),
                source,
            };
        }
        Self::Io {
            context: format!("failed to {action} {}", path.display()),
            source,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Self::DirectoryLocked { .. })
    }
}

pub(crate) fn is_locked_error(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::ResourceBusy {
        return true;
    }

    // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(err.raw_os_error(), Some(32) | Some(33))
}
