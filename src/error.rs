use thiserror::Error;

/// Errors of the archive engine (codec + index).
///
/// Nothing here is recoverable inside the engine: a run that hits any of them
/// must abort without writing the archive back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("corrupt archive: {reason}")]
    Corrupt { reason: String },

    #[error("corrupt archive: unsupported format version {version}")]
    UnsupportedVersion { version: u32 },

    #[error("duplicate key in archive: {key}")]
    DuplicateKey { key: String },
}

impl ArchiveError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        ArchiveError::Corrupt {
            reason: reason.into(),
        }
    }

    /// True for every "the bytes do not follow the format" case, including
    /// an unknown format version.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            ArchiveError::Corrupt { .. } | ArchiveError::UnsupportedVersion { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
