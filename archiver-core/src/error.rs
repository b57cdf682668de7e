//! Error types for the branch archiver

use thiserror::Error;

use crate::archive::ArchiveFormat;

/// Result type alias for archiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for archiver operations
#[derive(Error, Debug)]
pub enum Error {
    /// The source repository could not be cloned
    #[error("Clone failed for {location}: {reason}")]
    Clone { location: String, reason: String },

    /// The ref list could not be read from the clone
    #[error("Failed to list refs: {0}")]
    Enumeration(String),

    /// A single ref could not be exported to its snapshot folder
    #[error("Export of '{ref_name}' failed: {reason}")]
    Export { ref_name: String, reason: String },

    /// A single archive could not be written
    #[error("Writing {format} archive for '{ref_name}' failed: {reason}")]
    Archive {
        ref_name: String,
        format: ArchiveFormat,
        reason: String,
    },

    /// Two refs map onto the same output names
    #[error("'{ref_name}' would overwrite output '{output}' already claimed by '{claimed_by}'")]
    Collision {
        ref_name: String,
        output: String,
        claimed_by: String,
    },

    /// Temporary workspace could not be created
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// Manifest could not be serialized or written
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// libgit2 error
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error aborts the whole run rather than a single ref
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Export { .. } | Error::Archive { .. } | Error::Collision { .. }
        )
    }
}
