//! Archiver Core - back up every branch of a git repository
//!
//! A run clones the source into a temporary workspace, enumerates its
//! branches (and optionally tags), exports each ref's tree into its own
//! folder under the output directory and packages every folder as a `.zip`
//! and a `.tar`. [`Archiver`] drives the whole pipeline.

pub mod archive;
pub mod config;
pub mod error;
pub mod export;
pub mod git;
pub mod manifest;
pub mod pipeline;
pub mod sanitize;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use archive::{ArchiveFile, ArchiveFormat};
pub use config::{CliOverrides, Config};
pub use error::{Error, Result};
pub use export::Snapshot;
pub use git::{GitRef, RefKind, RepoLocation};
pub use manifest::{Manifest, MANIFEST_FILE};
pub use pipeline::{
    ArchiveOptions, Archiver, RefOutcome, RunReport, EXIT_FATAL, EXIT_INTERRUPTED, EXIT_PARTIAL,
    EXIT_SUCCESS,
};
pub use sanitize::sanitize_ref_name;
pub use workspace::Workspace;
