//! Git operations for the archiver
//!
//! This module covers cloning the source, enumerating its refs and the typed
//! wrapper every git subprocess runs through.

mod clone;
mod command;
mod refs;
mod repo;

pub use clone::{clone_mirror, RepoLocation, MIRROR_DIR};
pub use command::{CommandError, GitCommand, GitOutput};
pub use refs::{list_refs, GitRef, RefKind};
pub use repo::GitRepo;
