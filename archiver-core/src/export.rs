//! Snapshot export of a single ref
//!
//! `git archive <ref>^{tree}` is streamed straight into a tar unpacker
//! targeting the snapshot folder. The mirror clone is bare, so exporting
//! never touches a working tree or index and one ref cannot leak into the
//! next. Only tracked content is written; there is no `.git` in the stream.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::git::{GitCommand, GitRef, GitRepo};
use crate::{Error, Result};

/// Attribute overrides making `git archive` emit the tree verbatim
///
/// `$GIT_DIR/info/attributes` outranks in-tree `.gitattributes`, so these
/// stop `export-ignore` from dropping files and `export-subst` from
/// rewriting them.
const VERBATIM_ATTRIBUTES: &str = "* -export-ignore -export-subst\n";

/// An exported ref on disk
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub git_ref: GitRef,
    /// Snapshot folder under the output directory
    pub dir: PathBuf,
    /// Number of files and symlinks written
    pub file_count: usize,
    /// Commit the ref pointed at; `None` for tags of bare trees
    pub commit: Option<String>,
}

/// Prepare a mirror clone so exports reproduce each tree exactly
pub fn prepare_repository(repo_dir: &Path) -> Result<()> {
    let info_dir = repo_dir.join("info");
    fs::create_dir_all(&info_dir)?;
    fs::write(info_dir.join("attributes"), VERBATIM_ATTRIBUTES)?;
    Ok(())
}

fn remove_existing(dest: &Path) -> io::Result<()> {
    match fs::symlink_metadata(dest) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(dest),
        Ok(_) => fs::remove_file(dest),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
        .count()
}

/// Export `git_ref`'s tree from the clone at `repo_dir` into `dest`
///
/// Whatever was at `dest` before is replaced. On failure `dest` is removed
/// so no half-written snapshot is mistaken for a complete one.
pub fn export_ref(git: &str, repo: &GitRepo, git_ref: &GitRef, dest: &Path) -> Result<Snapshot> {
    let fail = |reason: String| Error::Export {
        ref_name: git_ref.name.clone(),
        reason,
    };

    if repo.inner().find_reference(&git_ref.full_name).is_err() {
        return Err(fail(format!("{} not found in clone", git_ref.full_name)));
    }
    let commit = match repo.resolve_commit(&git_ref.full_name) {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::debug!(git_ref = %git_ref, "Ref does not point at a commit: {}", e);
            None
        }
    };

    remove_existing(dest)
        .and_then(|()| fs::create_dir_all(dest))
        .map_err(|e| fail(format!("cannot prepare {}: {}", dest.display(), e)))?;

    tracing::debug!(git_ref = %git_ref, dest = %dest.display(), "Exporting ref");

    let command = GitCommand::new(git)
        .arg("archive")
        .arg("--format=tar")
        .arg(format!("{}^{{tree}}", git_ref.full_name))
        .current_dir(repo.root());

    let mut child = command.spawn_piped().map_err(|e| fail(e.to_string()))?;

    let unpacked = match child.stdout.take() {
        // the reader is dropped at the end of this arm, closing the pipe so
        // git cannot block on a full pipe if unpacking stopped early
        Some(stdout) => tar::Archive::new(stdout).unpack(dest),
        None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "git stdout not captured")),
    };
    let finished = command.finish(child);

    let result = match (unpacked, finished) {
        (_, Err(e)) => Err(fail(e.to_string())),
        (Err(e), Ok(_)) => Err(fail(format!("failed to unpack tree: {}", e))),
        (Ok(()), Ok(_)) => Ok(()),
    };

    if let Err(e) = result {
        if let Err(cleanup) = remove_existing(dest) {
            tracing::warn!(dest = %dest.display(), "Failed to remove partial snapshot: {}", cleanup);
        }
        return Err(e);
    }

    let file_count = count_files(dest);
    tracing::info!(git_ref = %git_ref, files = file_count, "Exported snapshot");

    Ok(Snapshot {
        git_ref: git_ref.clone(),
        dir: dest.to_path_buf(),
        file_count,
        commit,
    })
}
