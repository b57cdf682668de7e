//! Temporary workspace holding the mirror clone
//!
//! A [`Workspace`] owns one uniquely named directory for the duration of a
//! run. Dropping it removes the directory, so every exit path (early `?`
//! return, panic unwinding, the CLI's interrupt handler) releases the clone.
//! With `keep` set the directory is left in place and its path logged.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use crate::{Error, Result};

/// Prefix for workspace directory names
const WORKSPACE_PREFIX: &str = "git-archiver-";

/// Removal passes made by [`Workspace::abandon`] after the first
const ABANDON_ATTEMPTS: usize = 3;
const ABANDON_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Scoped owner of the temporary clone directory
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
    keep: bool,
}

impl Workspace {
    /// Create a fresh workspace under `parent` (the system temp dir when `None`)
    pub fn create(parent: Option<&Path>, keep: bool) -> Result<Self> {
        let parent = parent
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);

        fs::create_dir_all(&parent).map_err(|e| {
            Error::Workspace(format!(
                "Failed to create temp parent {}: {}",
                parent.display(),
                e
            ))
        })?;

        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(&parent)
            .map_err(|e| {
                Error::Workspace(format!(
                    "Failed to create workspace in {}: {}",
                    parent.display(),
                    e
                ))
            })?;

        let path = dir.path().to_path_buf();
        tracing::debug!(path = %path.display(), keep, "Created temporary workspace");

        Ok(Self {
            dir: Some(dir),
            path,
            keep,
        })
    }

    /// Path of the workspace directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the workspace now, returning the path if it was kept
    pub fn close(mut self) -> Option<PathBuf> {
        self.release()
    }

    /// Release the workspace while a git child may still be writing into it
    ///
    /// Anything the child recreates after the first removal is removed again,
    /// a few times over a short window.
    pub fn abandon(self) -> Option<PathBuf> {
        let path = self.path.clone();
        let kept = self.close();
        if kept.is_some() {
            return kept;
        }

        for _ in 0..ABANDON_ATTEMPTS {
            thread::sleep(ABANDON_RETRY_DELAY);
            if !path.exists() {
                break;
            }
            if let Err(e) = fs::remove_dir_all(&path) {
                tracing::debug!(path = %path.display(), "Retrying workspace removal: {}", e);
            }
        }

        if path.exists() {
            tracing::warn!(path = %path.display(), "Temporary workspace could not be fully removed");
        }
        None
    }

    fn release(&mut self) -> Option<PathBuf> {
        let dir = self.dir.take()?;

        if self.keep {
            let path = dir.keep();
            tracing::warn!(path = %path.display(), "Keeping temporary workspace");
            return Some(path);
        }

        match dir.close() {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed temporary workspace"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                "Failed to remove temporary workspace: {}",
                e
            ),
        }

        None
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let parent = TempDir::new().unwrap();
        let path = {
            let ws = Workspace::create(Some(parent.path()), false).unwrap();
            std::fs::write(ws.path().join("file"), "data").unwrap();
            assert!(ws.path().exists());
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_kept_on_drop() {
        let parent = TempDir::new().unwrap();
        let ws = Workspace::create(Some(parent.path()), true).unwrap();
        let path = ws.path().to_path_buf();
        drop(ws);
        assert!(path.exists());
    }

    #[test]
    fn test_close_reports_kept_path() {
        let parent = TempDir::new().unwrap();
        let ws = Workspace::create(Some(parent.path()), true).unwrap();
        let expected = ws.path().to_path_buf();
        assert_eq!(ws.close(), Some(expected));

        let ws = Workspace::create(Some(parent.path()), false).unwrap();
        let path = ws.path().to_path_buf();
        assert_eq!(ws.close(), None);
        assert!(!path.exists());
    }

    #[test]
    fn test_abandon_removes_files_written_after_release() {
        let parent = TempDir::new().unwrap();
        let ws = Workspace::create(Some(parent.path()), false).unwrap();
        let path = ws.path().to_path_buf();

        // stands in for a git child that keeps writing after the interrupt
        let writer = {
            let path = path.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                let _ = std::fs::create_dir_all(path.join("objects"));
                let _ = std::fs::write(path.join("objects/pack"), "data");
            })
        };

        assert_eq!(ws.abandon(), None);
        writer.join().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_abandon_honors_keep() {
        let parent = TempDir::new().unwrap();
        let ws = Workspace::create(Some(parent.path()), true).unwrap();
        let expected = ws.path().to_path_buf();
        assert_eq!(ws.abandon(), Some(expected.clone()));
        assert!(expected.exists());
    }

    #[test]
    fn test_name_and_parent() {
        let parent = TempDir::new().unwrap();
        let nested = parent.path().join("not").join("yet");
        let ws = Workspace::create(Some(&nested), false).unwrap();

        assert_eq!(ws.path().parent(), Some(nested.as_path()));
        let name = ws.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(WORKSPACE_PREFIX));
    }

    #[test]
    fn test_removed_on_unwind() {
        let parent = TempDir::new().unwrap();
        let parent_path = parent.path().to_path_buf();

        let result = std::panic::catch_unwind(move || {
            let _ws = Workspace::create(Some(&parent_path), false).unwrap();
            panic!("boom");
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }
}
