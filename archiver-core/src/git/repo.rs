//! Access to the mirror clone through libgit2

use std::path::{Path, PathBuf};

use git2::Repository;

use crate::{Error, Result};

/// A git repository wrapper used to inspect the mirror clone
pub struct GitRepo {
    /// The underlying git2 repository
    repo: Repository,
    /// Path to the repository (the git dir for bare clones)
    root: PathBuf,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo")
            .field("root", &self.root)
            .field("bare", &self.repo.is_bare())
            .finish_non_exhaustive()
    }
}

impl GitRepo {
    /// Open the repository at exactly `path`, bare or not
    ///
    /// Unlike discovery this does not search parent directories, so a stray
    /// enclosing repository can never be picked up by mistake.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let repo = Repository::open(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::Config(format!("Not a git repository: {}", path.display()))
            } else {
                Error::Git(e)
            }
        })?;

        Ok(Self {
            repo,
            root: path.to_path_buf(),
        })
    }

    /// Get the repository path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a fully qualified ref (`refs/heads/main`, `refs/tags/v1`) to its commit id
    ///
    /// Annotated tags are peeled to the commit they point at.
    pub fn resolve_commit(&self, full_name: &str) -> Result<String> {
        let reference = self.repo.find_reference(full_name)?;
        let commit = reference.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    /// Get access to the underlying git2 repository
    pub fn inner(&self) -> &Repository {
        &self.repo
    }
}
