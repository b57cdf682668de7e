//! Repository location parsing and mirror cloning

use std::fmt;
use std::path::{Path, PathBuf};

use super::command::{CommandError, GitCommand};
use crate::{Error, Result};

/// Directory name of the mirror clone inside the workspace
pub const MIRROR_DIR: &str = "repo.git";

/// Where the source repository lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoLocation {
    /// A path on the local filesystem
    Local(PathBuf),
    /// Anything git reaches over a transport (`https://`, `ssh://`, `git@host:path`, ...)
    Remote(String),
}

impl RepoLocation {
    /// Classify a `--repo` argument
    ///
    /// Supports:
    /// - `https://host/owner/repo(.git)`, `ssh://`, `git://`, `file://`
    /// - `git@host:owner/repo.git` (scp-like syntax)
    /// - anything else is treated as a local path
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if input.is_empty() {
            return Err(Error::Config("Repository location is empty".to_string()));
        }

        if input.contains("://") {
            return match url::Url::parse(input) {
                Ok(url) if url.scheme() == "file" => url
                    .to_file_path()
                    .map(Self::Local)
                    .map_err(|_| Error::Config(format!("Invalid file URL: {}", input))),
                Ok(_) => Ok(Self::Remote(input.to_string())),
                Err(e) => Err(Error::Config(format!(
                    "Invalid repository URL {}: {}",
                    input, e
                ))),
            };
        }

        // scp-like: user@host:path, but not a Windows drive path like C:\repo
        if let Some((user_host, path)) = input.split_once(':') {
            if user_host.contains('@') && !user_host.contains('/') && !path.is_empty() {
                return Ok(Self::Remote(input.to_string()));
            }
        }

        Ok(Self::Local(PathBuf::from(input)))
    }

    /// The argument handed to `git clone`
    pub fn clone_source(&self) -> String {
        match self {
            Self::Local(path) => path.to_string_lossy().into_owned(),
            Self::Remote(url) => url.clone(),
        }
    }
}

impl fmt::Display for RepoLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => f.write_str(url),
        }
    }
}

/// Make a complete mirror clone of `location` inside `workspace`
///
/// `git clone --mirror` fetches every branch into `refs/heads/*` and every tag
/// into `refs/tags/*` with full history. The result is a bare repository, so
/// there is no working tree or index for later steps to disturb.
pub fn clone_mirror(git: &str, location: &RepoLocation, workspace: &Path) -> Result<PathBuf> {
    let target_dir = workspace.join(MIRROR_DIR);

    if let RepoLocation::Local(path) = location {
        if !path.exists() {
            return Err(Error::Clone {
                location: location.to_string(),
                reason: "Repository path does not exist".to_string(),
            });
        }
    }

    tracing::info!(source = %location, target = %target_dir.display(), "Cloning repository");

    GitCommand::new(git)
        .arg("clone")
        .arg("--mirror")
        .arg("--quiet")
        .arg(location.clone_source())
        .arg(&target_dir)
        // never block on a credential prompt
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(|e| classify_clone_failure(location, e))?;

    tracing::info!(target = %target_dir.display(), "Clone complete");

    Ok(target_dir)
}

fn classify_clone_failure(location: &RepoLocation, err: CommandError) -> Error {
    let stderr = err.stderr();

    let reason = if let CommandError::Spawn { .. } = err {
        err.to_string()
    } else if stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("could not read Username")
    {
        format!(
            "Authentication failed. Check your credentials or repository access. ({})",
            stderr
        )
    } else if stderr.contains("Could not resolve host") || stderr.contains("unable to access") {
        format!("Network error. Check your connection. ({})", stderr)
    } else if stderr.contains("not found")
        || stderr.contains("does not exist")
        || stderr.contains("not appear to be a git repository")
    {
        format!("Repository not found. Check the location is correct. ({})", stderr)
    } else {
        err.to_string()
    };

    Error::Clone {
        location: location.to_string(),
        reason,
    }
}
