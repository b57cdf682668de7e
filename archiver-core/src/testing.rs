//! Throwaway git repositories for tests

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

use crate::git::GitCommand;

/// A non-bare repository in a temp directory, driven through the git CLI
pub(crate) struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// `git init` with `main` as the initial branch
    pub fn new() -> Self {
        let repo = Self {
            dir: TempDir::new().unwrap(),
        };
        repo.git(&["init", "--quiet", "-b", "main"]);
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Run git in the repository and return trimmed stdout
    pub fn git(&self, args: &[&str]) -> String {
        let output = GitCommand::new("git")
            .args(["-c", "commit.gpgsign=false", "-c", "tag.gpgsign=false"])
            .args(args)
            .current_dir(self.path())
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_CONFIG_GLOBAL", "/dev/null")
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .output()
            .unwrap();
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Write a file relative to the repository root, creating parents
    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    /// Stage everything and commit
    pub fn commit_all(&self, message: &str) {
        self.git(&["add", "--all"]);
        self.git(&["commit", "--quiet", "-m", message]);
    }

    /// Create and switch to a new branch
    pub fn branch(&self, name: &str) {
        self.git(&["checkout", "--quiet", "-b", name]);
    }

    pub fn checkout(&self, name: &str) {
        self.git(&["checkout", "--quiet", name]);
    }

    pub fn tag(&self, name: &str) {
        self.git(&["tag", name]);
    }

    pub fn annotated_tag(&self, name: &str) {
        self.git(&["tag", "-a", name, "-m", name]);
    }
}

/// What a path in a directory tree holds, for whole-tree comparisons
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TreeItem {
    Dir,
    File { contents: Vec<u8>, executable: bool },
    Symlink(PathBuf),
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

/// Map every path under `root` (relative, `/`-separated) to its content
pub(crate) fn read_tree(root: &Path) -> BTreeMap<String, TreeItem> {
    let mut tree = BTreeMap::new();

    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.unwrap();
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap()
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let item = if entry.file_type().is_symlink() {
            TreeItem::Symlink(fs::read_link(entry.path()).unwrap())
        } else if entry.file_type().is_dir() {
            TreeItem::Dir
        } else {
            TreeItem::File {
                contents: fs::read(entry.path()).unwrap(),
                executable: is_executable(&entry.metadata().unwrap()),
            }
        };
        tree.insert(rel, item);
    }

    tree
}

/// Extract a zip archive, recreating directories, modes and symlinks
pub(crate) fn unpack_zip(archive: &Path, dest: &Path) {
    let mut zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();

    for i in 0..zip.len() {
        let mut member = zip.by_index(i).unwrap();
        let out = dest.join(member.name().trim_end_matches('/'));
        let mode = member.unix_mode();

        if member.is_dir() {
            fs::create_dir_all(&out).unwrap();
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).unwrap();
        }

        let mut data = Vec::new();
        member.read_to_end(&mut data).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            if mode.is_some_and(|m| m & 0o170000 == 0o120000) {
                let target = String::from_utf8(data).unwrap();
                std::os::unix::fs::symlink(target, &out).unwrap();
                continue;
            }
            fs::write(&out, &data).unwrap();
            if let Some(m) = mode {
                fs::set_permissions(&out, fs::Permissions::from_mode(m & 0o7777)).unwrap();
            }
        }

        #[cfg(not(unix))]
        {
            let _ = mode;
            fs::write(&out, &data).unwrap();
        }
    }
}
