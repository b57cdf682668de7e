//! Branch and tag enumeration

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::command::GitCommand;
use crate::{Error, Result};

/// Which namespace a ref lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Branch,
    Tag,
}

impl RefKind {
    /// Namespace prefix under `refs/`
    pub fn prefix(self) -> &'static str {
        match self {
            RefKind::Branch => "refs/heads/",
            RefKind::Tag => "refs/tags/",
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKind::Branch => f.write_str("branch"),
            RefKind::Tag => f.write_str("tag"),
        }
    }
}

/// A branch or tag selected for export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRef {
    /// Branch or tag
    pub kind: RefKind,
    /// Short name, e.g. `feature/x`
    pub name: String,
    /// Fully qualified name, e.g. `refs/heads/feature/x`
    pub full_name: String,
}

impl GitRef {
    /// Build from a fully qualified name, if it belongs to `kind`'s namespace
    pub fn from_full_name(kind: RefKind, full_name: &str) -> Option<Self> {
        let name = full_name.strip_prefix(kind.prefix())?;
        if name.is_empty() {
            return None;
        }

        Some(Self {
            kind,
            name: name.to_string(),
            full_name: full_name.to_string(),
        })
    }
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// List every ref of one kind, sorted by short name
fn list_kind(git: &str, repo_dir: &Path, kind: RefKind) -> Result<Vec<GitRef>> {
    let namespace = kind.prefix().trim_end_matches('/');

    let output = GitCommand::new(git)
        .arg("for-each-ref")
        .arg("--format=%(refname)")
        .arg(namespace)
        .current_dir(repo_dir)
        .output()
        .map_err(|e| Error::Enumeration(e.to_string()))?;

    let mut refs: Vec<GitRef> = output
        .stdout_lines()
        .iter()
        .filter_map(|line| GitRef::from_full_name(kind, line))
        .collect();

    refs.sort_by(|a, b| a.name.cmp(&b.name));
    refs.dedup_by(|a, b| a.name == b.name);

    Ok(refs)
}

/// List the refs to export: all branches, then (optionally) all tags
///
/// Each group is sorted lexicographically so repeated runs produce the same
/// order. An empty repository yields an empty list, not an error.
pub fn list_refs(git: &str, repo_dir: &Path, include_tags: bool) -> Result<Vec<GitRef>> {
    let mut refs = list_kind(git, repo_dir, RefKind::Branch)?;
    let branch_count = refs.len();

    if include_tags {
        refs.extend(list_kind(git, repo_dir, RefKind::Tag)?);
    }

    tracing::info!(
        branches = branch_count,
        tags = refs.len() - branch_count,
        "Enumerated refs"
    );

    Ok(refs)
}
