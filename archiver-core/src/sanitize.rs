//! Filesystem-safe output names for refs
//!
//! One sanitized stem names everything a ref produces: the snapshot folder
//! `<stem>/` and the archives `<stem>.zip` and `<stem>.tar`. Stems never start
//! with `.`, which leaves dot-names free for the manifest and partial files.

use std::collections::{HashMap, HashSet};

use crate::archive::ArchiveFormat;
use crate::git::{GitRef, RefKind};
use crate::Error;

/// Replacement for path separators
const SEPARATOR_REPLACEMENT: &str = "__";

/// Map a ref name onto a single safe path component
///
/// `/` becomes `__`; backslash, `: * ? " < > |`, whitespace and control
/// characters become `_`. Case is preserved and nothing is collapsed, so
/// distinct ref names only meet when one literally spells the other's
/// replacement or the two differ only by case (see [`OutputPlan`]).
pub fn sanitize_ref_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());

    for c in name.chars() {
        match c {
            '/' => out.push_str(SEPARATOR_REPLACEMENT),
            '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => out.push('_'),
            c if c.is_control() || c.is_whitespace() => out.push('_'),
            c => out.push(c),
        }
    }

    if out.is_empty() || out.starts_with('.') || out.starts_with('-') {
        out.insert(0, '_');
    }

    out
}

/// A ref with the stem its outputs will use
#[derive(Debug, Clone)]
pub struct PlannedRef {
    pub git_ref: GitRef,
    pub stem: String,
}

impl PlannedRef {
    /// Every name this ref writes directly under the output directory
    pub fn output_names(&self) -> Vec<String> {
        let mut names = vec![self.stem.clone()];
        names.extend(
            ArchiveFormat::ALL
                .iter()
                .map(|format| format.file_name(&self.stem)),
        );
        names
    }
}

/// Stem prefix for a tag whose short name is also a branch
const TAG_STEM_PREFIX: &str = "tags__";

/// Assignment of output names to refs, with collisions set aside
#[derive(Debug, Default)]
pub struct OutputPlan {
    /// Refs that got their names, in enumeration order
    pub accepted: Vec<PlannedRef>,
    /// Refs whose names were already taken, with the [`Error::Collision`] to report
    pub rejected: Vec<(PlannedRef, Error)>,
}

impl OutputPlan {
    /// Claim output names in order; the first ref to claim a name keeps it
    ///
    /// A tag sharing its short name with a branch gets the stem
    /// `tags__<name>` so both are kept. Names are compared case-insensitively,
    /// since `Feature.zip` and `feature.zip` are one file on macOS and Windows.
    pub fn build(refs: Vec<GitRef>) -> Self {
        let branches: HashSet<String> = refs
            .iter()
            .filter(|r| r.kind == RefKind::Branch)
            .map(|r| r.name.clone())
            .collect();

        let mut plan = Self::default();
        // case-folded output name -> (name as written, owner)
        let mut claimed: HashMap<String, (String, String)> = HashMap::new();

        for git_ref in refs {
            let mut stem = sanitize_ref_name(&git_ref.name);
            if git_ref.kind == RefKind::Tag && branches.contains(&git_ref.name) {
                stem.insert_str(0, TAG_STEM_PREFIX);
            }
            let planned = PlannedRef { git_ref, stem };
            let names = planned.output_names();

            let clash = names.iter().find_map(|n| {
                claimed
                    .get(&n.to_lowercase())
                    .map(|(taken, owner)| (taken.clone(), owner.clone()))
            });

            if let Some((output, owner)) = clash {
                tracing::error!(
                    ref_name = %planned.git_ref.name,
                    output = %output,
                    claimed_by = %owner,
                    "Output name collision, skipping ref"
                );
                let err = Error::Collision {
                    ref_name: planned.git_ref.name.clone(),
                    output,
                    claimed_by: owner,
                };
                plan.rejected.push((planned, err));
                continue;
            }

            let owner = planned.git_ref.to_string();
            for name in names {
                claimed.insert(name.to_lowercase(), (name, owner.clone()));
            }
            plan.accepted.push(planned);
        }

        plan
    }
}
