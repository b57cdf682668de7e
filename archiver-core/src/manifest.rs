//! Run manifest written next to the archives
//!
//! `<out>/.git-archiver-manifest.toml` records where the archives came from:
//! the source, when the run happened, and for every ref the commit it
//! pointed at plus the size and SHA-256 of each archive. Refs that failed are
//! listed with their error so the manifest accounts for the whole ref set.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::archive::{ArchiveFile, ArchiveFormat};
use crate::git::RefKind;
use crate::pipeline::RefOutcome;
use crate::{Error, Result};

/// File name of the manifest inside the output directory
pub const MANIFEST_FILE: &str = ".git-archiver-manifest.toml";

/// One archive of an exported ref
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestArchive {
    pub format: ArchiveFormat,
    /// File name relative to the output directory
    pub file: String,
    pub size: u64,
    pub sha256: String,
}

impl ManifestArchive {
    fn from_file(archive: &ArchiveFile) -> Self {
        let file = archive
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            format: archive.format,
            file,
            size: archive.size,
            sha256: archive.sha256.clone(),
        }
    }
}

/// Manifest record for a single ref
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub kind: RefKind,
    /// Short ref name (`feature/x`)
    pub name: String,
    /// Fully qualified ref (`refs/heads/feature/x`)
    pub full_ref: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,

    /// When the snapshot finished exporting
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub exported_at: Option<SystemTime>,

    /// Snapshot folder relative to the output directory
    pub folder: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_count: Option<usize>,

    /// Every error hit while processing this ref
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    #[serde(default)]
    pub archives: Vec<ManifestArchive>,
}

impl ManifestEntry {
    fn from_outcome(outcome: &RefOutcome) -> Self {
        let snapshot = outcome.snapshot.as_ref();

        Self {
            kind: outcome.git_ref.kind,
            name: outcome.git_ref.name.clone(),
            full_ref: outcome.git_ref.full_name.clone(),
            commit: snapshot.and_then(|s| s.commit.clone()),
            exported_at: outcome.exported_at,
            folder: outcome.stem.clone(),
            file_count: snapshot.map(|s| s.file_count),
            errors: outcome.errors.iter().map(ToString::to_string).collect(),
            archives: outcome
                .archives
                .iter()
                .map(ManifestArchive::from_file)
                .collect(),
        }
    }

    /// Whether the ref was exported and archived without error
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Contents of the manifest file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Version of the tool that wrote the archives
    pub tool_version: String,

    /// Repository location as given on the command line
    pub source: String,

    #[serde(with = "humantime_serde")]
    pub started_at: SystemTime,

    #[serde(with = "humantime_serde")]
    pub finished_at: SystemTime,

    #[serde(default, rename = "ref")]
    pub refs: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build a manifest from per-ref outcomes, in the order given
    pub fn new(
        source: impl Into<String>,
        started_at: SystemTime,
        outcomes: &[RefOutcome],
    ) -> Self {
        Self {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            source: source.into(),
            started_at,
            finished_at: SystemTime::now(),
            refs: outcomes.iter().map(ManifestEntry::from_outcome).collect(),
        }
    }

    /// Path of the manifest for an output directory
    pub fn path_in(out_dir: &Path) -> PathBuf {
        out_dir.join(MANIFEST_FILE)
    }

    /// Load the manifest from an output directory
    pub fn load(out_dir: &Path) -> Result<Self> {
        let path = Self::path_in(out_dir);
        let contents = fs::read_to_string(&path)
            .map_err(|e| Error::Manifest(format!("Failed to read {}: {}", path.display(), e)))?;

        toml::from_str(&contents)
            .map_err(|e| Error::Manifest(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Write the manifest into an output directory, replacing any previous one
    pub fn save(&self, out_dir: &Path) -> Result<PathBuf> {
        let path = Self::path_in(out_dir);
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Manifest(format!("Failed to serialize manifest: {}", e)))?;

        fs::write(&path, contents)
            .map_err(|e| Error::Manifest(format!("Failed to write {}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), refs = self.refs.len(), "Wrote manifest");
        Ok(path)
    }

    /// Look up a ref's entry by kind and short name
    pub fn entry(&self, kind: RefKind, name: &str) -> Option<&ManifestEntry> {
        self.refs.iter().find(|e| e.kind == kind && e.name == name)
    }
}
