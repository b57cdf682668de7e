//! Zip and tar encoding of exported snapshots
//!
//! Both formats are written for every ref. Members are added in sorted
//! traversal order with normalized timestamps, so the same tree always
//! produces the same bytes. Each archive is written to a hidden `.partial`
//! file first and renamed into place only once complete.

mod tar_writer;
mod zip_writer;

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::{Error, Result};

/// Archive container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    /// Zip with deflate compression
    Zip,
    /// Plain, uncompressed tar
    Tar,
}

impl ArchiveFormat {
    /// Every format written per ref, in write order
    pub const ALL: [ArchiveFormat; 2] = [ArchiveFormat::Zip, ArchiveFormat::Tar];

    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
        }
    }

    /// `<stem>.<ext>`
    pub fn file_name(self, stem: &str) -> String {
        format!("{}.{}", stem, self.extension())
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A finished archive on disk
#[derive(Debug, Clone)]
pub struct ArchiveFile {
    pub format: ArchiveFormat,
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Hex SHA-256 of the archive file
    pub sha256: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    File,
    Symlink,
}

/// One member to store, relative to the snapshot root
#[derive(Debug, Clone)]
struct TreeEntry {
    path: PathBuf,
    rel: PathBuf,
    kind: EntryKind,
}

/// Walk `root` in sorted order, excluding the root itself
fn collect_entries(root: &Path) -> io::Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        let file_type = entry.file_type();

        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        };

        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
            .to_path_buf();

        entries.push(TreeEntry {
            path: entry.path().to_path_buf(),
            rel,
            kind,
        });
    }

    Ok(entries)
}

#[cfg(unix)]
fn unix_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn unix_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.is_dir() {
        0o755
    } else {
        0o644
    }
}

/// Hex SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut file = File::open(path)?;
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn partial_path(out_dir: &Path, file_name: &str) -> PathBuf {
    out_dir.join(format!(".{}.partial", file_name))
}

fn write_to(format: ArchiveFormat, entries: &[TreeEntry], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);

    let file = match format {
        ArchiveFormat::Zip => zip_writer::write(entries, writer)?,
        ArchiveFormat::Tar => tar_writer::write(entries, writer)?,
    };

    file.into_inner()
        .map_err(io::IntoInnerError::into_error)?
        .sync_all()
}

/// Write `source_dir` as `<out_dir>/<stem>.<ext>`
///
/// Any file already at the destination is replaced. On failure no partial
/// archive is left behind.
pub fn write_archive(
    format: ArchiveFormat,
    source_dir: &Path,
    out_dir: &Path,
    stem: &str,
    ref_name: &str,
) -> Result<ArchiveFile> {
    let file_name = format.file_name(stem);
    let final_path = out_dir.join(&file_name);
    let partial = partial_path(out_dir, &file_name);

    let fail = |e: io::Error| Error::Archive {
        ref_name: ref_name.to_string(),
        format,
        reason: e.to_string(),
    };

    let result = collect_entries(source_dir)
        .and_then(|entries| write_to(format, &entries, &partial))
        .and_then(|()| fs::rename(&partial, &final_path));

    if let Err(e) = result {
        if partial.exists() {
            if let Err(cleanup) = fs::remove_file(&partial) {
                tracing::warn!(path = %partial.display(), "Failed to remove partial archive: {}", cleanup);
            }
        }
        return Err(fail(e));
    }

    let size = fs::metadata(&final_path).map_err(fail)?.len();
    let sha256 = sha256_file(&final_path).map_err(fail)?;

    tracing::info!(
        ref_name,
        format = %format,
        path = %final_path.display(),
        size,
        "Wrote archive"
    );

    Ok(ArchiveFile {
        format,
        path: final_path,
        size,
        sha256,
    })
}

/// Write every format for one snapshot, one result per format
pub fn write_all(
    source_dir: &Path,
    out_dir: &Path,
    stem: &str,
    ref_name: &str,
) -> Vec<Result<ArchiveFile>> {
    ArchiveFormat::ALL
        .iter()
        .map(|&format| write_archive(format, source_dir, out_dir, stem, ref_name))
        .collect()
}
