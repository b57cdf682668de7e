//! Zip encoding

use std::fs::{self, File};
use std::io::{self, Seek, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::{unix_mode, EntryKind, TreeEntry};

/// Zip member names always use `/`, whatever the host separator
fn member_name(entry: &TreeEntry) -> io::Result<String> {
    let parts: Option<Vec<&str>> = entry
        .rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect();

    parts.map(|p| p.join("/")).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("non UTF-8 path cannot be stored in zip: {}", entry.rel.display()),
        )
    })
}

pub(super) fn write<W: Write + Seek>(entries: &[TreeEntry], writer: W) -> io::Result<W> {
    let mut zip = ZipWriter::new(writer);

    // DOS epoch for every member so the output only depends on content
    let base = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    for entry in entries {
        let name = member_name(entry)?;
        let metadata = fs::symlink_metadata(&entry.path)?;

        match entry.kind {
            EntryKind::Dir => {
                zip.add_directory(
                    format!("{}/", name),
                    base.unix_permissions(unix_mode(&metadata)),
                )?;
            }
            EntryKind::File => {
                let options = base
                    .unix_permissions(unix_mode(&metadata))
                    .large_file(metadata.len() >= u32::MAX as u64);
                zip.start_file(name, options)?;
                let mut file = File::open(&entry.path)?;
                io::copy(&mut file, &mut zip)?;
            }
            EntryKind::Symlink => {
                let target = fs::read_link(&entry.path)?;
                let target = target.to_str().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("non UTF-8 symlink target for {}", entry.rel.display()),
                    )
                })?;
                zip.add_symlink(name, target, base)?;
            }
        }
    }

    Ok(zip.finish()?)
}
