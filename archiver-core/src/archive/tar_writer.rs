//! Plain tar encoding

use std::io::{self, Write};

use tar::{Builder, HeaderMode};

use super::{EntryKind, TreeEntry};

pub(super) fn write<W: Write>(entries: &[TreeEntry], writer: W) -> io::Result<W> {
    let mut builder = Builder::new(writer);
    // fixed mtime and owner; keeps only the executable bit of the mode
    builder.mode(HeaderMode::Deterministic);
    builder.follow_symlinks(false);

    for entry in entries {
        match entry.kind {
            EntryKind::Dir => builder.append_dir(&entry.rel, &entry.path)?,
            EntryKind::File | EntryKind::Symlink => {
                builder.append_path_with_name(&entry.path, &entry.rel)?
            }
        }
    }

    builder.into_inner()
}
