use std::io::{self, Read};

use anyhow::{Context, Result};

use super::{ArchiveReader, Entry, EntryKind};

/// Tar read engine. Compressed tarballs are read by wrapping the source in
/// a decoder first (for gzip, `flate2::read::GzDecoder`).
pub struct TarReader<R: Read> {
    archive: tar::Archive<R>,
}

impl<R: Read> TarReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            archive: tar::Archive::new(reader),
        }
    }

    /// Start iterating. Only valid once per reader.
    pub fn entries(&mut self) -> io::Result<TarEntries<'_, R>> {
        Ok(TarEntries {
            entries: self.archive.entries()?,
        })
    }
}

pub struct TarEntries<'a, R: 'a + Read> {
    entries: tar::Entries<'a, R>,
}

impl<'a, R: Read + 'a> ArchiveReader for TarEntries<'a, R> {
    fn next_entry(&mut self) -> Result<Option<Entry<'_>>> {
        let Some(entry) = self.entries.next() else {
            return Ok(None);
        };
        let entry = entry.context("cannot read tar header")?;

        let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let link_target = entry
            .link_name_bytes()
            .map(|target| String::from_utf8_lossy(&target).into_owned());

        let header = entry.header();
        let entry_type = header.entry_type();
        let kind = if entry_type.is_dir() {
            EntryKind::Directory
        } else if entry_type.is_symlink() {
            EntryKind::Symlink
        } else if entry_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        let size = entry.size();

        Ok(Some(
            Entry::new(path, kind, size, Box::new(entry)).with_link_target(link_target),
        ))
    }
}
