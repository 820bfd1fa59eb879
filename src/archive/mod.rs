//! Archive codec engines.
//!
//! The walker and builder never parse or produce archive bytes themselves.
//! They talk to an engine through [`ArchiveReader`] and [`ArchiveWriter`];
//! [`zip`] and [`tar`] bind those traits to the `zip` and `tar` crates.

pub mod tar;
pub mod zip;

use std::fmt;
use std::io::{self, Read};
use std::path::Path;

use anyhow::Result;

pub use self::tar::{TarEntries, TarReader};
pub use self::zip::{ZipBuilder, ZipReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
    /// Devices, fifos, hard links and anything else the engine reports.
    Other,
}

/// One item of an archive, valid until the engine is asked for the next one.
///
/// Reading an entry yields its content. Dropping it discards whatever was not
/// read.
pub struct Entry<'a> {
    pub path: String,
    pub kind: EntryKind,
    /// Declared uncompressed size.
    pub size: u64,
    pub link_target: Option<String>,
    data: Box<dyn Read + 'a>,
}

impl<'a> Entry<'a> {
    pub fn new(
        path: impl Into<String>,
        kind: EntryKind,
        size: u64,
        data: Box<dyn Read + 'a>,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            size,
            link_target: None,
            data,
        }
    }

    pub fn with_link_target(mut self, target: Option<String>) -> Self {
        self.link_target = target;
        self
    }

    /// Discard the remaining content.
    pub fn skip(self) {}
}

impl Read for Entry<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.data.read(buf)
    }
}

impl fmt::Debug for Entry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("size", &self.size)
            .field("link_target", &self.link_target)
            .finish_non_exhaustive()
    }
}

/// Read side of a codec engine: a lending iterator over entries.
pub trait ArchiveReader {
    /// `Ok(None)` at end of archive.
    fn next_entry(&mut self) -> Result<Option<Entry<'_>>>;
}

impl<A: ArchiveReader + ?Sized> ArchiveReader for &mut A {
    fn next_entry(&mut self) -> Result<Option<Entry<'_>>> {
        (**self).next_entry()
    }
}

/// Called by a writer with the fraction (0.0..=1.0) of the current file
/// written so far.
pub type WriteProgress = Box<dyn FnMut(f64) + Send>;

/// Write side of a codec engine.
pub trait ArchiveWriter {
    /// `name` ends with `/`.
    fn add_directory(&mut self, name: &str) -> Result<()>;

    /// Add the local file `source` under `name`.
    fn add_file(&mut self, name: &str, source: &Path) -> Result<()>;

    /// Replace the progress callback. It fires whenever the written fraction
    /// moves by at least `threshold`, and once at completion.
    fn register_progress(&mut self, threshold: f64, callback: WriteProgress);
}

/// Archive formats an engine is available for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveFormat {
    /// Guess the format from an archive file name or URL.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name
            .split(['?', '#'])
            .next()
            .unwrap_or(name)
            .to_ascii_lowercase();

        if name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else if name.ends_with(".tar") {
            Some(ArchiveFormat::Tar)
        } else {
            None
        }
    }
}
