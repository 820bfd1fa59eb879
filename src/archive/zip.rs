use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{ArchiveReader, ArchiveWriter, Entry, EntryKind, WriteProgress};
use crate::config::{Compression, Config};

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Zip read engine over any seekable byte source.
pub struct ZipReader<R: Read + Seek> {
    archive: ZipArchive<R>,
    index: usize,
}

impl<R: Read + Seek> ZipReader<R> {
    /// Reads the central directory; this is where a remote source sees its
    /// end-relative seeks.
    pub fn new(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader).context("cannot read zip central directory")?;
        Ok(Self { archive, index: 0 })
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }
}

impl<R: Read + Seek> ArchiveReader for ZipReader<R> {
    fn next_entry(&mut self) -> Result<Option<Entry<'_>>> {
        if self.index >= self.archive.len() {
            return Ok(None);
        }

        let index = self.index;
        self.index += 1;

        let file = self
            .archive
            .by_index(index)
            .with_context(|| format!("cannot read zip entry #{index}"))?;

        let kind = if file.is_dir() {
            EntryKind::Directory
        } else if file.unix_mode().is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            EntryKind::Symlink
        } else {
            EntryKind::File
        };
        let path = file.name().to_string();
        let size = file.size();

        Ok(Some(Entry::new(path, kind, size, Box::new(file))))
    }
}

/// Zip write engine.
pub struct ZipBuilder<W: Write + Seek> {
    zip: ZipWriter<W>,
    options: SimpleFileOptions,
    buffer: Vec<u8>,
    progress: Option<(f64, WriteProgress)>,
}

impl<W: Write + Seek> ZipBuilder<W> {
    pub fn new(writer: W, config: &Config) -> Self {
        let method = match config.compression {
            Compression::Stored => CompressionMethod::Stored,
            Compression::Deflated => CompressionMethod::Deflated,
        };

        Self {
            zip: ZipWriter::new(writer),
            options: SimpleFileOptions::default().compression_method(method),
            buffer: vec![0u8; config.transfer_unit()],
            progress: None,
        }
    }

    /// Write the central directory and hand back the underlying writer.
    pub fn finish(self) -> Result<W> {
        self.zip.finish().context("cannot finalize zip archive")
    }

    fn report(&mut self, fraction: f64, last: &mut f64) {
        if let Some((threshold, callback)) = self.progress.as_mut() {
            if fraction - *last >= *threshold || (fraction >= 1.0 && *last < 1.0) {
                *last = fraction;
                callback(fraction);
            }
        }
    }
}

impl<W: Write + Seek> ArchiveWriter for ZipBuilder<W> {
    fn add_directory(&mut self, name: &str) -> Result<()> {
        self.zip
            .add_directory(name, self.options)
            .with_context(|| format!("cannot add directory entry '{name}'"))
    }

    fn add_file(&mut self, name: &str, source: &Path) -> Result<()> {
        let mut file = File::open(source)
            .with_context(|| format!("cannot open '{}'", source.display()))?;
        let size = file.metadata()?.len();

        let options = self.options.large_file(size >= u32::MAX as u64);
        self.zip
            .start_file(name, options)
            .with_context(|| format!("cannot start file entry '{name}'"))?;

        let mut written = 0u64;
        let mut last = 0.0;
        loop {
            let n = file
                .read(&mut self.buffer)
                .with_context(|| format!("cannot read '{}'", source.display()))?;
            if n == 0 {
                break;
            }
            self.zip.write_all(&self.buffer[..n])?;
            written += n as u64;

            let fraction = if size == 0 { 1.0 } else { (written as f64 / size as f64).min(1.0) };
            self.report(fraction, &mut last);
        }
        self.report(1.0, &mut last);

        Ok(())
    }

    fn register_progress(&mut self, threshold: f64, callback: WriteProgress) {
        self.progress = Some((threshold, callback));
    }
}
