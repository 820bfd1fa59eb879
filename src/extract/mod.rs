//! Safe extraction walker.
//!
//! Entries are taken from the engine one at a time, in archive order. Each
//! entry path goes through [`sanitize_entry_path`] before it is joined with
//! the destination; refused entries are skipped without touching the
//! filesystem. Cancellation is polled between entries only.

mod sanitize;

pub use sanitize::{destination_path, sanitize_entry_path};

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::{debug, info, warn};

use crate::archive::{ArchiveFormat, ArchiveReader, Entry, EntryKind, TarReader, ZipReader};
use crate::io::{RemoteClient, RemoteStream};
use crate::{Config, Error, Outcome, Progress, Result};

/// Drives one archive read session into a destination directory.
pub struct Walker<'a> {
    archive: String,
    dest: &'a Path,
    progress: &'a Progress,
    buffer: Vec<u8>,
    extracted: usize,
    skipped: usize,
}

impl<'a> Walker<'a> {
    pub fn new(
        archive: impl Into<String>,
        dest: &'a Path,
        progress: &'a Progress,
        config: &Config,
    ) -> Self {
        Self {
            archive: archive.into(),
            dest,
            progress,
            buffer: vec![0u8; config.transfer_unit()],
            extracted: 0,
            skipped: 0,
        }
    }

    /// Entries written to disk so far (files and directories).
    pub fn extracted(&self) -> usize {
        self.extracted
    }

    /// Entries refused or of an unsupported kind.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Visit every entry until the engine reports the end, a step fails, or
    /// cancellation is requested.
    pub fn run<A: ArchiveReader + ?Sized>(&mut self, engine: &mut A) -> Result<Outcome> {
        loop {
            if self.progress.is_cancelled() {
                info!(archive = %self.archive, extracted = self.extracted, "extraction cancelled");
                return Ok(Outcome::Cancelled);
            }

            let entry = match engine.next_entry() {
                Ok(Some(entry)) => entry,
                Ok(None) => return Ok(Outcome::Completed),
                Err(source) => {
                    return Err(Error::HeaderFailed {
                        archive: self.archive.clone(),
                        source,
                    });
                }
            };

            self.visit(entry)?;
        }
    }

    fn visit(&mut self, entry: Entry<'_>) -> Result<()> {
        let Some(target) = destination_path(self.dest, &entry.path) else {
            warn!(entry = %entry.path, "skipping entry with unsafe path");
            self.skip(entry);
            return Ok(());
        };

        match entry.kind {
            EntryKind::Directory => {
                fs::create_dir_all(&target).map_err(|e| Error::write(&target, e))?;
                self.extracted += 1;
                Ok(())
            }
            EntryKind::File => self.extract_file(entry, &target),
            EntryKind::Symlink => {
                debug!(
                    entry = %entry.path,
                    target = entry.link_target.as_deref().unwrap_or(""),
                    "skipping symbolic link"
                );
                self.skip(entry);
                Ok(())
            }
            EntryKind::Other => {
                debug!(entry = %entry.path, "skipping unsupported entry kind");
                self.skip(entry);
                Ok(())
            }
        }
    }

    fn skip(&mut self, entry: Entry<'_>) {
        self.progress.set_activity(format!("Skipping: {}", entry.path));
        self.skipped += 1;
        entry.skip();
    }

    fn extract_file(&mut self, mut entry: Entry<'_>, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::write(parent, e))?;
        }

        // Overwrite, never append: whatever sits at the target goes first.
        // A directory is left alone and makes the create below fail.
        if let Ok(meta) = fs::symlink_metadata(target) {
            if !meta.is_dir() {
                fs::remove_file(target).map_err(|e| Error::write(target, e))?;
            }
        }

        let mut file = File::create(target).map_err(|e| Error::write(target, e))?;
        self.progress.begin(entry.size, format!("Extracting: {}", entry.path));

        loop {
            let n = match entry.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(Error::ReadFailed {
                        path: entry.path.clone(),
                        source,
                    });
                }
            };

            file.write_all(&self.buffer[..n])
                .map_err(|e| Error::write(target, e))?;
            self.progress.add_transferred(n as u64);
        }

        file.flush().map_err(|e| Error::write(target, e))?;
        self.extracted += 1;
        Ok(())
    }
}

/// Label used in errors when the engine was opened by the caller.
const ENGINE_LABEL: &str = "archive";

/// Run the walker over an already opened engine.
///
/// Resets `progress` first, like every other top-level operation.
pub fn extract_entries<A: ArchiveReader + ?Sized>(
    engine: &mut A,
    dest: &Path,
    progress: &Progress,
    config: &Config,
) -> Result<Outcome> {
    progress.reset();
    let mut walker = Walker::new(ENGINE_LABEL, dest, progress, config);
    walker.run(engine)
}

/// Extract an archive from the local filesystem.
pub fn extract_local(
    archive: &Path,
    dest: &Path,
    progress: &Progress,
    config: &Config,
) -> Result<Outcome> {
    progress.reset();
    extract_local_with(archive, dest, progress, config)
}

/// Extract an archive read through a remote client.
///
/// The format is guessed from `path`. Pass `&mut client` to keep using the
/// client afterwards.
pub fn extract_remote<C: RemoteClient>(
    client: C,
    path: &str,
    dest: &Path,
    progress: &Progress,
    config: &Config,
) -> Result<Outcome> {
    progress.reset();
    extract_remote_with(client, path, dest, progress, config)
}

pub(crate) fn extract_local_with(
    archive: &Path,
    dest: &Path,
    progress: &Progress,
    config: &Config,
) -> Result<Outcome> {
    let name = archive.display().to_string();
    let format = detect(&name)?;

    let file = File::open(archive).map_err(|e| Error::OpenFailed {
        path: name.clone(),
        source: e.into(),
    })?;
    let reader = BufReader::with_capacity(config.transfer_unit(), file);

    walk_archive(format, reader, &name, dest, progress, config)
}

pub(crate) fn extract_remote_with<C: RemoteClient>(
    client: C,
    path: &str,
    dest: &Path,
    progress: &Progress,
    config: &Config,
) -> Result<Outcome> {
    let format = detect(path)?;
    let stream = RemoteStream::open(client, path, config.transfer_unit()).map_err(|source| {
        Error::OpenFailed {
            path: path.to_string(),
            source,
        }
    })?;

    walk_archive(format, stream, path, dest, progress, config)
}

fn detect(name: &str) -> Result<ArchiveFormat> {
    ArchiveFormat::from_name(name).ok_or_else(|| Error::UnsupportedFormat(name.to_string()))
}

fn walk_archive<R: Read + Seek>(
    format: ArchiveFormat,
    reader: R,
    name: &str,
    dest: &Path,
    progress: &Progress,
    config: &Config,
) -> Result<Outcome> {
    info!(archive = name, dest = %dest.display(), ?format, "extracting archive");
    fs::create_dir_all(dest).map_err(|e| Error::write(dest, e))?;

    let open_failed = |source: anyhow::Error| Error::OpenFailed {
        path: name.to_string(),
        source,
    };

    let mut walker = Walker::new(name, dest, progress, config);
    let outcome = match format {
        ArchiveFormat::Zip => {
            let mut engine = ZipReader::new(reader).map_err(open_failed)?;
            walker.run(&mut engine)?
        }
        ArchiveFormat::Tar => {
            let mut archive = TarReader::new(reader);
            let mut engine = archive.entries().map_err(|e| open_failed(e.into()))?;
            walker.run(&mut engine)?
        }
        ArchiveFormat::TarGz => {
            let mut archive = TarReader::new(GzDecoder::new(reader));
            let mut engine = archive.entries().map_err(|e| open_failed(e.into()))?;
            walker.run(&mut engine)?
        }
    };

    info!(
        archive = name,
        extracted = walker.extracted(),
        skipped = walker.skipped(),
        ?outcome,
        "extraction finished"
    );
    Ok(outcome)
}
