//! Recursive archive builder: mirrors a local file tree into an
//! [`ArchiveWriter`].

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use tracing::{debug, info};

use crate::archive::{ArchiveWriter, ZipBuilder};
use crate::{Config, Error, Outcome, Progress, Result};

/// Writer progress is reported as a fraction; it is scaled to this many
/// units before it lands in [`Progress`].
pub const PROGRESS_SCALE: u64 = 100_000;

pub struct TreeBuilder<'a, W: ArchiveWriter + ?Sized> {
    writer: &'a mut W,
    progress: &'a Progress,
    threshold: f64,
}

impl<'a, W: ArchiveWriter + ?Sized> TreeBuilder<'a, W> {
    pub fn new(writer: &'a mut W, progress: &'a Progress, config: &Config) -> Self {
        Self {
            writer,
            progress,
            threshold: config.progress_threshold,
        }
    }

    /// Add `source` under the name left after dropping its first
    /// `prefix_len` bytes.
    ///
    /// Directories are entered recursively, children in name order. A
    /// directory whose stripped name is empty gets no entry of its own.
    pub fn add_path(&mut self, source: &Path, prefix_len: usize) -> Result<Outcome> {
        let meta = fs::metadata(source).map_err(|e| add_failed(source, e.into()))?;
        if meta.is_dir() {
            self.add_dir(source, prefix_len)
        } else {
            self.add_file(source, prefix_len)?;
            Ok(Outcome::Completed)
        }
    }

    fn add_file(&mut self, source: &Path, prefix_len: usize) -> Result<()> {
        let name = entry_name(source, prefix_len)?
            .ok_or_else(|| add_failed(source, anyhow!("file entry name is empty")))?;

        self.progress
            .set_activity(format!("Compressing: {}", source.display()));
        debug!(source = %source.display(), %name, "adding file");
        self.writer
            .add_file(&name, source)
            .map_err(|e| add_failed(source, e))
    }

    fn add_dir(&mut self, source: &Path, prefix_len: usize) -> Result<Outcome> {
        self.register_progress();

        if let Some(name) = entry_name(source, prefix_len)? {
            let name = format!("{name}/");
            debug!(source = %source.display(), %name, "adding directory");
            self.writer
                .add_directory(&name)
                .map_err(|e| add_failed(source, e))?;
        }

        for child in children(source)? {
            if self.progress.is_cancelled() {
                info!(dir = %source.display(), "compression cancelled");
                return Ok(Outcome::Cancelled);
            }

            let file_type = child.file_type.as_ref();
            let is_dir = match file_type {
                Ok(t) if t.is_symlink() => {
                    if fs::metadata(&child.path).is_ok_and(|m| m.is_dir()) {
                        debug!(path = %child.path.display(), "skipping symbolic link to directory");
                        continue;
                    }
                    false
                }
                Ok(t) => t.is_dir(),
                Err(e) => {
                    let source = anyhow!("cannot stat: {e}");
                    return Err(add_failed(&child.path, source));
                }
            };

            if is_dir {
                if self.add_dir(&child.path, prefix_len)?.is_cancelled() {
                    return Ok(Outcome::Cancelled);
                }
            } else {
                self.add_file(&child.path, prefix_len)?;
            }
        }

        Ok(Outcome::Completed)
    }

    fn register_progress(&mut self) {
        let progress = self.progress.clone();
        self.writer.register_progress(
            self.threshold,
            Box::new(move |fraction| {
                progress.set_expected(PROGRESS_SCALE);
                progress.set_transferred((fraction.clamp(0.0, 1.0) * PROGRESS_SCALE as f64) as u64);
            }),
        );
    }
}

struct Child {
    path: PathBuf,
    file_type: io::Result<fs::FileType>,
}

fn children(dir: &Path) -> Result<Vec<Child>> {
    let entries = fs::read_dir(dir).map_err(|e| add_failed(dir, e.into()))?;

    let mut children = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| add_failed(dir, e.into()))?;
        children.push(Child {
            path: entry.path(),
            file_type: entry.file_type(),
        });
    }
    children.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(children)
}

/// Archive name for `source` with the first `prefix_len` bytes dropped.
///
/// `None` when nothing is left. Separators are normalized to `/` and a
/// leading one is dropped.
fn entry_name(source: &Path, prefix_len: usize) -> Result<Option<String>> {
    let full = source.to_string_lossy();
    if prefix_len >= full.len() {
        return Ok(None);
    }
    let Some(rest) = full.get(prefix_len..) else {
        return Err(add_failed(
            source,
            anyhow!("prefix length {prefix_len} splits a character"),
        ));
    };

    let name = rest.replace('\\', "/");
    let name = name.trim_start_matches('/');
    if name.is_empty() {
        Ok(None)
    } else {
        Ok(Some(name.to_string()))
    }
}

fn add_failed(path: &Path, source: anyhow::Error) -> Error {
    Error::AddFailed {
        path: path.display().to_string(),
        source,
    }
}

/// Byte length of `root` plus its trailing separator.
fn prefix_len_of(root: &Path) -> usize {
    let root = root.to_string_lossy();
    if root.is_empty() || root.ends_with(['/', '\\']) {
        root.len()
    } else {
        root.len() + 1
    }
}

/// Add `source` to `writer`, naming entries after `source[prefix_len..]`.
pub fn add_path<W: ArchiveWriter + ?Sized>(
    writer: &mut W,
    source: &Path,
    prefix_len: usize,
    progress: &Progress,
    config: &Config,
) -> Result<Outcome> {
    progress.reset();
    TreeBuilder::new(writer, progress, config).add_path(source, prefix_len)
}

/// Add `source` to `writer` with entry names relative to `root`.
pub fn add_tree<W: ArchiveWriter + ?Sized>(
    writer: &mut W,
    root: &Path,
    source: &Path,
    progress: &Progress,
    config: &Config,
) -> Result<Outcome> {
    if !source.starts_with(root) {
        return Err(add_failed(
            source,
            anyhow!("not under '{}'", root.display()),
        ));
    }
    add_path(writer, source, prefix_len_of(root), progress, config)
}

/// Zip `sources` into a new archive at `archive`.
///
/// Each source is stored under its own file name. The archive is finalized
/// even when cancelled, so it holds whatever was added up to that point.
pub fn compress<P: AsRef<Path>>(
    sources: &[P],
    archive: &Path,
    progress: &Progress,
    config: &Config,
) -> Result<Outcome> {
    progress.reset();
    compress_with(sources, archive, progress, config)
}

pub(crate) fn compress_with<P: AsRef<Path>>(
    sources: &[P],
    archive: &Path,
    progress: &Progress,
    config: &Config,
) -> Result<Outcome> {
    info!(archive = %archive.display(), sources = sources.len(), "compressing");

    let file = File::create(archive).map_err(|e| Error::write(archive, e))?;
    let mut zip = ZipBuilder::new(BufWriter::new(file), config);

    let mut outcome = Outcome::Completed;
    {
        let mut builder = TreeBuilder::new(&mut zip, progress, config);
        for source in sources {
            if progress.is_cancelled() {
                outcome = Outcome::Cancelled;
                break;
            }

            let source = source.as_ref();
            let prefix = source.parent().map_or(0, prefix_len_of);
            if builder.add_path(source, prefix)?.is_cancelled() {
                outcome = Outcome::Cancelled;
                break;
            }
        }
    }

    let mut writer = zip
        .finish()
        .map_err(|e| Error::write(archive, io::Error::other(e)))?;
    writer.flush().map_err(|e| Error::write(archive, e))?;

    info!(archive = %archive.display(), ?outcome, "compression finished");
    Ok(outcome)
}
