//! # arcstream
//!
//! Archive extraction and creation over local and remote storage.
//!
//! Remote archives are read in place: [`RemoteStream`] turns a storage
//! client that can only serve byte ranges into a seekable `Read`, so a zip
//! engine can jump to the central directory without downloading the whole
//! file first.
//!
//! ## Features
//!
//! - Extract ZIP, TAR and TAR.GZ archives from the local filesystem
//! - Extract from any [`RemoteClient`], including HTTP/HTTPS servers through
//!   Range requests ([`HttpClient`])
//! - Zip-slip protection: entries with absolute or `..` paths are skipped
//! - Recursive ZIP creation from files and directory trees
//! - Shared progress state with cooperative cancellation, usable from a
//!   tokio task through [`Job`]
//!
//! ## Example
//!
//! ```no_run
//! use arcstream::{Config, HttpClient, Job};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     // The blocking HTTP client must be built outside the async runtime.
//!     let client = HttpClient::new(&config)?;
//!
//!     let runtime = tokio::runtime::Runtime::new()?;
//!     runtime.block_on(async {
//!         let job = Job::extract_remote(client, "https://example.com/archive.zip", "out", config);
//!         let progress = job.progress().clone();
//!
//!         let outcome = job.wait().await?;
//!         println!("{outcome:?}, last activity: {}", progress.activity());
//!         Ok::<_, anyhow::Error>(())
//!     })
//! }
//! ```

pub mod archive;
mod builder;
mod config;
mod error;
pub mod extract;
pub mod io;
mod job;
mod progress;

pub use archive::{ArchiveFormat, ArchiveReader, ArchiveWriter, Entry, EntryKind};
pub use builder::{PROGRESS_SCALE, TreeBuilder, add_path, add_tree, compress};
pub use config::{Compression, Config, DEFAULT_CHUNK_SIZE};
pub use error::{Error, Outcome, Result};
pub use extract::{Walker, extract_entries, extract_local, extract_remote, sanitize_entry_path};
pub use io::{Actions, HttpClient, LocalClient, RemoteClient, RemoteStream};
pub use job::Job;
pub use progress::{Progress, Snapshot};
