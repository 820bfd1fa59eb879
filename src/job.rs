use std::path::PathBuf;

use tokio::task::JoinHandle;

use crate::builder::compress_with;
use crate::extract::{extract_local_with, extract_remote_with};
use crate::io::RemoteClient;
use crate::{Config, Error, Outcome, Progress, Result};

/// A blocking operation running on tokio's blocking pool.
///
/// Each job owns a fresh [`Progress`]; poll it from the async side and call
/// [`cancel`](Job::cancel) to stop at the next entry boundary. All
/// constructors must be called from within a tokio runtime.
#[derive(Debug)]
pub struct Job {
    progress: Progress,
    handle: JoinHandle<Result<Outcome>>,
}

impl Job {
    /// Run `task` with the job's progress handle.
    pub fn spawn<F>(task: F) -> Self
    where
        F: FnOnce(&Progress) -> Result<Outcome> + Send + 'static,
    {
        let progress = Progress::new();
        let worker = progress.clone();
        let handle = tokio::task::spawn_blocking(move || task(&worker));
        Self { progress, handle }
    }

    pub fn extract_local(
        archive: impl Into<PathBuf>,
        dest: impl Into<PathBuf>,
        config: Config,
    ) -> Self {
        let (archive, dest) = (archive.into(), dest.into());
        Self::spawn(move |progress| extract_local_with(&archive, &dest, progress, &config))
    }

    pub fn extract_remote<C>(
        client: C,
        path: impl Into<String>,
        dest: impl Into<PathBuf>,
        config: Config,
    ) -> Self
    where
        C: RemoteClient + Send + 'static,
    {
        let (path, dest) = (path.into(), dest.into());
        Self::spawn(move |progress| extract_remote_with(client, &path, &dest, progress, &config))
    }

    pub fn compress(sources: Vec<PathBuf>, archive: impl Into<PathBuf>, config: Config) -> Self {
        let archive = archive.into();
        Self::spawn(move |progress| compress_with(&sources, &archive, progress, &config))
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn cancel(&self) {
        self.progress.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the operation to end. A panic in the worker comes back as
    /// [`Error::Worker`].
    pub async fn wait(self) -> Result<Outcome> {
        self.handle
            .await
            .map_err(|e| Error::Worker(e.to_string()))?
    }
}
