use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{Actions, RangeTarget, RemoteClient};

/// [`RemoteClient`] over a directory on the local filesystem.
///
/// Paths are resolved relative to the root, with leading separators ignored.
/// Supports raw reads through an open [`File`].
pub struct LocalClient {
    root: PathBuf,
}

impl LocalClient {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches(['/', '\\']))
    }
}

impl RemoteClient for LocalClient {
    type Handle = File;

    fn size(&mut self, path: &str) -> Result<u64> {
        let full = self.resolve(path);
        let meta = std::fs::metadata(&full)
            .with_context(|| format!("cannot stat '{}'", full.display()))?;
        Ok(meta.len())
    }

    fn supported_actions(&self) -> Actions {
        Actions::RAW_READ
    }

    fn open(&mut self, path: &str) -> Result<File> {
        let full = self.resolve(path);
        File::open(&full).with_context(|| format!("cannot open '{}'", full.display()))
    }

    fn get_range(
        &mut self,
        target: RangeTarget<'_, File>,
        buf: &mut [u8],
        offset: u64,
    ) -> Result<usize> {
        match target {
            RangeTarget::Handle(file) => read_at(file, buf, offset),
            RangeTarget::Path(path) => {
                let file = self.open(path)?;
                read_at(&file, buf, offset)
            }
        }
    }

    fn close(&mut self, handle: File) -> Result<()> {
        drop(handle);
        Ok(())
    }
}

fn read_at(file: &File, buf: &mut [u8], offset: u64) -> Result<usize> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        Ok(file.read_at(buf, offset)?)
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::FileExt;
        Ok(file.seek_read(buf, offset)?)
    }

    #[cfg(not(any(unix, windows)))]
    {
        use std::io::{Read, Seek, SeekFrom};
        let mut file = file;
        file.seek(SeekFrom::Start(offset))?;
        Ok(file.read(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_ranges_by_handle_and_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blob.bin"), b"hello world").unwrap();

        let mut client = LocalClient::new(dir.path());
        assert_eq!(client.size("/blob.bin").unwrap(), 11);

        let mut handle = client.open("blob.bin").unwrap();
        let mut buf = [0u8; 5];
        let n = client
            .get_range(RangeTarget::Handle(&mut handle), &mut buf, 6)
            .unwrap();
        assert_eq!(&buf[..n], b"world");

        let n = client
            .get_range(RangeTarget::Path("blob.bin"), &mut buf, 0)
            .unwrap();
        assert_eq!(&buf[..n], b"hello");

        client.close(handle).unwrap();
    }

    #[test]
    fn missing_object_fails_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = LocalClient::new(dir.path());
        assert!(client.size("nope.zip").is_err());
    }
}
