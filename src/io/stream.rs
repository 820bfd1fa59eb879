//! Streaming byte source over a range-read [`RemoteClient`].
//!
//! Archive engines want a classic `Read + Seek` source. Remote backends only
//! answer "give me `len` bytes at `offset`". [`RemoteStream`] keeps a logical
//! cursor, turns every refill into one ranged request of at most one
//! transfer unit, and treats seeking as pure cursor arithmetic: nothing is
//! fetched until the next read.

use std::io::{self, BufRead, Read, Seek, SeekFrom};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::{Actions, RangeTarget, RemoteClient, TransferCallback};

/// One archive read session against a remote object.
pub struct RemoteStream<C: RemoteClient> {
    client: C,
    path: String,
    size: u64,
    /// Offset of the next remote fetch.
    cursor: u64,
    handle: Option<C::Handle>,
    scratch: Box<[u8]>,
    /// Unconsumed window of `scratch`, for the `Read`/`BufRead` side.
    pos: usize,
    filled: usize,
    suspended: Option<Option<TransferCallback>>,
    closed: bool,
}

impl<C: RemoteClient> RemoteStream<C> {
    /// Start a session on `path`.
    ///
    /// Queries the object size, opens a raw handle when the client supports
    /// it, and silences the client's own transfer callback until
    /// [`close`](Self::close).
    pub fn open(mut client: C, path: &str, chunk_size: usize) -> Result<Self> {
        let size = client
            .size(path)
            .with_context(|| format!("cannot determine size of '{path}'"))?;

        let handle = if client.supported_actions().contains(Actions::RAW_READ) {
            Some(
                client
                    .open(path)
                    .with_context(|| format!("cannot open '{path}'"))?,
            )
        } else {
            None
        };

        // Last step: nothing after this can fail, so a failed open never
        // leaves the callback suspended.
        let suspended = client
            .transfer_notify()
            .map(|notify| notify.take_transfer_callback());

        debug!(
            path,
            size,
            raw = handle.is_some(),
            suspended = suspended.is_some(),
            "opened remote stream"
        );

        Ok(Self {
            client,
            path: path.to_string(),
            size,
            cursor: 0,
            handle,
            scratch: vec![0u8; chunk_size.max(1)].into_boxed_slice(),
            pos: 0,
            filled: 0,
            suspended,
            closed: false,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Offset the next remote fetch starts at.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Fetch the next chunk at the cursor and return it.
    ///
    /// An empty slice means end of object. The chunk is handed over whole:
    /// the following [`Read`] call starts after it.
    pub fn read_chunk(&mut self) -> io::Result<&[u8]> {
        let n = self.fetch()?;
        self.pos = n;
        self.filled = n;
        Ok(&self.scratch[..n])
    }

    /// Reposition the cursor. No I/O is performed.
    ///
    /// Positions past the end are allowed and read as end of object.
    pub fn seek_to(&mut self, target: SeekFrom) -> io::Result<u64> {
        let (origin, delta) = match target {
            SeekFrom::Start(offset) => {
                self.discard_buffer();
                self.cursor = offset;
                return Ok(self.cursor);
            }
            SeekFrom::Current(delta) => (self.logical_position(), delta),
            SeekFrom::End(delta) => (self.size, delta),
        };

        let next = origin.checked_add_signed(delta).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid seek to {target:?} in '{}'", self.path),
            )
        })?;
        self.discard_buffer();
        self.cursor = next;
        Ok(self.cursor)
    }

    /// End the session: restore the client's transfer callback and close the
    /// raw handle. Later calls do nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(callback) = self.suspended.take() {
            if let Some(notify) = self.client.transfer_notify() {
                notify.set_transfer_callback(callback);
            }
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = self.client.close(handle) {
                warn!(path = %self.path, error = %err, "failed to close remote handle");
            }
        }

        debug!(path = %self.path, cursor = self.cursor, "closed remote stream");
    }

    /// Position as seen by a `Read` caller: the fetch cursor minus whatever
    /// is still buffered.
    fn logical_position(&self) -> u64 {
        self.cursor - (self.filled - self.pos) as u64
    }

    fn discard_buffer(&mut self) {
        self.pos = 0;
        self.filled = 0;
    }

    fn fetch(&mut self) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::other(format!(
                "remote stream '{}' is closed",
                self.path
            )));
        }

        let remaining = self.size.saturating_sub(self.cursor);
        if remaining == 0 {
            return Ok(0);
        }

        let want = remaining.min(self.scratch.len() as u64) as usize;
        let buf = &mut self.scratch[..want];
        let target = match self.handle.as_mut() {
            Some(handle) => RangeTarget::Handle(handle),
            None => RangeTarget::Path(&self.path),
        };

        let got = self
            .client
            .get_range(target, buf, self.cursor)
            .map_err(io::Error::other)?;

        if got == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "remote returned no data for '{}' at offset {} of {}",
                    self.path, self.cursor, self.size
                ),
            ));
        }

        let got = got.min(want);
        self.cursor += got as u64;
        Ok(got)
    }
}

impl<C: RemoteClient> Read for RemoteStream<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<C: RemoteClient> BufRead for RemoteStream<C> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.filled {
            let n = self.fetch()?;
            self.pos = 0;
            self.filled = n;
        }
        Ok(&self.scratch[self.pos..self.filled])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.filled);
    }
}

impl<C: RemoteClient> Seek for RemoteStream<C> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seek_to(pos)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.logical_position())
    }
}

impl<C: RemoteClient> Drop for RemoteStream<C> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::TransferNotify;
    use std::sync::{Arc, Mutex};

    /// Serves a fixed byte string and records every range asked for.
    struct Recorder {
        data: Vec<u8>,
        raw: bool,
        requests: Arc<Mutex<Vec<(u64, usize)>>>,
        opened: usize,
        closed: usize,
        callback: Option<TransferCallback>,
        notify: bool,
        short_reads: bool,
        fail_open: bool,
    }

    impl Recorder {
        fn new(data: &[u8]) -> Self {
            Self {
                data: data.to_vec(),
                raw: false,
                requests: Arc::default(),
                opened: 0,
                closed: 0,
                callback: None,
                notify: false,
                short_reads: false,
                fail_open: false,
            }
        }

        fn ranges(&self) -> Vec<(u64, u64)> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|&(offset, len)| (offset, offset + len as u64))
                .collect()
        }
    }

    impl TransferNotify for Recorder {
        fn take_transfer_callback(&mut self) -> Option<TransferCallback> {
            self.callback.take()
        }

        fn set_transfer_callback(&mut self, callback: Option<TransferCallback>) {
            self.callback = callback;
        }
    }

    impl RemoteClient for Recorder {
        type Handle = ();

        fn size(&mut self, _path: &str) -> Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn supported_actions(&self) -> Actions {
            if self.raw { Actions::RAW_READ } else { Actions::NONE }
        }

        fn open(&mut self, path: &str) -> Result<()> {
            if self.fail_open {
                anyhow::bail!("permission denied: {path}");
            }
            self.opened += 1;
            Ok(())
        }

        fn get_range(
            &mut self,
            _target: RangeTarget<'_, ()>,
            buf: &mut [u8],
            offset: u64,
        ) -> Result<usize> {
            let start = offset as usize;
            let mut len = buf.len().min(self.data.len().saturating_sub(start));
            if self.short_reads && len > 1 {
                len -= 1;
            }
            self.requests.lock().unwrap().push((offset, len));
            buf[..len].copy_from_slice(&self.data[start..start + len]);
            Ok(len)
        }

        fn close(&mut self, _handle: ()) -> Result<()> {
            self.closed += 1;
            Ok(())
        }

        fn transfer_notify(&mut self) -> Option<&mut dyn TransferNotify> {
            if self.notify {
                Some(self as &mut dyn TransferNotify)
            } else {
                None
            }
        }
    }

    fn drain(stream: &mut RemoteStream<&mut Recorder>) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let chunk = stream.read_chunk().unwrap();
            if chunk.is_empty() {
                return out;
            }
            out.extend_from_slice(chunk);
        }
    }

    #[test]
    fn sequential_reads_cover_object_once() {
        let mut client = Recorder::new(b"0123456789");
        let mut stream = RemoteStream::open(&mut client, "a.zip", 4).unwrap();

        assert_eq!(drain(&mut stream), b"0123456789");
        drop(stream);

        assert_eq!(client.ranges(), vec![(0, 4), (4, 8), (8, 10)]);
    }

    #[test]
    fn seek_from_start_reads_exact_offset() {
        let mut client = Recorder::new(b"0123456789");
        let mut stream = RemoteStream::open(&mut client, "a.zip", 4).unwrap();

        assert_eq!(stream.seek(SeekFrom::Start(7)).unwrap(), 7);
        assert_eq!(stream.read_chunk().unwrap(), b"789");
        drop(stream);

        assert_eq!(client.ranges(), vec![(7, 10)]);
    }

    #[test]
    fn seek_from_current_is_not_off_by_one() {
        let mut client = Recorder::new(b"0123456789");
        let mut stream = RemoteStream::open(&mut client, "a.zip", 2).unwrap();

        stream.read_chunk().unwrap();
        assert_eq!(stream.seek(SeekFrom::Current(3)).unwrap(), 5);
        assert_eq!(stream.read_chunk().unwrap(), b"56");
        assert_eq!(stream.seek(SeekFrom::Current(-4)).unwrap(), 3);
        assert_eq!(stream.read_chunk().unwrap(), b"34");
    }

    #[test]
    fn seek_to_end_reports_eof() {
        let mut client = Recorder::new(b"0123456789");
        let mut stream = RemoteStream::open(&mut client, "a.zip", 4).unwrap();

        assert_eq!(stream.seek(SeekFrom::End(0)).unwrap(), 10);
        assert!(stream.read_chunk().unwrap().is_empty());
        assert_eq!(stream.seek(SeekFrom::End(-3)).unwrap(), 7);
        assert_eq!(stream.read_chunk().unwrap(), b"789");
        drop(stream);

        assert_eq!(client.ranges(), vec![(7, 10)]);
    }

    #[test]
    fn seek_before_start_is_rejected() {
        let mut client = Recorder::new(b"0123");
        let mut stream = RemoteStream::open(&mut client, "a.zip", 4).unwrap();

        let err = stream.seek(SeekFrom::Current(-1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(stream.cursor(), 0);
    }

    #[test]
    fn read_trait_respects_buffered_position() {
        let mut client = Recorder::new(b"abcdefghij");
        let mut stream = RemoteStream::open(&mut client, "a.zip", 4).unwrap();

        let mut two = [0u8; 2];
        stream.read_exact(&mut two).unwrap();
        assert_eq!(&two, b"ab");
        assert_eq!(stream.stream_position().unwrap(), 2);
        assert_eq!(stream.cursor(), 4);

        stream.seek(SeekFrom::Current(1)).unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"defghij");
    }

    #[test]
    fn short_remote_reads_advance_by_bytes_obtained() {
        let mut client = Recorder::new(b"0123456789");
        client.short_reads = true;
        let mut stream = RemoteStream::open(&mut client, "a.zip", 4).unwrap();

        assert_eq!(drain(&mut stream), b"0123456789");
        drop(stream);

        let ranges = client.ranges();
        assert_eq!(ranges[0], (0, 3));
        assert_eq!(ranges[1], (3, 6));
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }

    #[test]
    fn empty_remote_response_is_fatal() {
        struct Empty;

        impl RemoteClient for Empty {
            type Handle = ();

            fn size(&mut self, _path: &str) -> Result<u64> {
                Ok(8)
            }

            fn supported_actions(&self) -> Actions {
                Actions::NONE
            }

            fn open(&mut self, _path: &str) -> Result<()> {
                Ok(())
            }

            fn get_range(
                &mut self,
                _target: RangeTarget<'_, ()>,
                _buf: &mut [u8],
                _offset: u64,
            ) -> Result<usize> {
                Ok(0)
            }

            fn close(&mut self, _handle: ()) -> Result<()> {
                Ok(())
            }
        }

        let mut stream = RemoteStream::open(Empty, "a.zip", 4).unwrap();
        let err = stream.read_chunk().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn raw_handle_is_opened_and_closed_once() {
        let mut client = Recorder::new(b"xyz");
        client.raw = true;

        let mut stream = RemoteStream::open(&mut client, "a.zip", 4).unwrap();
        assert_eq!(stream.read_chunk().unwrap(), b"xyz");
        stream.close();
        stream.close();
        assert!(stream.read_chunk().is_err());
        drop(stream);

        assert_eq!(client.opened, 1);
        assert_eq!(client.closed, 1);
    }

    #[test]
    fn transfer_callback_is_suspended_and_restored_once() {
        let hits = Arc::new(Mutex::new(0u64));
        let sink = hits.clone();

        let mut client = Recorder::new(b"xyz");
        client.notify = true;
        client.callback = Some(Box::new(move |n| *sink.lock().unwrap() += n));

        let mut stream = RemoteStream::open(&mut client, "a.zip", 4).unwrap();
        stream.close();
        stream.close();
        drop(stream);

        let mut callback = client.take_transfer_callback().expect("callback restored");
        callback(5);
        assert_eq!(*hits.lock().unwrap(), 5);
        assert!(client.take_transfer_callback().is_none());
    }

    #[test]
    fn failed_open_leaves_transfer_callback_alone() {
        let mut client = Recorder::new(b"xyz");
        client.raw = true;
        client.notify = true;
        client.fail_open = true;
        client.callback = Some(Box::new(|_| {}));

        assert!(RemoteStream::open(&mut client, "a.zip", 4).is_err());

        assert!(client.callback.is_some());
        assert_eq!(client.opened, 0);
        assert_eq!(client.closed, 0);
    }
}
