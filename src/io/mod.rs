mod http;
mod local;
mod stream;

pub use http::HttpClient;
pub use local::LocalClient;
pub use stream::RemoteStream;

use anyhow::Result;

/// Capability flags advertised by a [`RemoteClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Actions(u32);

impl Actions {
    pub const NONE: Actions = Actions(0);
    /// The client can open a persistent handle and read ranges through it.
    pub const RAW_READ: Actions = Actions(1);

    pub fn contains(self, other: Actions) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Actions {
    type Output = Actions;

    fn bitor(self, rhs: Actions) -> Actions {
        Actions(self.0 | rhs.0)
    }
}

/// Where a ranged read is addressed: an open raw handle, or a path that is
/// resolved on every request.
pub enum RangeTarget<'a, H> {
    Handle(&'a mut H),
    Path(&'a str),
}

/// Callback a client invokes on its own with the size of every chunk it
/// moves over the wire.
pub type TransferCallback = Box<dyn FnMut(u64) + Send>;

/// Optional capability of clients that push unsolicited transfer progress.
pub trait TransferNotify {
    /// Remove and return the installed callback, leaving none in place.
    fn take_transfer_callback(&mut self) -> Option<TransferCallback>;

    fn set_transfer_callback(&mut self, callback: Option<TransferCallback>);
}

/// A storage backend that can be read by byte range.
pub trait RemoteClient {
    /// Raw handle returned by [`open`](Self::open).
    type Handle;

    /// Total size of the object at `path`.
    fn size(&mut self, path: &str) -> Result<u64>;

    fn supported_actions(&self) -> Actions;

    /// Open a persistent handle. Only called when
    /// [`Actions::RAW_READ`] is advertised.
    fn open(&mut self, path: &str) -> Result<Self::Handle>;

    /// Read up to `buf.len()` bytes at `offset`, returning how many were read.
    fn get_range(
        &mut self,
        target: RangeTarget<'_, Self::Handle>,
        buf: &mut [u8],
        offset: u64,
    ) -> Result<usize>;

    fn close(&mut self, handle: Self::Handle) -> Result<()>;

    /// The transfer-notification capability, for clients that have one.
    fn transfer_notify(&mut self) -> Option<&mut dyn TransferNotify> {
        None
    }
}

impl<C: RemoteClient + ?Sized> RemoteClient for &mut C {
    type Handle = C::Handle;

    fn size(&mut self, path: &str) -> Result<u64> {
        (**self).size(path)
    }

    fn supported_actions(&self) -> Actions {
        (**self).supported_actions()
    }

    fn open(&mut self, path: &str) -> Result<Self::Handle> {
        (**self).open(path)
    }

    fn get_range(
        &mut self,
        target: RangeTarget<'_, Self::Handle>,
        buf: &mut [u8],
        offset: u64,
    ) -> Result<usize> {
        (**self).get_range(target, buf, offset)
    }

    fn close(&mut self, handle: Self::Handle) -> Result<()> {
        (**self).close(handle)
    }

    fn transfer_notify(&mut self) -> Option<&mut dyn TransferNotify> {
        (**self).transfer_notify()
    }
}
