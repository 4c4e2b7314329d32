//! Shared Paging Space - a lock around [`PagingSpace`] for use from several
//! threads.

use std::path::Path;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::buffer::{FrameReadGuard, FrameStatus, FrameWriteGuard, PagingSpace, StatsSnapshot};
use crate::common::{FileNo, PagingConfig, Result, Vaddr, Xaddr};

/// A [`PagingSpace`] behind a `parking_lot::RwLock`.
///
/// # Thread Safety
/// - Every state change (access, release, allocation) takes the write lock
/// - Reading frame bytes through a [`FrameReadGuard`] takes the read lock,
///   so several readers can copy data out at once
/// - Statistics are atomic and readable under the read lock
///
/// # Usage
/// ```no_run
/// use pagingspace::{PagingConfig, SharedPagingSpace, Vaddr};
///
/// let shared = SharedPagingSpace::new();
/// shared.cold(&PagingConfig::new("space.ctl"))?;
/// shared.ins_file("space.dat")?;
///
/// {
///     let guard = shared.fetch_write(Vaddr(0x4000))?;
///     guard.data_mut()?[0] = 1;
///     // guard drops: reference released
/// }
/// let guard = shared.fetch_read(Vaddr(0x4000))?;
/// assert_eq!(guard.data()?[0], 1);
/// # Ok::<(), pagingspace::Error>(())
/// ```
pub struct SharedPagingSpace {
    inner: RwLock<PagingSpace>,
}

impl SharedPagingSpace {
    /// An uninitialized shared space.
    pub fn new() -> Self {
        Self::from_space(PagingSpace::new())
    }

    /// Share an existing space.
    pub fn from_space(space: PagingSpace) -> Self {
        Self {
            inner: RwLock::new(space),
        }
    }

    pub fn cold(&self, config: &PagingConfig) -> Result<()> {
        self.inner.write().cold(config)
    }

    pub fn warm(&self, config: &PagingConfig) -> Result<()> {
        self.inner.write().warm(config)
    }

    pub fn term(&self) -> Result<()> {
        self.inner.write().term()
    }

    pub fn ins_file<P: AsRef<Path>>(&self, path: P) -> Result<FileNo> {
        self.inner.write().ins_file(path)
    }

    pub fn allocate(&self, file: Option<FileNo>, vaddr: Vaddr) -> Result<Xaddr> {
        self.inner.write().allocate(file, vaddr)
    }

    pub fn status(&self, vaddr: Vaddr) -> Result<FrameStatus> {
        self.inner.read().status(vaddr)
    }

    pub fn flush(&self) -> Result<()> {
        self.inner.write().flush()
    }

    /// Reference a frame read-only; released when the guard drops.
    pub fn fetch_read(&self, vaddr: Vaddr) -> Result<FrameReadGuard<'_>> {
        let access = self.inner.write().access_ref(vaddr)?;
        Ok(FrameReadGuard::new(self, access))
    }

    /// Reference a frame for change; released when the guard drops.
    pub fn fetch_write(&self, vaddr: Vaddr) -> Result<FrameWriteGuard<'_>> {
        let access = self.inner.write().access_chg(vaddr)?;
        Ok(FrameWriteGuard::new(self, access))
    }

    pub fn frame_count(&self) -> usize {
        self.inner.read().frame_count()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.read().stats().snapshot()
    }

    /// Shared access to the underlying space.
    pub fn read(&self) -> RwLockReadGuard<'_, PagingSpace> {
        self.inner.read()
    }

    /// Exclusive access to the underlying space.
    pub fn write(&self) -> RwLockWriteGuard<'_, PagingSpace> {
        self.inner.write()
    }

    pub fn into_inner(self) -> PagingSpace {
        self.inner.into_inner()
    }

    pub(crate) fn lock(&self) -> &RwLock<PagingSpace> {
        &self.inner
    }
}

impl Default for SharedPagingSpace {
    fn default() -> Self {
        Self::new()
    }
}
