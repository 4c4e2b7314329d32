//! RAII guards for frame access through a [`SharedPagingSpace`].
//!
//! These guards hold one reference on a resident frame:
//! - [`FrameReadGuard`] - read-only reference
//! - [`FrameWriteGuard`] - change reference (frame marked dirty)
//!
//! Both guards release the reference when dropped. The space lock is only
//! held while bytes are borrowed through `data()` / `data_mut()`.

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

use crate::buffer::{FrameAccess, SharedPagingSpace};
use crate::common::{Error, FrameId, Result, Vaddr};

/// Guard for a read-only frame reference.
///
/// # Example
/// ```ignore
/// let guard = shared.fetch_read(vaddr)?;
/// let first = guard.data()?[guard.offset()];
/// // guard drops here, reference released
/// ```
pub struct FrameReadGuard<'a> {
    /// Space to release into on drop.
    shared: &'a SharedPagingSpace,
    access: FrameAccess,
}

impl<'a> FrameReadGuard<'a> {
    /// Called by `SharedPagingSpace::fetch_read()`.
    pub(crate) fn new(shared: &'a SharedPagingSpace, access: FrameAccess) -> Self {
        Self { shared, access }
    }

    #[inline]
    pub fn vaddr(&self) -> Vaddr {
        self.access.vaddr()
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.access.frame_id()
    }

    /// Offset of the accessed address inside the frame.
    #[inline]
    pub fn offset(&self) -> usize {
        self.access.offset()
    }

    /// Borrow the frame bytes under the shared lock.
    pub fn data(&self) -> Result<MappedRwLockReadGuard<'_, [u8]>> {
        read_bytes(self.shared, &self.access)
    }
}

impl Drop for FrameReadGuard<'_> {
    fn drop(&mut self) {
        release(self.shared, self.access.vaddr());
    }
}

/// Guard for a change reference. The frame was marked dirty when the
/// reference was taken.
///
/// # Example
/// ```ignore
/// let guard = shared.fetch_write(vaddr)?;
/// guard.data_mut()?.fill(0xFF);
/// // guard drops here, reference released
/// ```
pub struct FrameWriteGuard<'a> {
    shared: &'a SharedPagingSpace,
    access: FrameAccess,
}

impl<'a> FrameWriteGuard<'a> {
    /// Called by `SharedPagingSpace::fetch_write()`.
    pub(crate) fn new(shared: &'a SharedPagingSpace, access: FrameAccess) -> Self {
        Self { shared, access }
    }

    #[inline]
    pub fn vaddr(&self) -> Vaddr {
        self.access.vaddr()
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.access.frame_id()
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.access.offset()
    }

    pub fn data(&self) -> Result<MappedRwLockReadGuard<'_, [u8]>> {
        read_bytes(self.shared, &self.access)
    }

    /// Borrow the frame bytes mutably under the exclusive lock.
    pub fn data_mut(&self) -> Result<MappedRwLockWriteGuard<'_, [u8]>> {
        RwLockWriteGuard::try_map(self.shared.lock().write(), |space| {
            space.frame_mut(&self.access).ok()
        })
        .map_err(|_| Error::StaleAccess(self.access.vaddr()))
    }
}

impl Drop for FrameWriteGuard<'_> {
    fn drop(&mut self) {
        release(self.shared, self.access.vaddr());
    }
}

fn read_bytes<'a>(
    shared: &'a SharedPagingSpace,
    access: &FrameAccess,
) -> Result<MappedRwLockReadGuard<'a, [u8]>> {
    RwLockReadGuard::try_map(shared.lock().read(), |space| space.frame(access).ok())
        .map_err(|_| Error::StaleAccess(access.vaddr()))
}

fn release(shared: &SharedPagingSpace, vaddr: Vaddr) {
    if let Err(e) = shared.lock().write().release(vaddr) {
        warn!(%vaddr, error = %e, "release on guard drop failed");
    }
}
