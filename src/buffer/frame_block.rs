//! The page-aligned block that backs every real frame.

use std::alloc::{self, Layout};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;

use crate::common::{Error, Result};

/// Alignment of the frame block. Frame sizes are powers of two, so frames of
/// up to this size never straddle a page boundary.
pub const FRAME_BLOCK_ALIGNMENT: usize = 4096;

/// A zeroed, page-aligned byte block owned by the real frame pool.
pub struct FrameBlock {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: FrameBlock owns its allocation exclusively and only hands out
// borrows tied to its own lifetime.
unsafe impl Send for FrameBlock {}
unsafe impl Sync for FrameBlock {}

impl FrameBlock {
    /// Allocate `size` zeroed bytes aligned to `FRAME_BLOCK_ALIGNMENT`.
    ///
    /// # Errors
    /// `Error::InvalidParameter` if `size` is 0 or exceeds the address space,
    /// `Error::NoRealStorage` if the allocator refuses the request.
    pub fn zeroed(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidParameter("frame block must not be empty".into()));
        }
        let layout = Layout::from_size_align(size, FRAME_BLOCK_ALIGNMENT).map_err(|_| {
            Error::InvalidParameter(format!("frame block of {} bytes is too large", size))
        })?;

        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(Error::NoRealStorage)?;

        Ok(Self { ptr, layout })
    }
}

impl Deref for FrameBlock {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: ptr is valid for layout.size() initialized bytes.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl DerefMut for FrameBlock {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for layout.size() bytes and uniquely borrowed.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for FrameBlock {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}
