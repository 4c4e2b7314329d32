//! Real frame descriptor - metadata for one slot of the real frame pool.
//!
//! A [`RealFrame`] tracks:
//! - Which virtual frame owns it (if any)
//! - Where its bytes live inside the pool's storage block
//! - Reference count, dirty flag and pool state

use crate::common::VFrameId;

/// Where a real frame currently sits in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// On the free list, not bound to any virtual frame.
    Available,
    /// Bound and referenced (or just bound and about to be referenced).
    Allocated,
    /// Bound, unreferenced, waiting on the eviction queue.
    OnLru,
}

/// A real frame descriptor.
///
/// The bytes themselves live in the pool's contiguous storage block at
/// `offset .. offset + frame_size`; the descriptor never moves them.
#[derive(Debug, Clone)]
pub struct RealFrame {
    /// Virtual frame bound to this real frame.
    owner: Option<VFrameId>,

    /// Byte offset of this frame inside the storage block.
    offset: usize,

    state: FrameState,

    /// Content differs from the backing file copy.
    dirty: bool,

    /// Number of outstanding references.
    refc: u32,

    /// Incremented every time the frame is bound to a virtual frame.
    binding: u64,
}

impl RealFrame {
    /// Create an unbound frame at `offset`.
    pub fn new(offset: usize) -> Self {
        Self {
            owner: None,
            offset,
            state: FrameState::Available,
            dirty: false,
            refc: 0,
            binding: 0,
        }
    }

    // ========================================================================
    // Binding
    // ========================================================================

    #[inline]
    pub fn owner(&self) -> Option<VFrameId> {
        self.owner
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn binding(&self) -> u64 {
        self.binding
    }

    /// Bind to a virtual frame. The frame becomes Allocated, clean and
    /// unreferenced; the caller takes the first reference.
    pub fn bind(&mut self, owner: VFrameId) {
        self.owner = Some(owner);
        self.state = FrameState::Allocated;
        self.dirty = false;
        self.refc = 0;
        self.binding = self.binding.wrapping_add(1);
    }

    /// Drop the binding and return to the Available state.
    pub fn unbind(&mut self) {
        self.owner = None;
        self.state = FrameState::Available;
        self.dirty = false;
        self.refc = 0;
    }

    // ========================================================================
    // State
    // ========================================================================

    #[inline]
    pub fn state(&self) -> FrameState {
        self.state
    }

    #[inline]
    pub fn set_state(&mut self, state: FrameState) {
        self.state = state;
    }

    // ========================================================================
    // Reference count
    // ========================================================================

    /// Increment the reference count. Returns the new count.
    #[inline]
    pub fn pin(&mut self) -> u32 {
        self.refc += 1;
        self.refc
    }

    /// Decrement the reference count. Returns the new count.
    ///
    /// # Panics
    /// Panics if the count is already 0.
    #[inline]
    pub fn unpin(&mut self) -> u32 {
        assert!(self.refc > 0, "refcount underflow");
        self.refc -= 1;
        self.refc
    }

    #[inline]
    pub fn refc(&self) -> u32 {
        self.refc
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.refc > 0
    }

    // ========================================================================
    // Dirty flag
    // ========================================================================

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[inline]
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
