//! Real frame pool - the fixed set of resident frames and their storage.

use std::fmt;

use crate::buffer::frame_block::FrameBlock;
use crate::buffer::replacer::EvictionQueue;
use crate::buffer::{FrameState, RealFrame};
use crate::common::{Error, FrameId, Geometry, Result};

/// How many frames are in each pool state.
///
/// `available + allocated + on_lru` always equals the pool size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCounts {
    pub available: usize,
    pub allocated: usize,
    pub on_lru: usize,
}

impl FrameCounts {
    #[inline]
    pub fn total(&self) -> usize {
        self.available + self.allocated + self.on_lru
    }
}

impl fmt::Display for FrameCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "available: {}, allocated: {}, on_lru: {}",
            self.available, self.allocated, self.on_lru
        )
    }
}

/// A fixed array of real frames carved from one contiguous page-aligned
/// block.
///
/// # Layout
/// ```text
/// storage: ┌──────────┬──────────┬──────────┬─────┬──────────┐
///          │ frame 0  │ frame 1  │ frame 2  │ ... │ frame N-1│
///          └──────────┴──────────┴──────────┴─────┴──────────┘
///          0        size      2*size                     N*size
/// ```
///
/// Every frame is in exactly one place: the free list (Available), held by
/// callers (Allocated), or the eviction queue (OnLru).
pub struct RealFramePool {
    storage: FrameBlock,
    frames: Vec<RealFrame>,
    /// Stack of available frames; frame 0 is handed out first.
    free_list: Vec<FrameId>,
    queue: EvictionQueue,
    frame_size: usize,
}

impl RealFramePool {
    /// Allocate `count` zeroed frames of the geometry's size.
    ///
    /// # Errors
    /// `Error::InvalidParameter` if `count` is 0 or the block size overflows,
    /// `Error::NoRealStorage` if the block cannot be allocated.
    pub fn new(geometry: &Geometry, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::InvalidParameter("real frame count must be > 0".into()));
        }
        let frame_size = geometry.frame_size();
        let total = count.checked_mul(frame_size).ok_or_else(|| {
            Error::InvalidParameter(format!("{} frames of {} bytes overflow", count, frame_size))
        })?;
        let storage = FrameBlock::zeroed(total)?;

        let mut frames = Vec::new();
        let mut free_list = Vec::new();
        frames
            .try_reserve_exact(count)
            .and_then(|_| free_list.try_reserve_exact(count))
            .map_err(|_| Error::NoRealStorage)?;
        frames.extend((0..count).map(|i| RealFrame::new(i * frame_size)));
        free_list.extend((0..count).rev().map(FrameId::new));

        Ok(Self {
            storage,
            frames,
            free_list,
            queue: EvictionQueue::new(count),
            frame_size,
        })
    }

    // ========================================================================
    // Frame access
    // ========================================================================

    #[inline]
    pub fn frame(&self, frame_id: FrameId) -> &RealFrame {
        &self.frames[frame_id.0]
    }

    #[inline]
    pub fn frame_mut(&mut self, frame_id: FrameId) -> &mut RealFrame {
        &mut self.frames[frame_id.0]
    }

    /// Bytes of a frame.
    pub fn bytes(&self, frame_id: FrameId) -> &[u8] {
        let offset = self.frames[frame_id.0].offset();
        &self.storage[offset..offset + self.frame_size]
    }

    /// Mutable bytes of a frame.
    pub fn bytes_mut(&mut self, frame_id: FrameId) -> &mut [u8] {
        let offset = self.frames[frame_id.0].offset();
        &mut self.storage[offset..offset + self.frame_size]
    }

    pub fn iter(&self) -> impl Iterator<Item = (FrameId, &RealFrame)> {
        self.frames
            .iter()
            .enumerate()
            .map(|(i, f)| (FrameId::new(i), f))
    }

    // ========================================================================
    // Free list
    // ========================================================================

    /// Take a frame off the free list.
    pub fn take_free(&mut self) -> Option<FrameId> {
        self.free_list.pop()
    }

    /// Unbind a frame and return it to the free list.
    pub fn give_back(&mut self, frame_id: FrameId) {
        self.queue.remove(frame_id);
        self.frames[frame_id.0].unbind();
        self.free_list.push(frame_id);
    }

    #[inline]
    pub fn free_list(&self) -> &[FrameId] {
        &self.free_list
    }

    // ========================================================================
    // Eviction queue
    // ========================================================================

    /// Append an unreferenced frame to the queue tail.
    pub fn enqueue(&mut self, frame_id: FrameId) -> bool {
        let queued = self.queue.push_back(frame_id);
        if queued {
            self.frames[frame_id.0].set_state(FrameState::OnLru);
        }
        queued
    }

    /// Take a queued frame back into use.
    pub fn reactivate(&mut self, frame_id: FrameId) -> bool {
        let removed = self.queue.remove(frame_id);
        if removed {
            self.frames[frame_id.0].set_state(FrameState::Allocated);
        }
        removed
    }

    /// Remove the oldest released frame. It stays bound until the caller
    /// detaches it.
    pub fn pop_victim(&mut self) -> Option<FrameId> {
        self.queue.pop_front()
    }

    /// Abandon an eviction: the victim goes back to the queue head.
    pub fn restore_victim(&mut self, frame_id: FrameId) {
        self.queue.push_front(frame_id);
        self.frames[frame_id.0].set_state(FrameState::OnLru);
    }

    #[inline]
    pub fn queue(&self) -> &EvictionQueue {
        &self.queue
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// Number of real frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Count frames by state.
    pub fn counts(&self) -> FrameCounts {
        let mut counts = FrameCounts::default();
        for frame in &self.frames {
            match frame.state() {
                FrameState::Available => counts.available += 1,
                FrameState::Allocated => counts.allocated += 1,
                FrameState::OnLru => counts.on_lru += 1,
            }
        }
        counts
    }
}
