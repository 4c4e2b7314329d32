//! FIFO-by-release eviction queue.
//!
//! A frame joins the tail when its reference count drops to zero and leaves
//! either from the head (evicted) or from the middle (referenced again).
//! Because release usually follows right after use, the head is a good
//! approximation of the least recently used frame.

use crate::common::FrameId;

/// Doubly linked queue of frame ids, with links stored per frame.
///
/// ```text
///  head                                  tail
///   │                                      │
///   ▼                                      ▼
/// [F3] ⇄ [F0] ⇄ [F7] ⇄ ... ⇄ [F2]
/// oldest release                  newest release
/// ```
///
/// All operations are O(1); `remove` unlinks from the middle without a scan.
#[derive(Debug, Clone)]
pub struct EvictionQueue {
    prev: Vec<Option<FrameId>>,
    next: Vec<Option<FrameId>>,
    queued: Vec<bool>,
    head: Option<FrameId>,
    tail: Option<FrameId>,
    len: usize,
}

impl EvictionQueue {
    /// Queue for frames `0..capacity`, initially empty.
    pub fn new(capacity: usize) -> Self {
        Self {
            prev: vec![None; capacity],
            next: vec![None; capacity],
            queued: vec![false; capacity],
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Append a frame at the tail (most recently released).
    ///
    /// Returns `false` if the frame was already queued.
    pub fn push_back(&mut self, frame_id: FrameId) -> bool {
        if self.queued[frame_id.0] {
            return false;
        }

        self.prev[frame_id.0] = self.tail;
        self.next[frame_id.0] = None;
        match self.tail {
            Some(t) => self.next[t.0] = Some(frame_id),
            None => self.head = Some(frame_id),
        }
        self.tail = Some(frame_id);
        self.queued[frame_id.0] = true;
        self.len += 1;
        true
    }

    /// Put a frame back at the head, ahead of everything else.
    ///
    /// Used when an eviction has to be abandoned.
    pub fn push_front(&mut self, frame_id: FrameId) -> bool {
        if self.queued[frame_id.0] {
            return false;
        }

        self.next[frame_id.0] = self.head;
        self.prev[frame_id.0] = None;
        match self.head {
            Some(h) => self.prev[h.0] = Some(frame_id),
            None => self.tail = Some(frame_id),
        }
        self.head = Some(frame_id);
        self.queued[frame_id.0] = true;
        self.len += 1;
        true
    }

    /// Remove and return the oldest released frame.
    pub fn pop_front(&mut self) -> Option<FrameId> {
        let head = self.head?;
        self.remove(head);
        Some(head)
    }

    /// Unlink a frame wherever it sits. Returns `false` if it was not queued.
    pub fn remove(&mut self, frame_id: FrameId) -> bool {
        if !self.queued[frame_id.0] {
            return false;
        }

        let prev = self.prev[frame_id.0].take();
        let next = self.next[frame_id.0].take();
        match prev {
            Some(p) => self.next[p.0] = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.prev[n.0] = prev,
            None => self.tail = prev,
        }
        self.queued[frame_id.0] = false;
        self.len -= 1;
        true
    }

    #[inline]
    pub fn contains(&self, frame_id: FrameId) -> bool {
        self.queued.get(frame_id.0).copied().unwrap_or(false)
    }

    /// Oldest released frame, without removing it.
    #[inline]
    pub fn front(&self) -> Option<FrameId> {
        self.head
    }

    /// Number of queued frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Walk the queue from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = FrameId> + '_ {
        std::iter::successors(self.head, move |f| self.next[f.0]).take(self.len)
    }
}
