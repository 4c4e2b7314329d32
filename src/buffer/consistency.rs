//! Full structural self-check of a paging space.

use std::fmt;

use crate::buffer::{FrameCounts, FrameState, RealFramePool, VirtualFrameIndex};
use crate::common::{FrameId, Geometry};

/// Outcome of a consistency check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// One line per broken invariant.
    pub violations: Vec<String>,
    pub counts: FrameCounts,
    pub vframes_checked: usize,
    pub frames_checked: usize,
}

impl ConsistencyReport {
    /// True when no invariant is broken.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for ConsistencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} violation(s) over {} virtual / {} real frames ({})",
            self.violations.len(),
            self.vframes_checked,
            self.frames_checked,
            self.counts
        )
    }
}

/// Check every structural invariant of the index and the pool. O(n) in the
/// number of virtual plus real frames.
pub fn check(
    geometry: &Geometry,
    pool: &RealFramePool,
    index: &VirtualFrameIndex,
    file_count: usize,
) -> ConsistencyReport {
    let mut report = ConsistencyReport {
        counts: pool.counts(),
        vframes_checked: index.len(),
        frames_checked: pool.len(),
        ..Default::default()
    };
    let v = &mut report.violations;

    // Hash table: every chained descriptor sits in its own bucket, once.
    let mut hashed = vec![0u32; index.len()];
    for bucket in 0..index.bucket_count() {
        for id in index.chain_of(bucket) {
            if id.0 >= index.len() {
                v.push(format!("bucket {} chains to out-of-range {}", bucket, id));
                break;
            }
            let vf = index.get(id);
            if index.bucket_of(vf.vaddr()) != bucket {
                v.push(format!(
                    "{} ({:#x}) chained in bucket {}, hashes to {}",
                    id,
                    vf.vaddr(),
                    bucket,
                    index.bucket_of(vf.vaddr())
                ));
            }
            hashed[id.0] += 1;
        }
    }

    // Virtual frames: hashed exactly once, aligned, valid storage, and
    // mutually bound with their real frame.
    for (id, vf) in index.iter() {
        match hashed[id.0] {
            1 => {}
            0 => v.push(format!("{} ({:#x}) is not in the hash table", id, vf.vaddr())),
            n => v.push(format!("{} is chained {} times", id, n)),
        }
        if vf.vaddr() & geometry.mask() != 0 {
            v.push(format!("{} vaddr {:#x} is not frame-aligned", id, vf.vaddr()));
        }
        let file = geometry.xaddr_file(vf.xaddr());
        if file.is_control() || file.0 >= file_count {
            v.push(format!("{} maps to invalid {}", id, file));
        }
        if let Some(f) = vf.frame() {
            if f.0 >= pool.len() {
                v.push(format!("{} bound to out-of-range {}", id, f));
            } else if pool.frame(f).owner() != Some(id) {
                v.push(format!(
                    "{} bound to {} whose owner is {:?}",
                    id,
                    f,
                    pool.frame(f).owner()
                ));
            }
        }
    }

    // Real frames.
    let mut on_free_list = vec![0u32; pool.len()];
    for &f in pool.free_list() {
        if f.0 >= pool.len() {
            v.push(format!("free list holds out-of-range {}", f));
            continue;
        }
        on_free_list[f.0] += 1;
    }

    for (f, frame) in pool.iter() {
        check_frame(f, frame, pool, index, geometry, on_free_list[f.0], v);
    }

    // Conservation.
    let placed = pool.free_list().len() + report.counts.allocated + pool.queue().len();
    if placed != pool.len() {
        v.push(format!(
            "free {} + allocated {} + queued {} != {} real frames",
            pool.free_list().len(),
            report.counts.allocated,
            pool.queue().len(),
            pool.len()
        ));
    }

    report
}

fn check_frame(
    f: FrameId,
    frame: &crate::buffer::RealFrame,
    pool: &RealFramePool,
    index: &VirtualFrameIndex,
    geometry: &Geometry,
    free_entries: u32,
    v: &mut Vec<String>,
) {
    if frame.offset() != f.0 * geometry.frame_size() {
        v.push(format!(
            "{} storage offset {} != expected {}",
            f,
            frame.offset(),
            f.0 * geometry.frame_size()
        ));
    }

    if let Some(owner) = frame.owner() {
        let back = if owner.0 < index.len() {
            index.get(owner).frame()
        } else {
            None
        };
        if back != Some(f) {
            v.push(format!("{} owned by {} which points to {:?}", f, owner, back));
        }
    }

    let queued = pool.queue().contains(f);
    match frame.state() {
        FrameState::Available => {
            if frame.owner().is_some() || frame.is_pinned() || frame.is_dirty() {
                v.push(format!("{} is Available but bound, referenced or dirty", f));
            }
            if free_entries != 1 {
                v.push(format!("{} is Available but on the free list {} times", f, free_entries));
            }
        }
        FrameState::Allocated => {
            if !frame.is_pinned() {
                v.push(format!("{} is Allocated with zero references", f));
            }
        }
        FrameState::OnLru => {
            if frame.is_pinned() {
                v.push(format!("{} is on the eviction queue with {} references", f, frame.refc()));
            }
        }
    }
    if frame.state() != FrameState::Available && free_entries != 0 {
        v.push(format!("{} is {:?} but on the free list", f, frame.state()));
    }
    if frame.state() != FrameState::Available && frame.owner().is_none() {
        v.push(format!("{} is {:?} without an owner", f, frame.state()));
    }
    if queued != (frame.state() == FrameState::OnLru) {
        v.push(format!("{} queued={} but state {:?}", f, queued, frame.state()));
    }
}
