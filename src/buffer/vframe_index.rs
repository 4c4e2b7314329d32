//! Virtual Frame Index - descriptors for every allocated virtual frame and
//! the hash table that finds them.

use tracing::debug;

use crate::common::config::{grown_capacity, MIN_VFRAME_CAPACITY};
use crate::common::{Error, FrameId, Result, VFrameId, Xaddr};

/// A virtual frame descriptor.
///
/// Created on first touch of a virtual frame and kept for the lifetime of the
/// paging space. `frame` is set while the virtual frame is resident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFrame {
    /// Next descriptor in the same hash bucket.
    chain: Option<VFrameId>,
    /// Bound real frame, if resident.
    frame: Option<FrameId>,
    /// Frame-aligned virtual address.
    vaddr: u64,
    /// Location in the backing files.
    xaddr: Xaddr,
}

impl VirtualFrame {
    #[inline]
    pub fn vaddr(&self) -> u64 {
        self.vaddr
    }

    #[inline]
    pub fn xaddr(&self) -> Xaddr {
        self.xaddr
    }

    #[inline]
    pub fn frame(&self) -> Option<FrameId> {
        self.frame
    }

    #[inline]
    pub fn set_frame(&mut self, frame: Option<FrameId>) {
        self.frame = frame;
    }

    #[inline]
    pub fn chain(&self) -> Option<VFrameId> {
        self.chain
    }
}

/// Result of a hash lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    pub found: Option<VFrameId>,
    /// Chain entries passed over before the match (or the end of the chain).
    pub hops: u64,
}

/// What an insert did to the index besides adding a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inserted {
    pub id: VFrameId,
    pub grew: bool,
    pub rehashed: bool,
}

/// Arena of virtual frame descriptors with a chained hash table.
///
/// # Architecture
/// ```text
///  buckets: [ 0 ][ 1 ][ 2 ] ... [ B-1 ]
///              │         │
///              ▼         ▼
///  frames:  [VF 4]    [VF 0] ──chain──▶ [VF 9] ──▶ None
///             │
///             ▼ None
/// ```
///
/// Buckets and chain links are arena indices, so growing the arena never
/// invalidates them. A hit moves its descriptor to the front of its chain.
#[derive(Debug, Clone)]
pub struct VirtualFrameIndex {
    frames: Vec<VirtualFrame>,
    buckets: Vec<Option<VFrameId>>,
    bucket_sizes: Vec<usize>,
}

impl VirtualFrameIndex {
    /// Empty index choosing bucket counts from `bucket_sizes`.
    ///
    /// # Errors
    /// `Error::InvalidParameter` if `bucket_sizes` is empty or contains 0.
    pub fn new(mut bucket_sizes: Vec<usize>) -> Result<Self> {
        if bucket_sizes.is_empty() || bucket_sizes.contains(&0) {
            return Err(Error::InvalidParameter(
                "bucket sizes must be non-empty and non-zero".into(),
            ));
        }
        bucket_sizes.sort_unstable();
        bucket_sizes.dedup();

        let count = choose_bucket_count(&bucket_sizes, 0);
        Ok(Self {
            frames: Vec::new(),
            buckets: vec![None; count],
            bucket_sizes,
        })
    }

    /// Bucket of a frame-aligned virtual address for a table of `buckets`.
    ///
    /// `((low32 + high32) & 0x7fffffff) mod buckets`
    #[inline]
    pub fn hash(vaddr: u64, buckets: usize) -> usize {
        let low = vaddr as u32;
        let high = (vaddr >> 32) as u32;
        (low.wrapping_add(high) & 0x7fff_ffff) as usize % buckets
    }

    #[inline]
    pub fn bucket_of(&self, vaddr: u64) -> usize {
        Self::hash(vaddr, self.buckets.len())
    }

    /// Find a descriptor and move it to the front of its chain.
    pub fn lookup(&mut self, vaddr: u64) -> Lookup {
        let bucket = self.bucket_of(vaddr);
        let mut prev: Option<VFrameId> = None;
        let mut cur = self.buckets[bucket];
        let mut hops = 0;

        while let Some(id) = cur {
            if self.frames[id.0].vaddr == vaddr {
                if let Some(p) = prev {
                    self.frames[p.0].chain = self.frames[id.0].chain;
                    self.frames[id.0].chain = self.buckets[bucket];
                    self.buckets[bucket] = Some(id);
                }
                return Lookup {
                    found: Some(id),
                    hops,
                };
            }
            hops += 1;
            prev = cur;
            cur = self.frames[id.0].chain;
        }

        Lookup { found: None, hops }
    }

    /// Find a descriptor without reordering anything.
    pub fn find(&self, vaddr: u64) -> Option<VFrameId> {
        self.chain_of(self.bucket_of(vaddr))
            .find(|id| self.frames[id.0].vaddr == vaddr)
    }

    /// Add a descriptor for an unmapped virtual frame at its bucket head.
    ///
    /// The caller guarantees `vaddr` is not present yet.
    pub fn insert(&mut self, vaddr: u64, xaddr: Xaddr) -> Inserted {
        let mut grew = false;
        let mut rehashed = false;

        if self.frames.len() == self.frames.capacity() {
            let target = grown_capacity(self.frames.capacity(), MIN_VFRAME_CAPACITY);
            self.frames.reserve_exact(target - self.frames.len());
            grew = true;
            debug!(capacity = self.frames.capacity(), "grew virtual frame index");

            let count = choose_bucket_count(&self.bucket_sizes, self.frames.capacity());
            if count != self.buckets.len() {
                self.rehash(count);
                rehashed = true;
            }
        }

        let id = VFrameId(self.frames.len());
        let bucket = self.bucket_of(vaddr);
        self.frames.push(VirtualFrame {
            chain: self.buckets[bucket],
            frame: None,
            vaddr,
            xaddr,
        });
        self.buckets[bucket] = Some(id);

        Inserted { id, grew, rehashed }
    }

    /// Load persisted descriptors into an empty index. Every descriptor is
    /// non-resident.
    ///
    /// # Errors
    /// `Error::ControlFile` if the same virtual frame appears twice.
    pub fn restore(&mut self, records: impl ExactSizeIterator<Item = (u64, Xaddr)>) -> Result<()> {
        self.frames.clear();
        self.frames.reserve_exact(records.len());
        let count = choose_bucket_count(&self.bucket_sizes, self.frames.capacity());
        self.buckets = vec![None; count];

        for (vaddr, xaddr) in records {
            if self.find(vaddr).is_some() {
                return Err(Error::ControlFile(format!(
                    "virtual frame {:#x} persisted twice",
                    vaddr
                )));
            }
            let id = VFrameId(self.frames.len());
            let bucket = self.bucket_of(vaddr);
            self.frames.push(VirtualFrame {
                chain: self.buckets[bucket],
                frame: None,
                vaddr,
                xaddr,
            });
            self.buckets[bucket] = Some(id);
        }

        Ok(())
    }

    /// Rebuild every chain for a table of `count` buckets.
    pub fn rehash(&mut self, count: usize) {
        self.buckets = vec![None; count];
        for i in 0..self.frames.len() {
            let bucket = Self::hash(self.frames[i].vaddr, count);
            self.frames[i].chain = self.buckets[bucket];
            self.buckets[bucket] = Some(VFrameId(i));
        }
        debug!(buckets = count, "rehashed virtual frame index");
    }

    /// Descriptor ids in one bucket, front to back.
    ///
    /// Stops after `len()` steps so a corrupted cycle cannot loop forever.
    pub fn chain_of(&self, bucket: usize) -> impl Iterator<Item = VFrameId> + '_ {
        std::iter::successors(self.buckets[bucket], move |id| {
            self.frames.get(id.0).and_then(|f| f.chain)
        })
        .take(self.frames.len())
    }

    #[inline]
    pub fn get(&self, id: VFrameId) -> &VirtualFrame {
        &self.frames[id.0]
    }

    #[inline]
    pub fn get_mut(&mut self, id: VFrameId) -> &mut VirtualFrame {
        &mut self.frames[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (VFrameId, &VirtualFrame)> {
        self.frames
            .iter()
            .enumerate()
            .map(|(i, f)| (VFrameId(i), f))
    }

    /// Number of descriptors.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.frames.capacity()
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Smallest listed bucket count that is at least `capacity / 8 + 31`, or
/// the largest listed one.
fn choose_bucket_count(sizes: &[usize], capacity: usize) -> usize {
    let wanted = capacity / 8 + 31;
    sizes
        .iter()
        .copied()
        .find(|&s| s >= wanted)
        .unwrap_or_else(|| sizes[sizes.len() - 1])
}
