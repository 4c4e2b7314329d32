//! Frame geometry: the frame size chosen at startup and the address
//! arithmetic derived from it.

use crate::common::config::FRAME_SIZES;
use crate::common::{Error, FileNo, Result, Vaddr, Xaddr};

/// Frame size with its precomputed mask and shift.
///
/// # Example
/// ```
/// use pagingspace::common::Geometry;
/// use pagingspace::Vaddr;
///
/// let geo = Geometry::new(4096).unwrap();
/// assert_eq!(geo.frame_of(Vaddr(0x2010)), 0x2000);
/// assert_eq!(geo.offset_of(Vaddr(0x2010)), 0x10);
/// assert!(Geometry::new(4000).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    size: usize,
    mask: u64,
    log2: u32,
}

impl Geometry {
    /// Select the geometry for `frame_size`.
    ///
    /// # Errors
    /// `Error::FrameSize` unless `frame_size` is one of [`FRAME_SIZES`].
    pub fn new(frame_size: usize) -> Result<Self> {
        if !FRAME_SIZES.contains(&frame_size) {
            return Err(Error::FrameSize(frame_size));
        }

        Ok(Self {
            size: frame_size,
            mask: frame_size as u64 - 1,
            log2: frame_size.trailing_zeros(),
        })
    }

    #[inline]
    pub fn frame_size(&self) -> usize {
        self.size
    }

    /// Intra-frame offset bits.
    #[inline]
    pub fn mask(&self) -> u64 {
        self.mask
    }

    #[inline]
    pub fn log2(&self) -> u32 {
        self.log2
    }

    /// Frame-aligned part of a virtual address.
    #[inline]
    pub fn frame_of(&self, vaddr: Vaddr) -> u64 {
        vaddr.0 & !self.mask
    }

    /// Byte offset of a virtual address inside its frame.
    #[inline]
    pub fn offset_of(&self, vaddr: Vaddr) -> usize {
        (vaddr.0 & self.mask) as usize
    }

    /// Highest file number an external address can carry.
    #[inline]
    pub fn max_file_no(&self) -> usize {
        self.mask as usize
    }

    /// Pack a file number and frame ordinal into an external address.
    ///
    /// Returns `None` if the file number does not fit under the mask or the
    /// byte offset overflows 64 bits.
    pub fn xaddr(&self, file: FileNo, ordinal: u64) -> Option<Xaddr> {
        if file.0 as u64 > self.mask || ordinal > (u64::MAX >> self.log2) {
            return None;
        }
        Some(Xaddr((ordinal << self.log2) | file.0 as u64))
    }

    /// File number stored in an external address.
    #[inline]
    pub fn xaddr_file(&self, xaddr: Xaddr) -> FileNo {
        FileNo((xaddr.0 & self.mask) as usize)
    }

    /// Byte offset in the backing file stored in an external address.
    #[inline]
    pub fn xaddr_offset(&self, xaddr: Xaddr) -> u64 {
        xaddr.0 & !self.mask
    }
}
