//! Virtual and external address types.

use std::fmt;

/// A caller-visible virtual address.
///
/// The bits above the frame mask select a virtual frame; the bits below are
/// the byte offset inside it. How the split falls depends on the frame size
/// chosen at startup, see [`Geometry`](crate::common::Geometry).
///
/// # Example
/// ```
/// use pagingspace::Vaddr;
///
/// let vaddr = Vaddr::new(0x2010);
/// assert_eq!(vaddr.0, 0x2010);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vaddr(pub u64);

impl Vaddr {
    #[inline]
    pub fn new(addr: u64) -> Self {
        Vaddr(addr)
    }
}

impl fmt::Display for Vaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vaddr({:#x})", self.0)
    }
}

impl From<u64> for Vaddr {
    fn from(addr: u64) -> Self {
        Vaddr(addr)
    }
}

/// External address: where a virtual frame lives on disk.
///
/// # Layout
/// ```text
///  63                       log2(frame size)          0
/// ┌─────────────────────────────┬─────────────────────┐
/// │ byte offset in file         │ file number         │
/// │ (ordinal × frame size)      │                     │
/// └─────────────────────────────┴─────────────────────┘
/// ```
///
/// Packing and unpacking need the frame geometry and are done by
/// [`Geometry::xaddr`](crate::common::Geometry::xaddr) and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Xaddr(pub u64);

impl fmt::Display for Xaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Xaddr({:#x})", self.0)
    }
}
