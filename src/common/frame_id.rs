//! Frame identifier types.

use std::fmt;

/// Identifies a real frame in the pool.
///
/// Real frames live in a fixed `Vec`, so the id is a direct index:
/// `frames[frame_id.0]`.
///
/// # Example
/// ```
/// use pagingspace::FrameId;
///
/// let frame_id = FrameId::new(5);
/// assert_eq!(frame_id.0, 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Create a new FrameId.
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

/// Identifies a virtual frame descriptor in the index arena.
///
/// Descriptors are never removed from the arena, so an id stays valid for the
/// lifetime of the paging space even when the arena reallocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VFrameId(pub usize);

impl VFrameId {
    #[inline]
    pub fn new(id: usize) -> Self {
        VFrameId(id)
    }
}

impl fmt::Display for VFrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VFrame({})", self.0)
    }
}

/// Index of a backing file in the file table. File 0 is the control file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileNo(pub usize);

impl FileNo {
    /// The control file.
    pub const CONTROL: FileNo = FileNo(0);

    #[inline]
    pub fn new(id: usize) -> Self {
        FileNo(id)
    }

    #[inline]
    pub fn is_control(&self) -> bool {
        *self == Self::CONTROL
    }
}

impl fmt::Display for FileNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_new() {
        let fid = FrameId::new(10);
        assert_eq!(fid.0, 10);
    }

    #[test]
    fn test_frame_id_equality() {
        assert_eq!(FrameId::new(5), FrameId::new(5));
        assert_ne!(FrameId::new(5), FrameId::new(6));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", FrameId::new(42)), "Frame(42)");
        assert_eq!(format!("{}", VFrameId::new(7)), "VFrame(7)");
        assert_eq!(format!("{}", FileNo::new(2)), "File(2)");
    }

    #[test]
    fn test_control_file_no() {
        assert!(FileNo::CONTROL.is_control());
        assert!(!FileNo::new(1).is_control());
    }
}
