//! File Channel - raw positioned I/O on one backing file.
//!
//! The [`FileChannel`] handles all direct file operations for the paging
//! space:
//! - Reading and writing regions at a byte offset
//! - Zero-filling regions that were never written
//! - Truncating and syncing the file

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::Result;

/// Size of the zero buffer used to pad gaps before a write.
const ZERO_CHUNK: usize = 64 * 1024;

/// Positioned I/O on a single file with zero-fill semantics.
///
/// # High-water mark
/// The channel remembers how far the file has been written (`high_water`,
/// initially the file length at open):
/// ```text
/// 0                     high_water
/// ├──── real content ───────┤ ··· never written ··· │
///                           reads here return zeros
/// ```
/// - A read entirely past the mark fills the buffer with zeros without
///   touching the file. A read straddling the mark reads the real part and
///   zeroes the rest.
/// - A write starting past the mark first writes zeros from the mark to the
///   write offset, so the file never contains a sparse gap.
///
/// # Thread Safety
/// `FileChannel` is **single-threaded**. The paging space serializes all
/// access to it.
#[derive(Debug)]
pub struct FileChannel {
    file: File,
    path: PathBuf,
    high_water: u64,
}

impl FileChannel {
    /// Create a file, truncating it if it already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            high_water: 0,
        })
    }

    /// Open an existing file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let high_water = file.metadata()?.len();

        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            high_water,
        })
    }

    /// Fill `buf` with the bytes at `offset`.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let available = self.high_water.saturating_sub(offset);
        let real = (available.min(buf.len() as u64)) as usize;

        if real > 0 {
            self.file.seek(SeekFrom::Start(offset))?;
            self.file.read_exact(&mut buf[..real])?;
        }
        buf[real..].fill(0);

        Ok(())
    }

    /// Write `buf` at `offset`, zero-padding any gap after the high-water mark.
    pub fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        if offset > self.high_water {
            self.zero_fill(self.high_water, offset)?;
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        self.high_water = self.high_water.max(offset + buf.len() as u64);

        Ok(())
    }

    fn zero_fill(&mut self, from: u64, to: u64) -> Result<()> {
        let zeros = [0u8; ZERO_CHUNK];
        self.file.seek(SeekFrom::Start(from))?;

        let mut remaining = to - from;
        while remaining > 0 {
            let n = remaining.min(ZERO_CHUNK as u64) as usize;
            self.file.write_all(&zeros[..n])?;
            remaining -= n as u64;
        }
        self.high_water = to;

        Ok(())
    }

    /// Cut the file to `len` bytes.
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.high_water = len;
        Ok(())
    }

    /// Flush file contents and metadata to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Number of bytes written so far (the high-water mark).
    #[inline]
    pub fn len(&self) -> u64 {
        self.high_water
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.high_water == 0
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_is_empty() {
        let dir = tempdir().unwrap();
        let ch = FileChannel::create(dir.path().join("a.dat")).unwrap();
        assert!(ch.is_empty());
        assert_eq!(ch.len(), 0);
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        assert!(FileChannel::open(dir.path().join("missing.dat")).is_err());
    }

    #[test]
    fn test_read_past_high_water_is_zero() {
        let dir = tempdir().unwrap();
        let mut ch = FileChannel::create(dir.path().join("a.dat")).unwrap();

        let mut buf = [0xFFu8; 512];
        ch.read_at(4096, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));

        // Nothing was written to the file.
        assert_eq!(std::fs::metadata(ch.path()).unwrap().len(), 0);
    }

    #[test]
    fn test_write_pads_gap_with_zeros() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.dat");
        let mut ch = FileChannel::create(&path).unwrap();

        ch.write_at(1000, &[7u8; 24]).unwrap();
        assert_eq!(ch.len(), 1024);

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(raw.len(), 1024);
        assert!(raw[..1000].iter().all(|&b| b == 0));
        assert!(raw[1000..].iter().all(|&b| b == 7));
    }

    #[test]
    fn test_read_straddling_high_water() {
        let dir = tempdir().unwrap();
        let mut ch = FileChannel::create(dir.path().join("a.dat")).unwrap();
        ch.write_at(0, &[9u8; 100]).unwrap();

        let mut buf = [0xFFu8; 256];
        ch.read_at(0, &mut buf).unwrap();
        assert!(buf[..100].iter().all(|&b| b == 9));
        assert!(buf[100..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_persistence_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.dat");

        {
            let mut ch = FileChannel::create(&path).unwrap();
            ch.write_at(512, &[0x42u8; 512]).unwrap();
            ch.sync().unwrap();
        }

        let mut ch = FileChannel::open(&path).unwrap();
        assert_eq!(ch.len(), 1024);
        let mut buf = [0u8; 512];
        ch.read_at(512, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0x42));
    }

    #[test]
    fn test_truncate() {
        let dir = tempdir().unwrap();
        let mut ch = FileChannel::create(dir.path().join("a.dat")).unwrap();
        ch.write_at(0, &[1u8; 4096]).unwrap();
        ch.truncate(100).unwrap();
        assert_eq!(ch.len(), 100);

        let mut buf = [0xFFu8; 200];
        ch.read_at(0, &mut buf).unwrap();
        assert!(buf[..100].iter().all(|&b| b == 1));
        assert!(buf[100..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_create_truncates_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.dat");
        std::fs::write(&path, [1u8; 300]).unwrap();

        let ch = FileChannel::create(&path).unwrap();
        assert_eq!(ch.len(), 0);
    }
}
