//! Control file format: the persisted header, file table and virtual frame
//! index of a paging space.
//!
//! # Layout
//! ```text
//! ┌──────────────────┬───────────────────────┬──────────────────────────┐
//! │ block 0          │ file table blocks     │ virtual frame blocks     │
//! │ ControlHeader    │ 512-byte FileRecords  │ 16-byte VFrameRecords    │
//! │ + zero padding   │ + zero padding        │ + zero padding           │
//! └──────────────────┴───────────────────────┴──────────────────────────┘
//! ```
//! Every section is written and read in whole [`CONTROL_BLOCK_SIZE`] blocks.
//! All integers are native-endian; the endianness sentinel in the header
//! rejects a control file written on a machine with the other byte order.

use crate::common::config::CONTROL_BLOCK_SIZE;
use crate::common::{Error, Result};
use crate::storage::file_table::{FileRecord, MAX_FILE_NAME};
use crate::storage::FileChannel;

/// Identifies a control file.
pub const MAGIC: [u8; 8] = *b"PGSMFILE";

/// Format version written by this crate.
pub const VERSION: u32 = 1;

/// Release within the format version.
pub const RELEASE: u32 = 0;

/// Reads back as this value only on a machine with the writer's byte order.
pub const ENDIAN_SENTINEL: u64 = 0x0102_0304_0506_0708;

/// Size of one persisted file table entry.
pub const FILE_RECORD_SIZE: usize = 512;

/// Size of one persisted virtual frame descriptor.
pub const VFRAME_RECORD_SIZE: usize = 16;

/// Fixed header at the start of the control file.
///
/// # Layout (128 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       8     magic "PGSMFILE"
/// 8       4     version
/// 12      4     release
/// 16      8     endianness sentinel
/// 24      4     file_count
/// 28      4     frame_size
/// 32      8     real_frames
/// 40      8     vframe_count
/// 48      4     next_file (round-robin cursor)
/// 52      4     tables_crc (CRC32 of all table blocks)
/// 56      72    reserved, zero
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlHeader {
    pub version: u32,
    pub release: u32,
    pub sentinel: u64,
    pub file_count: u32,
    pub frame_size: u32,
    pub real_frames: u64,
    pub vframe_count: u64,
    pub next_file: u32,
    pub tables_crc: u32,
}

impl ControlHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 128;

    pub const OFFSET_MAGIC: usize = 0;
    pub const OFFSET_VERSION: usize = 8;
    pub const OFFSET_RELEASE: usize = 12;
    pub const OFFSET_SENTINEL: usize = 16;
    pub const OFFSET_FILE_COUNT: usize = 24;
    pub const OFFSET_FRAME_SIZE: usize = 28;
    pub const OFFSET_REAL_FRAMES: usize = 32;
    pub const OFFSET_VFRAME_COUNT: usize = 40;
    pub const OFFSET_NEXT_FILE: usize = 48;
    pub const OFFSET_TABLES_CRC: usize = 52;

    /// Header for the current format; `tables_crc` is filled in on write.
    pub fn new(
        file_count: u32,
        frame_size: u32,
        real_frames: u64,
        vframe_count: u64,
        next_file: u32,
    ) -> Self {
        Self {
            version: VERSION,
            release: RELEASE,
            sentinel: ENDIAN_SENTINEL,
            file_count,
            frame_size,
            real_frames,
            vframe_count,
            next_file,
            tables_crc: 0,
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < ControlHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for ControlHeader");

        data[..Self::SIZE].fill(0);
        data[Self::OFFSET_MAGIC..Self::OFFSET_MAGIC + 8].copy_from_slice(&MAGIC);
        put_u32(data, Self::OFFSET_VERSION, self.version);
        put_u32(data, Self::OFFSET_RELEASE, self.release);
        put_u64(data, Self::OFFSET_SENTINEL, self.sentinel);
        put_u32(data, Self::OFFSET_FILE_COUNT, self.file_count);
        put_u32(data, Self::OFFSET_FRAME_SIZE, self.frame_size);
        put_u64(data, Self::OFFSET_REAL_FRAMES, self.real_frames);
        put_u64(data, Self::OFFSET_VFRAME_COUNT, self.vframe_count);
        put_u32(data, Self::OFFSET_NEXT_FILE, self.next_file);
        put_u32(data, Self::OFFSET_TABLES_CRC, self.tables_crc);
    }

    /// Parse and validate a header.
    ///
    /// # Errors
    /// `Error::ControlFile` on a short buffer, bad magic, foreign byte order,
    /// unknown version/release, or a zero file/frame count.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::ControlFile("header is truncated".into()));
        }
        if data[Self::OFFSET_MAGIC..Self::OFFSET_MAGIC + 8] != MAGIC {
            return Err(Error::ControlFile("bad magic".into()));
        }

        let header = Self {
            version: get_u32(data, Self::OFFSET_VERSION),
            release: get_u32(data, Self::OFFSET_RELEASE),
            sentinel: get_u64(data, Self::OFFSET_SENTINEL),
            file_count: get_u32(data, Self::OFFSET_FILE_COUNT),
            frame_size: get_u32(data, Self::OFFSET_FRAME_SIZE),
            real_frames: get_u64(data, Self::OFFSET_REAL_FRAMES),
            vframe_count: get_u64(data, Self::OFFSET_VFRAME_COUNT),
            next_file: get_u32(data, Self::OFFSET_NEXT_FILE),
            tables_crc: get_u32(data, Self::OFFSET_TABLES_CRC),
        };

        if header.sentinel != ENDIAN_SENTINEL {
            return Err(Error::ControlFile(format!(
                "endianness sentinel {:#018x} does not match this machine",
                header.sentinel
            )));
        }
        if header.version != VERSION || header.release != RELEASE {
            return Err(Error::ControlFile(format!(
                "unsupported format {}.{}, expected {}.{}",
                header.version, header.release, VERSION, RELEASE
            )));
        }
        if header.file_count == 0 || header.frame_size == 0 || header.real_frames == 0 {
            return Err(Error::ControlFile("header declares an empty paging space".into()));
        }

        Ok(header)
    }

    /// Total control file length implied by this header.
    ///
    /// # Errors
    /// `Error::ControlFile` if the declared record counts overflow a file
    /// length.
    pub fn control_len(&self) -> Result<u64> {
        let file_blocks = blocks_for(self.file_count as u64, FILE_RECORD_SIZE);
        let vframe_blocks = blocks_for(self.vframe_count, VFRAME_RECORD_SIZE);
        file_blocks
            .checked_add(vframe_blocks)
            .and_then(|blocks| blocks.checked_add(1))
            .and_then(|blocks| blocks.checked_mul(CONTROL_BLOCK_SIZE as u64))
            .ok_or_else(|| {
                Error::ControlFile(format!(
                    "header declares {} files and {} virtual frames",
                    self.file_count, self.vframe_count
                ))
            })
    }
}

/// The persisted part of a virtual frame descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VFrameRecord {
    pub vaddr: u64,
    pub xaddr: u64,
}

/// Everything the control file holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlImage {
    pub header: ControlHeader,
    pub files: Vec<FileRecord>,
    pub vframes: Vec<VFrameRecord>,
}

/// Write a complete control file: tables first, then the header carrying
/// their checksum, then truncate any stale tail.
pub fn write_control(
    channel: &mut FileChannel,
    mut header: ControlHeader,
    files: &[FileRecord],
    vframes: impl Iterator<Item = VFrameRecord>,
) -> Result<ControlHeader> {
    let mut writer = BlockWriter::new(CONTROL_BLOCK_SIZE as u64);

    let mut record = [0u8; FILE_RECORD_SIZE];
    for file in files {
        encode_file_record(file, &mut record)?;
        writer.push(channel, &record)?;
    }
    writer.finish_section(channel)?;

    let mut vframe_count = 0u64;
    for vf in vframes {
        let mut rec = [0u8; VFRAME_RECORD_SIZE];
        put_u64(&mut rec, 0, vf.vaddr);
        put_u64(&mut rec, 8, vf.xaddr);
        writer.push(channel, &rec)?;
        vframe_count += 1;
    }
    writer.finish_section(channel)?;

    header.file_count = files.len() as u32;
    header.vframe_count = vframe_count;
    header.tables_crc = writer.checksum();

    let mut block = vec![0u8; CONTROL_BLOCK_SIZE];
    header.write_to(&mut block);
    channel.write_at(0, &block)?;
    channel.truncate(writer.offset)?;

    Ok(header)
}

/// Read and validate a complete control file.
pub fn read_control(channel: &mut FileChannel) -> Result<ControlImage> {
    let mut block = vec![0u8; CONTROL_BLOCK_SIZE];
    if channel.len() < CONTROL_BLOCK_SIZE as u64 {
        return Err(Error::ControlFile("control file is shorter than its header".into()));
    }
    channel.read_at(0, &mut block)?;
    let header = ControlHeader::from_bytes(&block)?;

    // Record counts are trusted only once the file is long enough to hold
    // them, which also bounds the table allocations below.
    let required = header.control_len()?;
    if channel.len() < required {
        return Err(Error::ControlFile(format!(
            "control file is {} bytes, header requires {}",
            channel.len(),
            required
        )));
    }

    let mut reader = BlockReader::new(CONTROL_BLOCK_SIZE as u64);

    let mut files = Vec::with_capacity(header.file_count as usize);
    for _ in 0..header.file_count {
        let rec = reader.next(channel, FILE_RECORD_SIZE)?;
        files.push(decode_file_record(rec)?);
    }
    reader.finish_section();

    let mut vframes = Vec::with_capacity(header.vframe_count as usize);
    for _ in 0..header.vframe_count {
        let rec = reader.next(channel, VFRAME_RECORD_SIZE)?;
        vframes.push(VFrameRecord {
            vaddr: get_u64(rec, 0),
            xaddr: get_u64(rec, 8),
        });
    }

    let crc = reader.checksum();
    if crc != header.tables_crc {
        return Err(Error::ControlFile(format!(
            "table checksum mismatch: stored {:#010x}, computed {:#010x}",
            header.tables_crc, crc
        )));
    }

    Ok(ControlImage {
        header,
        files,
        vframes,
    })
}

fn encode_file_record(file: &FileRecord, out: &mut [u8; FILE_RECORD_SIZE]) -> Result<()> {
    let name = file.name.as_bytes();
    if name.len() > MAX_FILE_NAME {
        return Err(Error::InvalidParameter(format!("file name {} too long", file.name)));
    }

    out.fill(0);
    put_u64(out, 0, file.next_ordinal);
    out[8..10].copy_from_slice(&(name.len() as u16).to_ne_bytes());
    out[10..10 + name.len()].copy_from_slice(name);
    Ok(())
}

fn decode_file_record(rec: &[u8]) -> Result<FileRecord> {
    let next_ordinal = get_u64(rec, 0);
    let name_len = u16::from_ne_bytes([rec[8], rec[9]]) as usize;
    if name_len == 0 || name_len > MAX_FILE_NAME {
        return Err(Error::ControlFile(format!("file record name length {}", name_len)));
    }
    let name = std::str::from_utf8(&rec[10..10 + name_len])
        .map_err(|_| Error::ControlFile("file record name is not UTF-8".into()))?;

    Ok(FileRecord {
        name: name.to_string(),
        next_ordinal,
    })
}

/// Accumulates fixed-size records into zero-padded blocks.
struct BlockWriter {
    offset: u64,
    block: Vec<u8>,
    used: usize,
    hasher: crc32fast::Hasher,
}

impl BlockWriter {
    fn new(offset: u64) -> Self {
        Self {
            offset,
            block: vec![0u8; CONTROL_BLOCK_SIZE],
            used: 0,
            hasher: crc32fast::Hasher::new(),
        }
    }

    fn push(&mut self, channel: &mut FileChannel, record: &[u8]) -> Result<()> {
        if self.used + record.len() > CONTROL_BLOCK_SIZE {
            self.flush(channel)?;
        }
        self.block[self.used..self.used + record.len()].copy_from_slice(record);
        self.used += record.len();
        Ok(())
    }

    fn finish_section(&mut self, channel: &mut FileChannel) -> Result<()> {
        if self.used > 0 {
            self.flush(channel)?;
        }
        Ok(())
    }

    fn flush(&mut self, channel: &mut FileChannel) -> Result<()> {
        self.block[self.used..].fill(0);
        self.hasher.update(&self.block);
        channel.write_at(self.offset, &self.block)?;
        self.offset += CONTROL_BLOCK_SIZE as u64;
        self.used = 0;
        Ok(())
    }

    fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

/// Reads fixed-size records back out of blocks written by [`BlockWriter`].
struct BlockReader {
    offset: u64,
    block: Vec<u8>,
    pos: usize,
    hasher: crc32fast::Hasher,
}

impl BlockReader {
    fn new(offset: u64) -> Self {
        Self {
            offset,
            block: vec![0u8; CONTROL_BLOCK_SIZE],
            pos: CONTROL_BLOCK_SIZE,
            hasher: crc32fast::Hasher::new(),
        }
    }

    fn next(&mut self, channel: &mut FileChannel, size: usize) -> Result<&[u8]> {
        if self.pos + size > CONTROL_BLOCK_SIZE {
            channel.read_at(self.offset, &mut self.block)?;
            self.hasher.update(&self.block);
            self.offset += CONTROL_BLOCK_SIZE as u64;
            self.pos = 0;
        }
        let rec = &self.block[self.pos..self.pos + size];
        self.pos += size;
        Ok(rec)
    }

    /// The next record starts in a fresh block.
    fn finish_section(&mut self) {
        self.pos = CONTROL_BLOCK_SIZE;
    }

    fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

fn blocks_for(count: u64, record_size: usize) -> u64 {
    let per_block = (CONTROL_BLOCK_SIZE / record_size) as u64;
    count.div_ceil(per_block)
}

fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
}

fn put_u64(data: &mut [u8], offset: usize, value: u64) {
    data[offset..offset + 8].copy_from_slice(&value.to_ne_bytes());
}

fn get_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_ne_bytes(bytes)
}

fn get_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_ne_bytes(bytes)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_files(n: usize) -> Vec<FileRecord> {
        (0..n)
            .map(|i| FileRecord {
                name: format!("/tmp/file{}.dat", i),
                next_ordinal: i as u64 * 3,
            })
            .collect()
    }

    fn sample_vframes(n: u64) -> Vec<VFrameRecord> {
        (0..n)
            .map(|i| VFrameRecord {
                vaddr: i * 4096,
                xaddr: (i << 12) | 1,
            })
            .collect()
    }

    #[test]
    fn test_header_round_trip() {
        let mut header = ControlHeader::new(3, 4096, 64, 1000, 2);
        header.tables_crc = 0xDEAD_BEEF;

        let mut buf = [0u8; ControlHeader::SIZE];
        header.write_to(&mut buf);
        assert_eq!(&buf[..8], b"PGSMFILE");

        assert_eq!(ControlHeader::from_bytes(&buf).unwrap(), header);
    }

    #[test]
    fn test_header_rejects_bad_magic() {
        let mut buf = [0u8; ControlHeader::SIZE];
        ControlHeader::new(1, 4096, 8, 0, 1).write_to(&mut buf);
        buf[0] = b'X';
        assert!(matches!(
            ControlHeader::from_bytes(&buf),
            Err(Error::ControlFile(_))
        ));
    }

    #[test]
    fn test_header_rejects_foreign_byte_order() {
        let mut header = ControlHeader::new(1, 4096, 8, 0, 1);
        header.sentinel = ENDIAN_SENTINEL.swap_bytes();
        let mut buf = [0u8; ControlHeader::SIZE];
        header.write_to(&mut buf);
        assert!(ControlHeader::from_bytes(&buf).is_err());
    }

    #[test]
    fn test_header_rejects_version_and_empty_counts() {
        let mut buf = [0u8; ControlHeader::SIZE];

        let mut header = ControlHeader::new(1, 4096, 8, 0, 1);
        header.version = VERSION + 1;
        header.write_to(&mut buf);
        assert!(ControlHeader::from_bytes(&buf).is_err());

        ControlHeader::new(0, 4096, 8, 0, 1).write_to(&mut buf);
        assert!(ControlHeader::from_bytes(&buf).is_err());

        ControlHeader::new(1, 4096, 0, 0, 1).write_to(&mut buf);
        assert!(ControlHeader::from_bytes(&buf).is_err());
    }

    #[test]
    fn test_control_len() {
        // 1 header block + 1 file block + 1 vframe block (256 records/block)
        let header = ControlHeader::new(2, 4096, 8, 256, 1);
        assert_eq!(header.control_len().unwrap(), 3 * 4096);

        let header = ControlHeader::new(9, 4096, 8, 257, 1);
        assert_eq!(header.control_len().unwrap(), (1 + 2 + 2) * 4096);

        let header = ControlHeader::new(1, 4096, 8, 0, 1);
        assert_eq!(header.control_len().unwrap(), 2 * 4096);
    }

    #[test]
    fn test_control_len_overflow() {
        let header = ControlHeader::new(1, 4096, 8, u64::MAX, 1);
        assert!(matches!(header.control_len(), Err(Error::ControlFile(_))));
    }

    #[test]
    fn test_read_rejects_huge_vframe_count() {
        let dir = tempdir().unwrap();
        let mut ch = FileChannel::create(dir.path().join("c.ctl")).unwrap();
        let header = ControlHeader::new(0, 4096, 8, 0, 2);
        write_control(&mut ch, header, &sample_files(1), sample_vframes(4).into_iter()).unwrap();

        for count in [u64::MAX, 1 << 40] {
            let mut block = vec![0u8; CONTROL_BLOCK_SIZE];
            ch.read_at(0, &mut block).unwrap();
            put_u64(&mut block, ControlHeader::OFFSET_VFRAME_COUNT, count);
            ch.write_at(0, &block).unwrap();
            assert!(matches!(read_control(&mut ch), Err(Error::ControlFile(_))));
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let mut ch = FileChannel::create(dir.path().join("c.ctl")).unwrap();
        let files = sample_files(10);
        let vframes = sample_vframes(300);

        let header = ControlHeader::new(0, 4096, 32, 0, 4);
        let written =
            write_control(&mut ch, header, &files, vframes.iter().copied()).unwrap();
        assert_eq!(written.file_count, 10);
        assert_eq!(written.vframe_count, 300);
        assert_eq!(ch.len(), written.control_len().unwrap());

        let image = read_control(&mut ch).unwrap();
        assert_eq!(image.header, written);
        assert_eq!(image.files, files);
        assert_eq!(image.vframes, vframes);
    }

    #[test]
    fn test_rewrite_truncates_stale_tail() {
        let dir = tempdir().unwrap();
        let mut ch = FileChannel::create(dir.path().join("c.ctl")).unwrap();
        let files = sample_files(2);

        let header = ControlHeader::new(0, 4096, 8, 0, 1);
        write_control(&mut ch, header, &files, sample_vframes(1000).into_iter()).unwrap();
        let big = ch.len();

        let written = write_control(&mut ch, header, &files, sample_vframes(1).into_iter()).unwrap();
        assert!(ch.len() < big);
        assert_eq!(ch.len(), written.control_len().unwrap());
        assert_eq!(read_control(&mut ch).unwrap().vframes.len(), 1);
    }

    #[test]
    fn test_corrupt_table_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.ctl");
        {
            let mut ch = FileChannel::create(&path).unwrap();
            let header = ControlHeader::new(0, 4096, 8, 0, 1);
            write_control(&mut ch, header, &sample_files(2), sample_vframes(5).into_iter())
                .unwrap();
        }

        let mut raw = std::fs::read(&path).unwrap();
        let vframe_start = 2 * CONTROL_BLOCK_SIZE;
        raw[vframe_start] ^= 0xFF;
        std::fs::write(&path, raw).unwrap();

        let mut ch = FileChannel::open(&path).unwrap();
        match read_control(&mut ch) {
            Err(Error::ControlFile(msg)) => assert!(msg.contains("checksum")),
            other => panic!("expected checksum failure, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_control_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.ctl");
        {
            let mut ch = FileChannel::create(&path).unwrap();
            let header = ControlHeader::new(0, 4096, 8, 0, 1);
            write_control(&mut ch, header, &sample_files(2), sample_vframes(600).into_iter())
                .unwrap();
            ch.truncate(3 * CONTROL_BLOCK_SIZE as u64).unwrap();
        }

        let mut ch = FileChannel::open(&path).unwrap();
        assert!(matches!(read_control(&mut ch), Err(Error::ControlFile(_))));
    }

    #[test]
    fn test_empty_file_rejected() {
        let dir = tempdir().unwrap();
        let mut ch = FileChannel::create(dir.path().join("c.ctl")).unwrap();
        assert!(matches!(read_control(&mut ch), Err(Error::ControlFile(_))));
    }
}
