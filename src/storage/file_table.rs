//! File Table - the backing files of a paging space.

use std::path::Path;

use tracing::debug;

use crate::common::config::{grown_capacity, MIN_FILE_TABLE_CAPACITY};
use crate::common::{Error, FileNo, Geometry, Result, Xaddr};
use crate::storage::FileChannel;

/// Longest file name a file table record can hold, in bytes.
pub const MAX_FILE_NAME: usize = 502;

/// The persisted part of a file table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub next_ordinal: u64,
}

#[derive(Debug)]
struct FileEntry {
    name: String,
    /// Ordinal of the next frame to hand out in this file.
    next_ordinal: u64,
    channel: FileChannel,
}

/// Ordered list of backing files.
///
/// ```text
/// ┌────────────┬────────────┬────────────┬─────
/// │ 0: control │ 1: data    │ 2: data    │ ...
/// └────────────┴────────────┴────────────┴─────
///                 ▲ round-robin cursor cycles over 1..len
/// ```
///
/// File 0 holds the persisted metadata and never receives virtual frames.
#[derive(Debug)]
pub struct FileTable {
    entries: Vec<FileEntry>,
    /// Data file the next round-robin allocation goes to.
    next_file: usize,
}

impl FileTable {
    /// Start a table with a freshly created control file.
    pub fn create_control<P: AsRef<Path>>(control: P) -> Result<Self> {
        let name = file_name(control.as_ref())?;
        let channel = FileChannel::create(control)?;

        let mut entries = Vec::with_capacity(MIN_FILE_TABLE_CAPACITY);
        entries.push(FileEntry {
            name,
            next_ordinal: 0,
            channel,
        });

        Ok(Self {
            entries,
            next_file: 1,
        })
    }

    /// Rebuild a table from persisted records, reopening every data file.
    ///
    /// `records[0]` describes the control file, which is already open as
    /// `control`.
    pub fn restore(control: FileChannel, records: Vec<FileRecord>, next_file: usize) -> Result<Self> {
        let mut records = records.into_iter();
        let first = records
            .next()
            .ok_or_else(|| Error::ControlFile("file table is empty".into()))?;

        let mut entries = Vec::with_capacity(MIN_FILE_TABLE_CAPACITY.max(records.len() + 1));
        entries.push(FileEntry {
            name: file_name(control.path())?,
            next_ordinal: first.next_ordinal,
            channel: control,
        });

        for record in records {
            let channel = FileChannel::open(&record.name)?;
            debug!(file = %record.name, size = channel.len(), "reopened backing file");
            entries.push(FileEntry {
                name: record.name,
                next_ordinal: record.next_ordinal,
                channel,
            });
        }

        Ok(Self { entries, next_file })
    }

    /// Add a backing data file, creating (or truncating) it.
    ///
    /// # Errors
    /// - `Error::InvalidParameter` if the name is not UTF-8 or too long
    /// - `Error::NoStorage` if the file number would not fit an external address
    pub fn insert<P: AsRef<Path>>(&mut self, path: P, geometry: &Geometry) -> Result<FileNo> {
        let name = file_name(path.as_ref())?;
        let file_no = FileNo(self.entries.len());
        if file_no.0 > geometry.max_file_no() {
            return Err(Error::NoStorage(format!(
                "file table full at {} files",
                self.entries.len()
            )));
        }

        if self.entries.len() == self.entries.capacity() {
            let target = grown_capacity(self.entries.capacity(), MIN_FILE_TABLE_CAPACITY);
            self.entries.reserve_exact(target - self.entries.len());
            debug!(capacity = target, "grew file table");
        }

        let channel = FileChannel::create(path)?;
        self.entries.push(FileEntry {
            name,
            next_ordinal: 0,
            channel,
        });

        Ok(file_no)
    }

    /// Reserve the next frame of a data file and return its external address.
    ///
    /// With `file == None` the file is chosen round-robin over all data files.
    pub fn assign(&mut self, file: Option<FileNo>, geometry: &Geometry) -> Result<Xaddr> {
        if self.entries.len() < 2 {
            return Err(Error::NoStorage("no backing data file".into()));
        }

        let file_no = match file {
            Some(f) if f.is_control() || f.0 >= self.entries.len() => {
                return Err(Error::InvalidParameter(format!("{} is not a data file", f)));
            }
            Some(f) => f,
            None => {
                if self.next_file == 0 || self.next_file >= self.entries.len() {
                    self.next_file = 1;
                }
                let f = FileNo(self.next_file);
                self.next_file += 1;
                f
            }
        };

        let entry = &mut self.entries[file_no.0];
        let xaddr = geometry
            .xaddr(file_no, entry.next_ordinal)
            .ok_or_else(|| Error::NoStorage(format!("{} is out of frame ordinals", file_no)))?;
        entry.next_ordinal += 1;

        Ok(xaddr)
    }

    /// Channel of a backing file.
    pub fn channel(&mut self, file: FileNo) -> Result<&mut FileChannel> {
        self.entries
            .get_mut(file.0)
            .map(|e| &mut e.channel)
            .ok_or_else(|| Error::InvalidParameter(format!("{} does not exist", file)))
    }

    /// The control file channel.
    pub fn control(&mut self) -> &mut FileChannel {
        &mut self.entries[0].channel
    }

    /// Persistable view of every entry, control file first.
    pub fn records(&self) -> Vec<FileRecord> {
        self.entries
            .iter()
            .map(|e| FileRecord {
                name: e.name.clone(),
                next_ordinal: e.next_ordinal,
            })
            .collect()
    }

    /// Sync every file to stable storage, reporting the first failure.
    pub fn sync_all(&mut self) -> Result<()> {
        let mut first_err = None;
        for entry in &mut self.entries {
            if let Err(e) = entry.channel.sync() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Number of files, control file included.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    #[inline]
    pub fn next_file(&self) -> usize {
        self.next_file
    }

    pub fn name(&self, file: FileNo) -> Option<&str> {
        self.entries.get(file.0).map(|e| e.name.as_str())
    }

    pub fn next_ordinal(&self, file: FileNo) -> Option<u64> {
        self.entries.get(file.0).map(|e| e.next_ordinal)
    }
}

fn file_name(path: &Path) -> Result<String> {
    let name = path
        .to_str()
        .ok_or_else(|| Error::InvalidParameter(format!("{:?} is not UTF-8", path)))?;
    if name.is_empty() || name.len() > MAX_FILE_NAME {
        return Err(Error::InvalidParameter(format!(
            "file name must be 1..={} bytes, got {}",
            MAX_FILE_NAME,
            name.len()
        )));
    }
    Ok(name.to_string())
}
