//! Configuration constants and the [`PagingConfig`] used to start a paging space.

use std::path::{Path, PathBuf};

/// Legal frame sizes in bytes (2^8 through 2^19).
///
/// A frame size must match one of these exactly; see
/// [`Geometry`](crate::common::Geometry).
pub const FRAME_SIZES: [usize; 12] = [
    256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 65536, 131072, 262144, 524288,
];

/// Frame size used by a cold start that does not request one.
pub const DEFAULT_FRAME_SIZE: usize = 4096;

/// Real frame count used by a cold start that does not request one.
pub const DEFAULT_REAL_FRAMES: usize = 128;

/// Upper bound on the reference count of a single real frame.
pub const DEFAULT_MAX_REFCOUNT: u32 = 65535;

/// Unit in which the control file is written and read.
pub const CONTROL_BLOCK_SIZE: usize = 4096;

/// Minimum capacity of the file table after its first growth.
pub const MIN_FILE_TABLE_CAPACITY: usize = 16;

/// Minimum capacity of the virtual frame arena after its first growth.
pub const MIN_VFRAME_CAPACITY: usize = 64;

/// Near-prime hash bucket counts, from 257 up to roughly 2^27.
///
/// The index uses the smallest entry that is at least `capacity / 8 + 31`.
pub const DEFAULT_BUCKET_SIZES: [usize; 20] = [
    257, 509, 1021, 2053, 4099, 8191, 16381, 32771, 65537, 131071, 262147, 524287, 1048573,
    2097143, 4194301, 8388593, 16777213, 33554393, 67108859, 134217689,
];

/// Next capacity for a growable table: 1.5x, never below `minimum`.
#[inline]
pub fn grown_capacity(current: usize, minimum: usize) -> usize {
    (current + current / 2).max(minimum)
}

/// How much diagnostic output a paging space produces at termination.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    /// No report.
    Quiet,
    /// Log the statistics counters.
    #[default]
    Stats,
    /// Log the statistics counters and a dump of every real frame.
    Dump,
}

/// Configuration for a cold or warm start.
///
/// `frame_size` and `real_frames` of zero mean "not requested": a cold start
/// falls back to [`DEFAULT_FRAME_SIZE`] / [`DEFAULT_REAL_FRAMES`], a warm
/// start takes the values persisted in the control file.
///
/// # Example
/// ```
/// use pagingspace::PagingConfig;
///
/// let config = PagingConfig::new("space.ctl")
///     .with_frame_size(1024)
///     .with_real_frames(16);
/// assert_eq!(config.frame_size, 1024);
/// ```
#[derive(Debug, Clone)]
pub struct PagingConfig {
    /// Path of the control file (file 0).
    pub control_file: PathBuf,

    /// Requested frame size in bytes, or 0.
    pub frame_size: usize,

    /// Requested number of real frames, or 0.
    pub real_frames: usize,

    /// Reference count ceiling per real frame.
    pub max_refcount: u32,

    /// Candidate hash bucket counts, ascending.
    pub bucket_sizes: Vec<usize>,

    /// Diagnostic output produced by `term`.
    pub diagnostics: DiagnosticLevel,
}

impl PagingConfig {
    /// Configuration with defaults for everything but the control file.
    pub fn new<P: AsRef<Path>>(control_file: P) -> Self {
        Self {
            control_file: control_file.as_ref().to_path_buf(),
            frame_size: 0,
            real_frames: 0,
            max_refcount: DEFAULT_MAX_REFCOUNT,
            bucket_sizes: DEFAULT_BUCKET_SIZES.to_vec(),
            diagnostics: DiagnosticLevel::default(),
        }
    }

    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size;
        self
    }

    pub fn with_real_frames(mut self, real_frames: usize) -> Self {
        self.real_frames = real_frames;
        self
    }

    pub fn with_max_refcount(mut self, max_refcount: u32) -> Self {
        self.max_refcount = max_refcount;
        self
    }

    pub fn with_bucket_sizes(mut self, bucket_sizes: Vec<usize>) -> Self {
        self.bucket_sizes = bucket_sizes;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticLevel) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}
