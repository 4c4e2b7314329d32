//! Error types for the paging space.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::common::Vaddr;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse outcome of a paging operation.
///
/// Every [`Error`] maps to exactly one code through [`Error::status`];
/// successful operations correspond to [`StatusCode::Ok`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    NotInitialized,
    InvalidParameter,
    /// The virtual address was never allocated.
    VaddrInvalid,
    /// The virtual address is mapped but not resident.
    VaddrOnDisk,
    NoRealStorage,
    NoStorage,
    PagingIoError,
    InternalLogicError,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Ok => "OK",
            StatusCode::NotInitialized => "NOT_INITIALIZED",
            StatusCode::InvalidParameter => "INVALID_PARAMETER",
            StatusCode::VaddrInvalid => "VADDR_INVALID",
            StatusCode::VaddrOnDisk => "VADDR_ON_DISK",
            StatusCode::NoRealStorage => "NO_REAL_STORAGE",
            StatusCode::NoStorage => "NO_STORAGE",
            StatusCode::PagingIoError => "PAGING_IO_ERROR",
            StatusCode::InternalLogicError => "INTERNAL_LOGIC_ERROR",
        };
        f.write_str(name)
    }
}

/// All possible errors in the paging space.
///
/// Most errors are recoverable: the operation fails and the space stays
/// usable. [`Error::is_fatal`] identifies the ones that shut the space down.
#[derive(Debug, Error)]
pub enum Error {
    /// The paging space has not been started, or was shut down.
    #[error("paging space is not initialized")]
    NotInitialized,

    /// `cold`/`warm` called on a running paging space.
    #[error("paging space is already initialized")]
    AlreadyInitialized,

    /// A caller-supplied argument was rejected.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The requested frame size is not one of the legal sizes.
    #[error("illegal frame size {0} (FRAMESZ)")]
    FrameSize(usize),

    /// The virtual frame has never been allocated.
    #[error("{0} is not mapped")]
    VaddrInvalid(Vaddr),

    /// The virtual frame is mapped but has no resident real frame.
    #[error("{0} is not resident")]
    VaddrOnDisk(Vaddr),

    /// `allocate` on a virtual frame that already has external storage.
    #[error("{0} is already mapped")]
    AlreadyMapped(Vaddr),

    /// `release`/`access_sci` without an outstanding reference.
    #[error("{0} has no outstanding reference")]
    NotReferenced(Vaddr),

    /// The frame's reference count is at its ceiling.
    #[error("reference count of {vaddr} saturated at {max}")]
    RefcountSaturated { vaddr: Vaddr, max: u32 },

    /// An access handle outlived its reference or its frame binding.
    #[error("stale access handle for {0}")]
    StaleAccess(Vaddr),

    /// Every real frame is referenced; nothing can be evicted.
    #[error("no real frame available")]
    NoRealStorage,

    /// No external storage can be assigned.
    #[error("no external storage: {0}")]
    NoStorage(String),

    /// I/O error on a backing file.
    #[error("paging I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// The control file is unreadable, corrupt or incompatible.
    #[error("control file rejected: {0}")]
    ControlFile(String),

    /// The consistency check found violations.
    #[error("consistency check failed with {0} violation(s)")]
    Inconsistent(usize),

    /// An internal invariant did not hold.
    #[error("internal logic error: {message}")]
    InternalLogic { message: String, fatal: bool },
}

impl Error {
    /// Status code reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotInitialized => StatusCode::NotInitialized,
            Error::AlreadyInitialized
            | Error::InvalidParameter(_)
            | Error::FrameSize(_)
            | Error::AlreadyMapped(_)
            | Error::NotReferenced(_)
            | Error::RefcountSaturated { .. }
            | Error::StaleAccess(_) => StatusCode::InvalidParameter,
            Error::VaddrInvalid(_) => StatusCode::VaddrInvalid,
            Error::VaddrOnDisk(_) => StatusCode::VaddrOnDisk,
            Error::NoRealStorage => StatusCode::NoRealStorage,
            Error::NoStorage(_) => StatusCode::NoStorage,
            Error::Io { .. } | Error::ControlFile(_) => StatusCode::PagingIoError,
            Error::Inconsistent(_) | Error::InternalLogic { .. } => {
                StatusCode::InternalLogicError
            }
        }
    }

    /// Whether this error terminates the paging space.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::ControlFile(_) | Error::Inconsistent(_) => true,
            Error::InternalLogic { fatal, .. } => *fatal,
            _ => false,
        }
    }
}
