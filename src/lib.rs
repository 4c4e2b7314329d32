//! pagingspace - a disk-backed paging space with a fixed real frame pool.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          pagingspace                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │      SharedPagingSpace (buffer/)  RwLock + RAII guards   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 PagingSpace (buffer/)                    │   │
//! │  │   VirtualFrameIndex  →  RealFramePool  →  EvictionQueue  │   │
//! │  │   (vaddr hash)          (frames + free)   (FIFO release) │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Storage Layer (storage/)                 │   │
//! │  │     FileTable + FileChannel + control file format        │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (addresses, ids, geometry, Error, config)
//! - [`buffer`] - The paging space, its index and its frame pool
//! - [`storage`] - Backing files and the control file
//!
//! # Quick Start
//! ```no_run
//! use pagingspace::{PagingConfig, PagingSpace, Vaddr};
//!
//! let config = PagingConfig::new("space.ctl").with_frame_size(4096);
//!
//! let mut space = PagingSpace::new();
//! space.cold(&config)?;
//! space.ins_file("space.dat")?;
//!
//! let access = space.access_chg(Vaddr(0x2000))?;
//! space.frame_mut(&access)?.fill(0xEE);
//! space.release(Vaddr(0x2000))?;
//! space.term()?;
//!
//! // Later: pick up where we left off.
//! space.warm(&config)?;
//! let access = space.access_ref(Vaddr(0x2000))?;
//! assert_eq!(space.frame(&access)?[0], 0xEE);
//! # Ok::<(), pagingspace::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::{
    DiagnosticLevel, Error, FileNo, FrameId, PagingConfig, Result, StatusCode, VFrameId, Vaddr,
    Xaddr,
};

pub use buffer::{
    AccessMode, ConsistencyReport, FrameAccess, FrameReadGuard, FrameStatus, FrameWriteGuard,
    PagingSpace, PagingStats, SharedPagingSpace, StatsSnapshot,
};
