//! Paging space management.
//!
//! The paging space caches virtual frames, each backed by a frame of a data
//! file, in a fixed pool of real frames.
//!
//! # Components
//! - [`PagingSpace`] - The main virtual frame cache
//! - [`VirtualFrameIndex`] - Virtual frame descriptors and their hash table
//! - [`RealFramePool`] - Real frames, free list and eviction queue
//! - [`SharedPagingSpace`] - Locked wrapper with RAII frame guards
//! - [`PagingStats`] - Performance statistics
//! - [`replacer`] - Eviction queue

mod consistency;
mod frame;
mod frame_block;
mod frame_guard;
mod paging_space;
mod real_pool;
pub mod replacer;
mod shared;
mod stats;
mod vframe_index;

pub use consistency::ConsistencyReport;
pub use frame::{FrameState, RealFrame};
pub use frame_guard::{FrameReadGuard, FrameWriteGuard};
pub use paging_space::{AccessMode, FrameAccess, FrameStatus, PagingSpace};
pub use real_pool::{FrameCounts, RealFramePool};
pub use shared::SharedPagingSpace;
pub use stats::{PagingStats, StatsSnapshot};
pub use vframe_index::{Inserted, Lookup, VirtualFrame, VirtualFrameIndex};
