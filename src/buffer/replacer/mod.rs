//! Eviction policy implementation.
//!
//! - [`EvictionQueue`] - FIFO by release time, O(1) unlink on re-reference

mod eviction_queue;

pub use eviction_queue::EvictionQueue;
