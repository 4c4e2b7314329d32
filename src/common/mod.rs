//! Common types and utilities shared across the paging space.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`PagingConfig`]
//! - Error types and [`StatusCode`]
//! - Identifiers ([`FrameId`], [`VFrameId`], [`FileNo`]) and addresses
//!   ([`Vaddr`], [`Xaddr`])
//! - Frame [`Geometry`]

mod address;
pub mod config;
pub mod error;
mod frame_id;
mod geometry;

pub use address::{Vaddr, Xaddr};
pub use config::{DiagnosticLevel, PagingConfig};
pub use error::{Error, Result, StatusCode};
pub use frame_id::{FileNo, FrameId, VFrameId};
pub use geometry::Geometry;
