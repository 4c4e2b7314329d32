//! Storage layer - backing files and the control file format.
//!
//! This module handles persistent storage:
//! - [`FileChannel`] - Positioned I/O on one file
//! - [`FileTable`] - The control file and data files of a paging space
//! - [`control`] - Control file layout

pub mod control;
mod file_channel;
pub mod file_table;

pub use control::{ControlHeader, ControlImage, VFrameRecord};
pub use file_channel::FileChannel;
pub use file_table::{FileRecord, FileTable};
