//! Integration tests for the paging space.
//!
//! These tests verify persistence across restarts, control file validation
//! and the shared wrapper.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;

use pagingspace::storage::ControlHeader;
use pagingspace::{
    DiagnosticLevel, Error, FrameStatus, PagingConfig, PagingSpace, SharedPagingSpace, StatusCode,
    Vaddr,
};
use tempfile::tempdir;

const FRAME: u64 = 512;

fn config(dir: &Path) -> PagingConfig {
    PagingConfig::new(dir.join("space.ctl"))
        .with_frame_size(FRAME as usize)
        .with_real_frames(3)
}

fn page(n: u64) -> Vaddr {
    Vaddr(n * FRAME)
}

/// Write a recognizable pattern into `count` pages and terminate.
fn populate(dir: &Path, count: u64) {
    let mut space = PagingSpace::new();
    space.cold(&config(dir)).unwrap();
    space.ins_file(dir.join("a.dat")).unwrap();
    space.ins_file(dir.join("b.dat")).unwrap();

    for n in 0..count {
        let access = space.access_chg(page(n)).unwrap();
        let bytes = space.frame_mut(&access).unwrap();
        bytes[0] = n as u8;
        bytes[FRAME as usize - 1] = (n as u8).wrapping_mul(7);
        space.release(page(n)).unwrap();
    }

    space.term().unwrap();
}

fn corrupt(path: &Path, offset: u64) {
    overwrite(path, offset, &[0xFF]);
}

fn overwrite(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
}

/// Test data persistence across term and warm.
#[test]
fn test_term_warm_round_trip() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 10);

    let mut space = PagingSpace::new();
    space
        .warm(&PagingConfig::new(dir.path().join("space.ctl")))
        .unwrap();

    assert_eq!(space.frame_size(), FRAME as usize);
    assert_eq!(space.frame_count(), 3);
    assert_eq!(space.file_count(), 3);
    assert_eq!(space.vframe_count(), 10);

    for n in 0..10 {
        assert_eq!(space.status(page(n)).unwrap(), FrameStatus::NonResident);
    }
    assert_eq!(space.status(page(10)).unwrap(), FrameStatus::Unmapped);

    for n in 0..10 {
        let access = space.access_ref(page(n)).unwrap();
        let bytes = space.frame(&access).unwrap();
        assert_eq!(bytes[0], n as u8);
        assert_eq!(bytes[FRAME as usize - 1], (n as u8).wrapping_mul(7));
        space.release(page(n)).unwrap();
    }

    assert!(space.check_consistency().unwrap().is_ok());
}

/// Test that round-robin placement continues where it stopped.
#[test]
fn test_warm_keeps_allocation_cursors() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 3);

    let mut space = PagingSpace::new();
    space.warm(&config(dir.path())).unwrap();

    // Pages 0 and 2 went to a.dat, page 1 to b.dat: the next goes to b.dat.
    let xaddr = space.allocate(None, page(3)).unwrap();
    assert_eq!(xaddr.0 & (FRAME - 1), 2);
    assert_eq!(xaddr.0 & !(FRAME - 1), FRAME);
}

#[test]
fn test_warm_overrides_real_frames() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 4);

    let mut space = PagingSpace::new();
    space.warm(&config(dir.path()).with_real_frames(8)).unwrap();
    assert_eq!(space.frame_count(), 8);
}

#[test]
fn test_warm_rejects_frame_size_mismatch() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 2);

    let mut space = PagingSpace::new();
    let err = space
        .warm(&config(dir.path()).with_frame_size(1024))
        .unwrap_err();
    assert!(matches!(err, Error::ControlFile(_)));
    assert!(err.is_fatal());
    assert!(!space.is_initialized());
}

#[test]
fn test_warm_rejects_corrupt_tables() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 2);

    // Inside the first file record, past the header block.
    corrupt(&dir.path().join("space.ctl"), 4096 + 20);

    let mut space = PagingSpace::new();
    let err = space.warm(&config(dir.path())).unwrap_err();
    assert!(matches!(err, Error::ControlFile(_)));
    assert_eq!(err.status(), StatusCode::PagingIoError);
}

#[test]
fn test_warm_rejects_bad_magic() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 1);
    corrupt(&dir.path().join("space.ctl"), 0);

    let mut space = PagingSpace::new();
    assert!(matches!(
        space.warm(&config(dir.path())),
        Err(Error::ControlFile(_))
    ));
}

#[test]
fn test_warm_rejects_huge_vframe_count() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 2);
    let control = dir.path().join("space.ctl");

    for count in [u64::MAX, 1 << 40] {
        overwrite(&control, ControlHeader::OFFSET_VFRAME_COUNT as u64, &count.to_ne_bytes());
        let mut space = PagingSpace::new();
        assert!(matches!(
            space.warm(&config(dir.path())),
            Err(Error::ControlFile(_))
        ));
    }
}

#[test]
fn test_warm_rejects_huge_persisted_real_frames() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 2);
    let control = dir.path().join("space.ctl");
    let persisted = config(dir.path()).with_real_frames(0);

    for count in [u64::MAX, 1 << 54] {
        overwrite(&control, ControlHeader::OFFSET_REAL_FRAMES as u64, &count.to_ne_bytes());
        let mut space = PagingSpace::new();
        assert!(matches!(space.warm(&persisted), Err(Error::ControlFile(_))));
        assert!(!space.is_initialized());
    }

    // An explicit count still overrides the corrupt one.
    let mut space = PagingSpace::new();
    space.warm(&config(dir.path())).unwrap();
    assert_eq!(space.frame_count(), 3);
}

#[test]
fn test_warm_missing_control_file() {
    let dir = tempdir().unwrap();
    let mut space = PagingSpace::new();
    let err = space.warm(&config(dir.path())).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert!(!space.is_initialized());
}

#[test]
fn test_cold_start_discards_previous_run() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 5);

    let mut space = PagingSpace::new();
    space.cold(&config(dir.path())).unwrap();
    assert_eq!(space.vframe_count(), 0);
    assert_eq!(space.file_count(), 1);
    space.term().unwrap();

    let mut space = PagingSpace::new();
    space.warm(&config(dir.path())).unwrap();
    assert_eq!(space.vframe_count(), 0);
}

/// Dropping an initialized space persists it like `term`.
#[test]
fn test_drop_terminates() {
    let dir = tempdir().unwrap();
    {
        let mut space = PagingSpace::new();
        space
            .cold(&config(dir.path()).with_diagnostics(DiagnosticLevel::Dump))
            .unwrap();
        space.ins_file(dir.path().join("a.dat")).unwrap();
        let access = space.access_chg(page(9)).unwrap();
        space.frame_mut(&access).unwrap()[5] = 99;
        // Still referenced at drop: written back anyway.
    }

    let mut space = PagingSpace::new();
    space.warm(&config(dir.path())).unwrap();
    let access = space.access_ref(page(9)).unwrap();
    assert_eq!(space.frame(&access).unwrap()[5], 99);
}

/// Several threads share one space through guards.
#[test]
fn test_shared_space_across_threads() {
    let dir = tempdir().unwrap();
    let shared = Arc::new(SharedPagingSpace::new());
    shared.cold(&config(dir.path()).with_real_frames(8)).unwrap();
    shared.ins_file(dir.path().join("a.dat")).unwrap();

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for n in 0..16u64 {
                    let vaddr = page(t * 16 + n);
                    let guard = shared.fetch_write(vaddr).unwrap();
                    guard.data_mut().unwrap()[0] = (t * 16 + n) as u8;
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for n in 0..64u64 {
        let guard = shared.fetch_read(page(n)).unwrap();
        assert_eq!(guard.data().unwrap()[0], n as u8);
    }

    assert_eq!(shared.read().vframe_count(), 64);
    assert!(shared.write().check_consistency().unwrap().is_ok());
    shared.term().unwrap();
}

#[test]
fn test_guard_outliving_term_is_stale() {
    let dir = tempdir().unwrap();
    let shared = SharedPagingSpace::new();
    shared.cold(&config(dir.path())).unwrap();
    shared.ins_file(dir.path().join("a.dat")).unwrap();

    let guard = shared.fetch_read(page(1)).unwrap();
    shared.term().unwrap();
    assert!(matches!(guard.data(), Err(Error::StaleAccess(_))));
    // Dropping the guard after term only logs.
    drop(guard);
}
