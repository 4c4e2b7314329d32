//! Paging space benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pagingspace::common::config::DEFAULT_BUCKET_SIZES;
use pagingspace::common::Geometry;
use pagingspace::buffer::VirtualFrameIndex;
use pagingspace::{DiagnosticLevel, PagingConfig, PagingSpace, Vaddr, Xaddr};
use tempfile::TempDir;

const FRAME: u64 = 4096;

fn create_space(frames: usize) -> (PagingSpace, TempDir) {
    let dir = TempDir::new().unwrap();
    let mut space = PagingSpace::new();
    space
        .cold(
            &PagingConfig::new(dir.path().join("bench.ctl"))
                .with_frame_size(FRAME as usize)
                .with_real_frames(frames)
                .with_diagnostics(DiagnosticLevel::Quiet),
        )
        .unwrap();
    space.ins_file(dir.path().join("bench.dat")).unwrap();
    (space, dir)
}

fn resident_access_benchmark(c: &mut Criterion) {
    let (mut space, _dir) = create_space(256);
    for n in 0..256 {
        space.access_ref(Vaddr(n * FRAME)).unwrap();
        space.release(Vaddr(n * FRAME)).unwrap();
    }

    c.bench_function("access_resident_256", |b| {
        b.iter(|| {
            for n in 0..256 {
                let vaddr = Vaddr(n * FRAME);
                black_box(space.access_ref(vaddr).unwrap());
                space.release(vaddr).unwrap();
            }
        })
    });
}

fn eviction_benchmark(c: &mut Criterion) {
    let (mut space, _dir) = create_space(16);

    c.bench_function("access_evicting_clean_64", |b| {
        b.iter(|| {
            for n in 0..64 {
                let vaddr = Vaddr(n * FRAME);
                black_box(space.access_ref(vaddr).unwrap());
                space.release(vaddr).unwrap();
            }
        })
    });

    c.bench_function("access_evicting_dirty_64", |b| {
        b.iter(|| {
            for n in 0..64 {
                let vaddr = Vaddr(n * FRAME);
                let access = space.access_chg(vaddr).unwrap();
                space.frame_mut(&access).unwrap()[0] = n as u8;
                space.release(vaddr).unwrap();
            }
        })
    });
}

fn index_benchmark(c: &mut Criterion) {
    let geo = Geometry::new(FRAME as usize).unwrap();

    c.bench_function("index_insert_10000", |b| {
        b.iter(|| {
            let mut index = VirtualFrameIndex::new(DEFAULT_BUCKET_SIZES.to_vec()).unwrap();
            for n in 0..10_000u64 {
                index.insert(n * FRAME, Xaddr(1));
            }
            black_box(index.bucket_count())
        })
    });

    let mut index = VirtualFrameIndex::new(DEFAULT_BUCKET_SIZES.to_vec()).unwrap();
    for n in 0..10_000u64 {
        index.insert(n * FRAME, Xaddr(1));
    }

    c.bench_function("index_lookup_10000", |b| {
        b.iter(|| {
            let mut found = 0;
            for n in 0..10_000u64 {
                if index.lookup(geo.frame_of(Vaddr(n * FRAME + 1))).found.is_some() {
                    found += 1;
                }
            }
            black_box(found)
        })
    });
}

criterion_group!(
    benches,
    resident_access_benchmark,
    eviction_benchmark,
    index_benchmark
);
criterion_main!(benches);
