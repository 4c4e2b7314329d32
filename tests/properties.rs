//! Property tests: address arithmetic, random operation sequences checked
//! against a simple model, and persistence round trips.

use std::collections::HashMap;

use pagingspace::common::config::FRAME_SIZES;
use pagingspace::common::Geometry;
use pagingspace::{Error, FileNo, PagingConfig, PagingSpace, Vaddr};
use proptest::prelude::*;
use tempfile::tempdir;

const FRAME: u64 = 256;
const REAL_FRAMES: usize = 4;

#[derive(Debug, Clone)]
enum Op {
    Change(u64, u8),
    Reference(u64),
    Release(u64),
    Upgrade(u64),
}

fn op() -> impl Strategy<Value = Op> {
    let page = 0u64..12;
    prop_oneof![
        (page.clone(), any::<u8>()).prop_map(|(p, b)| Op::Change(p, b)),
        page.clone().prop_map(Op::Reference),
        page.clone().prop_map(Op::Release),
        page.prop_map(Op::Upgrade),
    ]
}

fn page(n: u64) -> Vaddr {
    Vaddr(n * FRAME)
}

proptest! {
    #[test]
    fn prop_address_splitting(v in any::<u64>(), size_idx in 0usize..FRAME_SIZES.len()) {
        let geo = Geometry::new(FRAME_SIZES[size_idx]).unwrap();
        let vaddr = Vaddr(v);

        prop_assert_eq!(geo.frame_of(vaddr) | geo.offset_of(vaddr) as u64, v);
        prop_assert!(geo.offset_of(vaddr) < geo.frame_size());
        prop_assert_eq!(geo.frame_of(vaddr) & geo.mask(), 0);
    }

    #[test]
    fn prop_xaddr_packing(file in 1usize..256, ordinal in 0u64..(1 << 40)) {
        let geo = Geometry::new(256).unwrap();
        let xaddr = geo.xaddr(FileNo(file), ordinal).unwrap();

        prop_assert_eq!(geo.xaddr_file(xaddr), FileNo(file));
        prop_assert_eq!(geo.xaddr_offset(xaddr), ordinal * 256);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Random API use never breaks an invariant, keeps every reference
    /// count in line with a model, and never loses written bytes.
    #[test]
    fn prop_random_operations(ops in prop::collection::vec(op(), 1..120)) {
        let dir = tempdir().unwrap();
        let mut space = PagingSpace::new();
        space.cold(&PagingConfig::new(dir.path().join("p.ctl"))
            .with_frame_size(FRAME as usize)
            .with_real_frames(REAL_FRAMES)).unwrap();
        space.ins_file(dir.path().join("p.dat")).unwrap();

        let mut refs: HashMap<u64, u32> = HashMap::new();
        let mut contents: HashMap<u64, u8> = HashMap::new();

        for op in ops {
            match op {
                Op::Change(p, b) => match space.access_chg(page(p)) {
                    Ok(access) => {
                        space.frame_mut(&access).unwrap()[0] = b;
                        *refs.entry(p).or_default() += 1;
                        contents.insert(p, b);
                    }
                    Err(Error::NoRealStorage) => {
                        prop_assert!(refs.values().filter(|&&c| c > 0).count() >= REAL_FRAMES);
                    }
                    Err(e) => prop_assert!(false, "unexpected error {}", e),
                },
                Op::Reference(p) => match space.access_ref(page(p)) {
                    Ok(access) => {
                        let expected = contents.get(&p).copied().unwrap_or(0);
                        prop_assert_eq!(space.frame(&access).unwrap()[0], expected);
                        *refs.entry(p).or_default() += 1;
                    }
                    Err(Error::NoRealStorage) => {
                        prop_assert!(refs.values().filter(|&&c| c > 0).count() >= REAL_FRAMES);
                    }
                    Err(e) => prop_assert!(false, "unexpected error {}", e),
                },
                Op::Release(p) => {
                    let held = refs.get(&p).copied().unwrap_or(0);
                    let result = space.release(page(p));
                    if held > 0 {
                        prop_assert!(result.is_ok());
                        refs.insert(p, held - 1);
                    } else {
                        prop_assert!(result.is_err());
                    }
                }
                Op::Upgrade(p) => {
                    let held = refs.get(&p).copied().unwrap_or(0);
                    prop_assert_eq!(space.access_sci(page(p)).is_ok(), held > 0);
                }
            }

            let counts = space.frame_counts().unwrap();
            prop_assert_eq!(counts.total(), REAL_FRAMES);
        }

        for (&p, &held) in &refs {
            prop_assert_eq!(space.refcount(page(p)).unwrap_or(0), held);
        }
        let report = space.check_consistency().unwrap();
        prop_assert!(report.is_ok(), "{:?}", report.violations);
    }

    /// Whatever was written survives term and warm.
    #[test]
    fn prop_persistence_round_trip(
        writes in prop::collection::vec((0u64..40, any::<u8>()), 1..60)
    ) {
        let dir = tempdir().unwrap();
        let config = PagingConfig::new(dir.path().join("r.ctl"))
            .with_frame_size(FRAME as usize)
            .with_real_frames(3);

        let mut expected: HashMap<u64, u8> = HashMap::new();
        {
            let mut space = PagingSpace::new();
            space.cold(&config).unwrap();
            space.ins_file(dir.path().join("r1.dat")).unwrap();
            space.ins_file(dir.path().join("r2.dat")).unwrap();

            for &(p, b) in &writes {
                let access = space.access_chg(page(p)).unwrap();
                space.frame_mut(&access).unwrap()[7] = b;
                space.release(page(p)).unwrap();
                expected.insert(p, b);
            }
            space.term().unwrap();
        }

        let mut space = PagingSpace::new();
        space.warm(&config).unwrap();
        prop_assert_eq!(space.vframe_count(), expected.len());

        for (&p, &b) in &expected {
            let access = space.access_ref(page(p)).unwrap();
            prop_assert_eq!(space.frame(&access).unwrap()[7], b);
            space.release(page(p)).unwrap();
        }
        prop_assert!(space.check_consistency().unwrap().is_ok());
    }
}
