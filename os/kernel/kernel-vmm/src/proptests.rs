//! Property tests over random allocation workloads.
//!
//! Complements the scenario-driven `#[test]`s in `vmm.rs` with the
//! randomized coverage this crate's design notes call for (P1-P4): after
//! every operation in a random sequence of `vmm_alloc`/`vmm_reserve_space`
//! calls, the region store must still be ordered, disjoint, contained, and
//! page-aligned, regardless of which calls succeeded or failed. Modeled on
//! `backtrace-labs-slitter`'s `proptest!` workload-replay tests.

use proptest::prelude::*;

use crate::addr::VirtAddr;
use crate::address_space::AddressSpace;
use crate::flags::{MmuFlags, VmmFlags};
use crate::mock::{MockMmuDriver, MockPageSource};
use crate::vmm::{vmm_alloc, vmm_reserve_space};
use crate::PAGE_SIZE;

const BASE: u64 = 0x1000_0000;
const SIZE: u64 = 0x0010_0000; // 1 MiB, matches the spec's worked scenarios

#[derive(Clone, Debug)]
enum Op {
    Alloc { pages: u64, align_pow2: u8 },
    Reserve { page_offset: u64, pages: u64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u64..=8, 12u8..=16).prop_map(|(pages, align_pow2)| Op::Alloc { pages, align_pow2 }),
        (0u64..256, 1u64..=8).prop_map(|(page_offset, pages)| Op::Reserve { page_offset, pages }),
    ]
}

/// Asserts P1 (ordering), P2 (disjointness), P3 (containment), and P4
/// (alignment) over the current snapshot of `aspace`'s regions.
fn assert_region_invariants(aspace: &AddressSpace) {
    aspace.with_regions(|regions| {
        let mut prev_end: Option<VirtAddr> = None;
        for region in regions {
            assert!(region.size() > 0, "P4: region {} has zero size", region.name());
            assert_eq!(region.base().as_u64() % PAGE_SIZE, 0, "P4: region {} base is not page-aligned", region.name());
            assert_eq!(region.size() % PAGE_SIZE, 0, "P4: region {} size is not page-aligned", region.name());

            assert!(region.base().as_u64() >= BASE, "P3: region {} starts before the aspace", region.name());
            assert!(region.end().as_u64() <= BASE + SIZE, "P3: region {} ends past the aspace", region.name());

            if let Some(prev_end) = prev_end {
                assert!(region.base() >= prev_end, "P1/P2: region {} overlaps or precedes its predecessor", region.name());
            }
            prev_end = Some(region.end());
        }
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Replays a random sequence of allocation/reservation calls (many of
    /// which are expected to fail once the 1 MiB aspace fills up) and
    /// checks P1-P4 hold after every single one, success or failure.
    #[test]
    fn region_store_invariants_survive_random_workloads(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let aspace = AddressSpace::new("kernel", VirtAddr::new(BASE), SIZE);
        let mut pmm = MockPageSource::with_free_pages(4096);
        let mmu = MockMmuDriver::new();

        for (i, op) in ops.into_iter().enumerate() {
            match op {
                Op::Alloc { pages, align_pow2 } => {
                    let _ = vmm_alloc(
                        &aspace,
                        &mut pmm,
                        &mmu,
                        "w",
                        pages * PAGE_SIZE,
                        None,
                        align_pow2,
                        VmmFlags::empty(),
                        MmuFlags::PERM_READ,
                    );
                }
                Op::Reserve { page_offset, pages } => {
                    let va = VirtAddr::new(BASE + page_offset * PAGE_SIZE);
                    let _ = vmm_reserve_space(&aspace, &mmu, "w", pages * PAGE_SIZE, va);
                }
            }
            assert_region_invariants(&aspace);
            let _ = i;
        }
    }

    /// A fixed-size region's pmm accounting never leaks or double-counts: the
    /// mock's free list plus every page attached to a region always sums to
    /// the number of pages it started with.
    #[test]
    fn pmm_accounting_is_conserved_across_random_workloads(ops in prop::collection::vec(1u64..=8, 1..32)) {
        let aspace = AddressSpace::new("kernel", VirtAddr::new(BASE), SIZE);
        const TOTAL_PAGES: usize = 512;
        let mut pmm = MockPageSource::with_free_pages(TOTAL_PAGES);
        let mmu = MockMmuDriver::new();

        for pages in ops {
            let _ = vmm_alloc(&aspace, &mut pmm, &mmu, "w", pages * PAGE_SIZE, None, 12, VmmFlags::empty(), MmuFlags::empty());
        }

        let attached: usize = aspace.with_regions(|regions| regions.iter().map(|r| r.pages().len()).sum());
        prop_assert_eq!(attached + pmm.free_page_count(), TOTAL_PAGES);
    }
}
