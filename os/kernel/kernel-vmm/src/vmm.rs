//! The allocation orchestrator: the four public entry points that compose
//! region-store placement with the external pmm and MMU collaborators.
//!
//! Every entry point shares the same skeleton (normalise inputs, resolve a
//! virtual placement, acquire resources, place the region, map, transfer
//! page ownership) described in this crate's design notes. Resources
//! acquired along the way — pages pulled from the [`PageSource`] and
//! mappings installed via the [`MmuDriver`] — are released on every error
//! path by the two RAII guards below, [`PagePlan`] and [`MappingGuard`].

use alloc::vec::Vec;
use core::mem;

use crate::addr::{PhysAddr, PhysPage, VirtAddr};
use crate::address_space::AddressSpace;
use crate::error::VmmError;
use crate::flags::{MmuFlags, RegionFlags, VmmFlags};
use crate::range;
use crate::region::Region;
use crate::traits::{MmuDriver, PageSource};
use crate::PAGE_SIZE;

/// Records an externally established mapping for bookkeeping only.
///
/// The pmm is never consulted: the underlying frames are not owned by the
/// VMM. Queries the MMU driver for the attributes currently installed at
/// `va` and stores them on the resulting `RESERVED` region.
///
/// # Errors
///
/// Returns [`VmmError::InvalidArgs`] if `va` or `size` is not page-aligned,
/// [`VmmError::OutOfRange`] if `va` does not lie inside `aspace`, and
/// [`VmmError::NoMemory`] if the (possibly trimmed) range overlaps an
/// existing region. A `size` of zero is a no-op that reserves nothing and
/// returns `va` unchanged, since no backing pages are involved either way.
pub fn vmm_reserve_space(aspace: &AddressSpace, mmu: &dyn MmuDriver, name: &str, size: u64, va: VirtAddr) -> Result<VirtAddr, VmmError> {
    if size == 0 {
        return Ok(va);
    }
    if !range::is_page_aligned(size) || !range::is_page_aligned(va.as_u64()) {
        return Err(VmmError::InvalidArgs);
    }
    if !range::contains(aspace.base(), aspace.size(), va) {
        return Err(VmmError::OutOfRange);
    }

    let trimmed = range::trim(aspace.base(), aspace.size(), va, size);
    if trimmed == 0 {
        return Err(VmmError::NoMemory);
    }

    let mmu_flags = mmu.query(va).map_or(MmuFlags::empty(), |(_, flags)| flags);

    let region = Region::new(name, va, trimmed, RegionFlags::RESERVED, mmu_flags);
    aspace.add_region(region)?;
    Ok(va)
}

/// Maps a caller-supplied physical address range (e.g. device MMIO).
///
/// `pa` and `size` must already be page-aligned; no pmm interaction takes
/// place and the resulting region's page list stays empty, since the pages
/// belong to a device rather than the pmm.
///
/// # Errors
///
/// Returns [`VmmError::InvalidArgs`] for misaligned input or a missing
/// virtual-address hint under [`VmmFlags::VALLOC_SPECIFIC`],
/// [`VmmError::NoMemory`] if no placement is available or the fixed
/// placement overlaps an existing region, and
/// [`VmmError::MappingFailed`] if the MMU driver rejects the mapping
/// (the region is rolled back in that case). A `size` of zero is a no-op:
/// no region is created and no pages are mapped, since the caller already
/// owns `pa` regardless of whether the VMM maps it.
pub fn vmm_alloc_physical(
    aspace: &AddressSpace,
    mmu: &dyn MmuDriver,
    name: &str,
    size: u64,
    va_hint: Option<VirtAddr>,
    pa: PhysAddr,
    flags: VmmFlags,
    mmu_flags: MmuFlags,
) -> Result<VirtAddr, VmmError> {
    if size == 0 {
        return Ok(va_hint.unwrap_or_default());
    }
    if !range::is_page_aligned(size) || !range::is_page_aligned(pa.as_u64()) {
        return Err(VmmError::InvalidArgs);
    }

    let fixed = resolve_fixed(flags, va_hint)?;
    let base = match fixed {
        Some(va) => va,
        None => aspace.find_spot(size, crate::PAGE_SHIFT)?,
    };

    let region = Region::new(name, base, size, RegionFlags::PHYSICAL, mmu_flags);
    aspace.add_region(region)?;

    let page_count = (size / PAGE_SIZE) as usize;
    if let Err(_mmu_err) = mmu.map(base, pa, page_count, mmu_flags) {
        aspace.remove_region(base);
        return Err(VmmError::MappingFailed);
    }

    Ok(base)
}

/// Allocates a physically contiguous run from the pmm and maps it at a
/// resolved virtual base, because contiguity is the scarce resource the pmm
/// is asked to provide first.
///
/// # Errors
///
/// Returns [`VmmError::InvalidArgs`] for a zero size or a missing
/// virtual-address hint under [`VmmFlags::VALLOC_SPECIFIC`],
/// [`VmmError::NoMemory`] if the pmm cannot satisfy the contiguous request
/// or no virtual placement is available, and [`VmmError::MappingFailed`] if
/// the MMU driver rejects the mapping. Every error path returns any pages
/// already obtained from the pmm.
pub fn vmm_alloc_contiguous(
    aspace: &AddressSpace,
    pmm: &mut dyn PageSource,
    mmu: &dyn MmuDriver,
    name: &str,
    size: u64,
    va_hint: Option<VirtAddr>,
    align_pow2: u8,
    flags: VmmFlags,
    mmu_flags: MmuFlags,
) -> Result<VirtAddr, VmmError> {
    let size = normalize_size(size)?;
    let page_count = (size / PAGE_SIZE) as usize;
    let fixed = resolve_fixed(flags, va_hint)?;

    let (plan, obtained) = PagePlan::contiguous(pmm, page_count, align_pow2);
    let Some((pa, count)) = obtained else {
        return Err(VmmError::NoMemory);
    };
    if count < page_count {
        return Err(VmmError::NoMemory);
    }

    let base = match fixed {
        Some(va) => va,
        None => aspace.find_spot(size, align_pow2)?,
    };

    let region = Region::new(name, base, size, RegionFlags::PHYSICAL, mmu_flags);
    aspace.add_region(region)?;

    if let Err(_mmu_err) = mmu.map(base, pa, page_count, mmu_flags) {
        aspace.remove_region(base);
        return Err(VmmError::MappingFailed);
    }

    let pages = plan.commit();
    aspace.set_pages(base, pages);
    Ok(base)
}

/// Allocates `size` bytes from the pmm, possibly scattered across
/// non-contiguous physical frames, and maps each page individually at a
/// resolved virtual base.
///
/// Implementers may coalesce adjacent mapped runs into fewer `map` calls;
/// this implementation does not, since the reference allocator explicitly
/// leaves that as a future optimisation.
///
/// # Errors
///
/// Same taxonomy as [`vmm_alloc_contiguous`], except the pmm request never
/// demands contiguity.
pub fn vmm_alloc(
    aspace: &AddressSpace,
    pmm: &mut dyn PageSource,
    mmu: &dyn MmuDriver,
    name: &str,
    size: u64,
    va_hint: Option<VirtAddr>,
    align_pow2: u8,
    flags: VmmFlags,
    mmu_flags: MmuFlags,
) -> Result<VirtAddr, VmmError> {
    let size = normalize_size(size)?;
    let page_count = (size / PAGE_SIZE) as usize;
    let fixed = resolve_fixed(flags, va_hint)?;

    let plan = PagePlan::scattered(pmm, page_count);
    if plan.len() < page_count {
        return Err(VmmError::NoMemory);
    }

    let base = match fixed {
        Some(va) => va,
        None => aspace.find_spot(size, align_pow2)?,
    };

    let region = Region::new(name, base, size, RegionFlags::PHYSICAL, mmu_flags);
    aspace.add_region(region)?;

    let mut mapping = MappingGuard::new(mmu, base);
    for (i, page) in plan.pages.iter().enumerate() {
        let page_va = VirtAddr::new(base.as_u64() + i as u64 * PAGE_SIZE);
        let page_pa = plan.pmm.page_to_address(*page);
        match mmu.map(page_va, page_pa, 1, mmu_flags) {
            Ok(()) => mapping.mapped_pages += 1,
            Err(_mmu_err) => {
                aspace.remove_region(base);
                return Err(VmmError::MappingFailed);
            }
        }
    }
    mapping.commit();

    let pages = plan.commit();
    aspace.set_pages(base, pages);
    Ok(base)
}

/// Rounds `size` up to a page multiple and rejects a zero request.
fn normalize_size(size: u64) -> Result<u64, VmmError> {
    if size == 0 {
        return Err(VmmError::InvalidArgs);
    }
    range::align_up(size, PAGE_SIZE).ok_or(VmmError::InvalidArgs)
}

/// Resolves the caller's placement intent: `Some(va)` under
/// [`VmmFlags::VALLOC_SPECIFIC`] (rejecting a missing or misaligned hint),
/// or `None` to let `find_spot` choose dynamically.
fn resolve_fixed(flags: VmmFlags, va_hint: Option<VirtAddr>) -> Result<Option<VirtAddr>, VmmError> {
    if !flags.contains(VmmFlags::VALLOC_SPECIFIC) {
        return Ok(None);
    }
    let va = va_hint.ok_or(VmmError::InvalidArgs)?;
    if !range::is_page_aligned(va.as_u64()) {
        return Err(VmmError::InvalidArgs);
    }
    Ok(Some(va))
}

/// Owns a set of pages pulled from a [`PageSource`] until committed;
/// returns them to the pmm on drop otherwise.
struct PagePlan<'a> {
    pmm: &'a mut dyn PageSource,
    pages: Vec<PhysPage>,
    committed: bool,
}

impl<'a> PagePlan<'a> {
    fn scattered(pmm: &'a mut dyn PageSource, n: usize) -> Self {
        let mut pages = Vec::new();
        pmm.alloc_pages(n, &mut pages);
        Self {
            pmm,
            pages,
            committed: false,
        }
    }

    fn contiguous(pmm: &'a mut dyn PageSource, n: usize, align_pow2: u8) -> (Self, Option<(PhysAddr, usize)>) {
        let mut pages = Vec::new();
        let obtained = pmm.alloc_contiguous(n, align_pow2, &mut pages);
        let count = pages.len();
        let plan = Self {
            pmm,
            pages,
            committed: false,
        };
        (plan, obtained.map(|(pa, _)| (pa, count)))
    }

    fn len(&self) -> usize {
        self.pages.len()
    }

    fn commit(mut self) -> Vec<PhysPage> {
        self.committed = true;
        mem::take(&mut self.pages)
    }
}

impl Drop for PagePlan<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.pages.is_empty() {
            let pages = mem::take(&mut self.pages);
            self.pmm.free(pages);
        }
    }
}

/// Tracks how many pages of a contiguous virtual run have been mapped so
/// far; unmaps them on drop unless committed.
struct MappingGuard<'a> {
    mmu: &'a dyn MmuDriver,
    base: VirtAddr,
    mapped_pages: usize,
    committed: bool,
}

impl<'a> MappingGuard<'a> {
    const fn new(mmu: &'a dyn MmuDriver, base: VirtAddr) -> Self {
        Self {
            mmu,
            base,
            mapped_pages: 0,
            committed: false,
        }
    }

    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for MappingGuard<'_> {
    fn drop(&mut self) {
        if !self.committed && self.mapped_pages > 0 {
            let _ = self.mmu.unmap(self.base, self.mapped_pages);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockMmuDriver, MockPageSource};

    const BASE: u64 = 0x1000_0000;
    const SIZE: u64 = 0x0010_0000;

    fn aspace() -> AddressSpace {
        AddressSpace::new("kernel", VirtAddr::new(BASE), SIZE)
    }

    #[test]
    fn empty_aspace_first_fit() {
        let aspace = aspace();
        let mut pmm = MockPageSource::with_free_pages(16);
        let mmu = MockMmuDriver::new();

        let ptr = vmm_alloc(&aspace, &mut pmm, &mmu, "a", 0x2000, None, 12, VmmFlags::empty(), MmuFlags::PERM_READ).unwrap();

        assert_eq!(ptr, VirtAddr::new(BASE));
        assert_eq!(aspace.region_count(), 1);
        aspace.with_regions(|regions| {
            assert_eq!(regions[0].base(), VirtAddr::new(BASE));
            assert_eq!(regions[0].size(), 0x2000);
            assert_eq!(regions[0].pages().len(), 2);
        });
        assert_eq!(mmu.mapped_page_count(VirtAddr::new(BASE)), 2);
    }

    #[test]
    fn gap_selection_after_one_region() {
        let aspace = aspace();
        let mut pmm = MockPageSource::with_free_pages(16);
        let mmu = MockMmuDriver::new();

        vmm_alloc(&aspace, &mut pmm, &mmu, "a", 0x2000, None, 12, VmmFlags::empty(), MmuFlags::empty()).unwrap();
        let ptr = vmm_alloc(&aspace, &mut pmm, &mmu, "b", 0x1000, None, 12, VmmFlags::empty(), MmuFlags::empty()).unwrap();

        assert_eq!(ptr, VirtAddr::new(BASE + 0x2000));
    }

    #[test]
    fn alignment_pushes_past_a_region() {
        let aspace = aspace();
        let mut pmm = MockPageSource::with_free_pages(16);
        let mmu = MockMmuDriver::new();

        vmm_alloc(&aspace, &mut pmm, &mmu, "a", 0x2000, None, 12, VmmFlags::empty(), MmuFlags::empty()).unwrap();
        let ptr = vmm_alloc(&aspace, &mut pmm, &mmu, "b", 0x1000, None, 16, VmmFlags::empty(), MmuFlags::empty()).unwrap();

        assert_eq!(ptr, VirtAddr::new(BASE + 0x0001_0000));
    }

    #[test]
    fn fixed_placement_overlap_is_rejected_and_leaves_no_trace() {
        let aspace = aspace();
        let mut pmm = MockPageSource::with_free_pages(16);
        let mmu = MockMmuDriver::new();

        vmm_alloc(&aspace, &mut pmm, &mmu, "a", 0x2000, None, 12, VmmFlags::empty(), MmuFlags::empty()).unwrap();
        let free_before = pmm.free_page_count();

        let err = vmm_alloc_physical(
            &aspace,
            &mmu,
            "dev",
            0x2000,
            Some(VirtAddr::new(BASE + 0x1000)),
            PhysAddr::new(0x8000_0000),
            VmmFlags::VALLOC_SPECIFIC,
            MmuFlags::empty(),
        )
        .unwrap_err();

        assert_eq!(err, VmmError::NoMemory);
        assert_eq!(aspace.region_count(), 1);
        assert_eq!(pmm.free_page_count(), free_before);
        assert_eq!(mmu.mapped_page_count(VirtAddr::new(BASE + 0x1000)), 0);
    }

    #[test]
    fn contiguous_exhaustion_rolls_back_and_leaves_pmm_untouched() {
        let aspace = aspace();
        let mut pmm = MockPageSource::with_free_pages(4);
        pmm.disable_contiguous_runs();
        let mmu = MockMmuDriver::new();

        let err = vmm_alloc_contiguous(&aspace, &mut pmm, &mmu, "a", 0x4000, None, 12, VmmFlags::empty(), MmuFlags::empty()).unwrap_err();

        assert_eq!(err, VmmError::NoMemory);
        assert_eq!(pmm.free_page_count(), 4);
        assert_eq!(aspace.region_count(), 0);
    }

    #[test]
    fn contiguous_partial_run_is_returned_to_pmm_rather_than_kept() {
        let aspace = aspace();
        let mut pmm = MockPageSource::with_free_pages(2);
        let mmu = MockMmuDriver::new();

        let err = vmm_alloc_contiguous(&aspace, &mut pmm, &mmu, "a", 0x4000, None, 12, VmmFlags::empty(), MmuFlags::empty()).unwrap_err();

        assert_eq!(err, VmmError::NoMemory);
        assert_eq!(pmm.free_page_count(), 2);
        assert_eq!(aspace.region_count(), 0);
        assert_eq!(mmu.mapped_page_count(VirtAddr::new(BASE)), 0);
    }

    #[test]
    fn reserve_then_allocate_around() {
        let aspace = aspace();
        let mut pmm = MockPageSource::with_free_pages(16);
        let mmu = MockMmuDriver::new();

        vmm_reserve_space(&aspace, &mmu, "fw", 0x1000, VirtAddr::new(BASE + 0x8000)).unwrap();
        let ptr = vmm_alloc(&aspace, &mut pmm, &mmu, "a", 0x1000, None, 12, VmmFlags::empty(), MmuFlags::empty()).unwrap();

        assert_eq!(ptr, VirtAddr::new(BASE));
        assert_eq!(aspace.region_count(), 2);
        aspace.with_regions(|regions| {
            assert_eq!(regions[0].base(), VirtAddr::new(BASE));
            assert_eq!(regions[1].base(), VirtAddr::new(BASE + 0x8000));
            assert!(regions[1].flags().contains(RegionFlags::RESERVED));
        });
    }

    #[test]
    fn reserving_the_same_range_twice_fails_rather_than_double_inserting() {
        let aspace = aspace();
        let mmu = MockMmuDriver::new();

        vmm_reserve_space(&aspace, &mmu, "fw", 0x1000, VirtAddr::new(BASE)).unwrap();
        let err = vmm_reserve_space(&aspace, &mmu, "fw", 0x1000, VirtAddr::new(BASE)).unwrap_err();

        assert_eq!(err, VmmError::NoMemory);
        assert_eq!(aspace.region_count(), 1);
    }

    #[test]
    fn alloc_rejects_zero_size() {
        let aspace = aspace();
        let mut pmm = MockPageSource::with_free_pages(4);
        let mmu = MockMmuDriver::new();

        let err = vmm_alloc(&aspace, &mut pmm, &mmu, "a", 0, None, 12, VmmFlags::empty(), MmuFlags::empty()).unwrap_err();
        assert_eq!(err, VmmError::InvalidArgs);
    }

    #[test]
    fn valloc_specific_without_hint_is_invalid() {
        let aspace = aspace();
        let mut pmm = MockPageSource::with_free_pages(4);
        let mmu = MockMmuDriver::new();

        let err = vmm_alloc(&aspace, &mut pmm, &mmu, "a", 0x1000, None, 12, VmmFlags::VALLOC_SPECIFIC, MmuFlags::empty()).unwrap_err();
        assert_eq!(err, VmmError::InvalidArgs);
    }

    #[test]
    fn reserve_space_with_zero_size_is_a_no_op() {
        let aspace = aspace();
        let mmu = MockMmuDriver::new();

        let va = VirtAddr::new(BASE + 0x4000);
        let ptr = vmm_reserve_space(&aspace, &mmu, "fw", 0, va).unwrap();

        assert_eq!(ptr, va);
        assert_eq!(aspace.region_count(), 0);
    }

    #[test]
    fn alloc_physical_with_zero_size_is_a_no_op() {
        let aspace = aspace();
        let mmu = MockMmuDriver::new();

        let ptr = vmm_alloc_physical(&aspace, &mmu, "dev", 0, None, PhysAddr::new(0xfee0_0000), VmmFlags::empty(), MmuFlags::empty()).unwrap();

        assert_eq!(ptr, VirtAddr::default());
        assert_eq!(aspace.region_count(), 0);
        assert_eq!(mmu.mapped_page_count(VirtAddr::default()), 0);
    }

    #[test]
    fn mapping_failure_rolls_back_region_and_already_mapped_pages() {
        let aspace = aspace();
        let mut pmm = MockPageSource::with_free_pages(16);
        let mmu = MockMmuDriver::new();
        mmu.fail_after(1);

        let err = vmm_alloc(&aspace, &mut pmm, &mmu, "a", 0x3000, None, 12, VmmFlags::empty(), MmuFlags::empty()).unwrap_err();

        assert_eq!(err, VmmError::MappingFailed);
        assert_eq!(aspace.region_count(), 0);
        assert_eq!(pmm.free_page_count(), 16);
        assert_eq!(mmu.mapped_page_count(VirtAddr::new(BASE)), 0);
    }

    #[test]
    fn alloc_physical_maps_a_device_range_with_an_empty_page_list() {
        let aspace = aspace();
        let mmu = MockMmuDriver::new();

        let ptr = vmm_alloc_physical(&aspace, &mmu, "mmio", 0x1000, None, PhysAddr::new(0xfee0_0000), VmmFlags::empty(), MmuFlags::CACHE_UNCACHED_DEVICE).unwrap();

        assert_eq!(ptr, VirtAddr::new(BASE));
        aspace.with_regions(|regions| {
            assert!(regions[0].flags().contains(RegionFlags::PHYSICAL));
            assert!(regions[0].pages().is_empty());
        });
        assert_eq!(mmu.mapped_page_count(VirtAddr::new(BASE)), 1);
    }
}
