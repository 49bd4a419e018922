//! Collaborator interfaces consumed by the allocation orchestrator.
//!
//! Neither the physical page-frame allocator nor the architecture MMU driver
//! is implemented by this crate; both are out of scope and modeled here as
//! trait objects so the orchestrator in [`crate::vmm`] can be exercised
//! against the [`crate::mock`] test doubles without pulling in a real `pmm`
//! or `arch_mmu` crate.

use alloc::vec::Vec;

use crate::addr::{PhysAddr, PhysPage, VirtAddr};
use crate::error::MmuError;
use crate::flags::MmuFlags;

/// The physical page-frame allocator ("pmm"), consumed as a service.
pub trait PageSource {
    /// Pushes up to `n` pages onto `out`, in no particular order.
    ///
    /// Returns the number of pages actually obtained; a result less than
    /// `n` indicates partial success and the caller is expected to return
    /// whatever was obtained via [`Self::free`].
    fn alloc_pages(&mut self, n: usize, out: &mut Vec<PhysPage>) -> usize;

    /// Pushes up to `n` physically contiguous pages onto `out`, starting at
    /// the returned base address, aligned to `1 << align_pow2`.
    ///
    /// Returns `None` if no contiguous run could be started at all;
    /// otherwise returns the run's base address and the number of pages
    /// actually obtained, which may be less than `n`.
    fn alloc_contiguous(&mut self, n: usize, align_pow2: u8, out: &mut Vec<PhysPage>) -> Option<(PhysAddr, usize)>;

    /// Returns `pages` to the allocator.
    fn free(&mut self, pages: Vec<PhysPage>);

    /// Returns the physical address backing `page`.
    fn page_to_address(&self, page: PhysPage) -> PhysAddr;
}

/// The architectural MMU driver ("arch_mmu"), consumed as a service.
pub trait MmuDriver {
    /// Maps `page_count` pages starting at `pa` to `va` with `mmu_flags`.
    ///
    /// # Errors
    ///
    /// Returns [`MmuError`] if the driver cannot represent the mapping or
    /// has run out of a resource (typically page-table frames) needed to
    /// create it.
    fn map(&self, va: VirtAddr, pa: PhysAddr, page_count: usize, mmu_flags: MmuFlags) -> Result<(), MmuError>;

    /// Removes the mapping for `page_count` pages starting at `va`.
    ///
    /// # Errors
    ///
    /// Returns [`MmuError`] if the driver cannot perform the unmap.
    fn unmap(&self, va: VirtAddr, page_count: usize) -> Result<(), MmuError>;

    /// Returns the physical address and flags currently mapped at `va`, if
    /// any. Used by [`crate::vmm::vmm_reserve_space`] to record the
    /// attributes of a pre-existing, externally established mapping.
    fn query(&self, va: VirtAddr) -> Option<(PhysAddr, MmuFlags)>;
}
