//! A named, bounded virtual range owning a lock-guarded region store.

use alloc::vec::Vec;

use kernel_sync::SpinMutex;

use crate::addr::{PhysPage, VirtAddr};
use crate::error::VmmError;
use crate::name::Name;
use crate::region::Region;
use crate::region_store::RegionStore;

/// A bounded virtual address range with its own ordered, non-overlapping
/// collection of [`Region`]s.
///
/// All mutation of the region store, and every read that must observe a
/// consistent snapshot, happens while holding the internal
/// [`kernel_sync::SpinMutex`]; calls into the pmm or the MMU driver are made
/// by the orchestrator in [`crate::vmm`] without holding it, per the
/// concurrency contract in this crate's design notes.
pub struct AddressSpace {
    name: Name,
    base: VirtAddr,
    size: u64,
    flags: u32,
    store: SpinMutex<RegionStore>,
}

impl AddressSpace {
    /// Creates a new, empty address space spanning `[base, base + size)`.
    #[must_use]
    pub fn new(name: &str, base: VirtAddr, size: u64) -> Self {
        debug_assert!(base.checked_add(size.saturating_sub(1)).is_some(), "address space end must not wrap");
        Self {
            name: Name::new(name),
            base,
            size,
            flags: 0,
            store: SpinMutex::new(RegionStore::new()),
        }
    }

    /// Returns the address space's diagnostic name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the inclusive start of this address space.
    #[must_use]
    pub const fn base(&self) -> VirtAddr {
        self.base
    }

    /// Returns the size, in bytes, of this address space.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Returns the space-level attribute bits. Unused by the core; reserved
    /// for forward compatibility the way the reference `vmm_aspace_t::flags`
    /// field is.
    #[must_use]
    pub const fn flags(&self) -> u32 {
        self.flags
    }

    /// Finds the first virtual address where a region of `size` bytes
    /// aligned to `1 << align_pow2` would fit without overlapping an
    /// existing region.
    ///
    /// # Errors
    ///
    /// Returns [`VmmError::NoMemory`] if no such gap exists.
    pub fn find_spot(&self, size: u64, align_pow2: u8) -> Result<VirtAddr, VmmError> {
        self.store.lock().find_spot(self.base, self.size, size, align_pow2)
    }

    /// Inserts `region` into this address space's region store.
    ///
    /// # Errors
    ///
    /// See [`RegionStore::add_region`].
    pub fn add_region(&self, region: Region) -> Result<(), VmmError> {
        self.store.lock().add_region(self.base, self.size, region)
    }

    /// Removes and returns the region starting at `base`, if one exists.
    ///
    /// Used by the orchestrator to roll back a region whose mapping could
    /// not be installed after it was placed.
    pub fn remove_region(&self, base: VirtAddr) -> Option<Region> {
        self.store.lock().remove_region(base)
    }

    /// Attaches `pages` to the region starting at `base`.
    pub fn set_pages(&self, base: VirtAddr, pages: Vec<PhysPage>) {
        self.store.lock().set_pages(base, pages);
    }

    /// Returns the number of regions currently held by this address space.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.store.lock().regions().len()
    }

    /// Runs `f` with a consistent snapshot of this address space's regions,
    /// held under the lock for the duration of the call.
    pub fn with_regions<R>(&self, f: impl FnOnce(&[Region]) -> R) -> R {
        f(self.store.lock().regions())
    }
}
