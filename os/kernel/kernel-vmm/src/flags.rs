//! Flag sets used by regions, the allocation entry points, and the MMU
//! driver boundary.

use bitflags::bitflags;

bitflags! {
    /// Flags describing how a single [`crate::Region`] was created.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct RegionFlags: u32 {
        /// The region only reserves virtual address space; it carries no
        /// pages and was never handed to the MMU driver for mapping.
        const RESERVED = 1 << 0;
        /// The region is backed by physical pages (scattered or
        /// contiguous), as opposed to a bare reservation.
        const PHYSICAL = 1 << 1;
    }
}

bitflags! {
    /// Placement flags accepted by the `vmm_alloc*` entry points.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct VmmFlags: u32 {
        /// The caller-supplied virtual address is mandatory; placement
        /// fails rather than falling back to a dynamically found spot.
        const VALLOC_SPECIFIC = 1 << 0;
    }
}

bitflags! {
    /// Architecture MMU permission/caching flags.
    ///
    /// The allocator never interprets these bits itself; it only forwards
    /// them to the [`crate::MmuDriver`] and stores them alongside the owning
    /// region for diagnostics. The concrete bit positions below follow the
    /// conventional split used by most architecture MMU drivers (permission
    /// bits in the low nibble, cache policy above them) so tests and the
    /// `vmm` console command have something concrete to construct.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct MmuFlags: u32 {
        /// Mapping is readable.
        const PERM_READ = 1 << 0;
        /// Mapping is writable.
        const PERM_WRITE = 1 << 1;
        /// Mapping is executable.
        const PERM_EXECUTE = 1 << 2;
        /// Mapping is accessible from unprivileged (user) mode.
        const PERM_USER = 1 << 3;
        /// Mapping bypasses the cache entirely.
        const CACHE_UNCACHED = 1 << 4;
        /// Mapping bypasses the cache and additionally disables write
        /// combining/speculation, as required by memory-mapped device
        /// registers.
        const CACHE_UNCACHED_DEVICE = 1 << 5;
        /// Mapping uses write-combining caching.
        const CACHE_WRITE_COMBINING = 1 << 6;
    }
}
