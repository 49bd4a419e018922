//! Dump formatting and a thin `vmm` console-style command handler.
//!
//! Mirrors the reference allocator's `dump_aspace`/`dump_region` field
//! ordering (name, range, size, flags, MMU flags) and its `vmm` debug
//! command, reported through the `log` crate the way every other crate in
//! this workspace surfaces diagnostics rather than a bespoke `printf`.

use core::fmt;

use crate::address_space::AddressSpace;
use crate::error::VmmError;
use crate::flags::{MmuFlags, VmmFlags};
use crate::region::Region;
use crate::registry::{registered_aspaces, vmm_get_kernel_aspace};
use crate::traits::{MmuDriver, PageSource};
use crate::vmm::{vmm_alloc, vmm_alloc_contiguous, vmm_alloc_physical};

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "region {:<16} [{:#018x}, {:#018x}) size={:#x} flags={:?} mmu_flags={:?} pages={}",
            self.name(),
            self.base().as_u64(),
            self.end().as_u64(),
            self.size(),
            self.flags(),
            self.arch_mmu_flags(),
            self.pages().len()
        )
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "aspace {:<16} [{:#018x}, {:#018x})", self.name(), self.base().as_u64(), self.base().as_u64() + self.size())?;
        self.with_regions(|regions| {
            for region in regions {
                writeln!(f, "  {region:?}")?;
            }
            Ok(())
        })
    }
}

/// Logs a one-block dump of `aspace` and every region it holds.
pub fn dump_aspace(aspace: &AddressSpace) {
    log::info!("{aspace:?}");
}

const USAGE: &str = "usage: vmm <aspaces|alloc <size> <align_pow2>|alloc_physical <paddr> <size>|alloc_contig <size> <align_pow2>>";

fn parse_u64(s: &str) -> Option<u64> {
    s.strip_prefix("0x").map_or_else(|| s.parse().ok(), |hex| u64::from_str_radix(hex, 16).ok())
}

fn parse_u8(s: &str) -> Option<u8> {
    s.parse().ok()
}

/// Dispatches the `aspaces`, `alloc`, `alloc_physical`, and `alloc_contig`
/// diagnostic subcommands against the kernel aspace.
///
/// # Errors
///
/// Returns [`VmmError::Generic`] for unrecognized subcommands or malformed
/// arguments (logging [`USAGE`] first); otherwise propagates whatever the
/// underlying `vmm_alloc*` call returned.
pub fn vmm_command(args: &[&str], pmm: &mut dyn PageSource, mmu: &dyn MmuDriver) -> Result<(), VmmError> {
    match args {
        ["aspaces"] => {
            for aspace in registered_aspaces() {
                dump_aspace(aspace);
            }
            Ok(())
        }
        ["alloc", size, align] => {
            let (Some(size), Some(align_pow2)) = (parse_u64(size), parse_u8(align)) else {
                log::warn!("{USAGE}");
                return Err(VmmError::Generic);
            };
            let ptr = vmm_alloc(vmm_get_kernel_aspace(), pmm, mmu, "cmd", size, None, align_pow2, VmmFlags::empty(), MmuFlags::PERM_READ | MmuFlags::PERM_WRITE)?;
            log::info!("alloc: mapped {size:#x} bytes at {ptr}");
            Ok(())
        }
        ["alloc_physical", paddr, size] => {
            let (Some(pa), Some(size)) = (parse_u64(paddr), parse_u64(size)) else {
                log::warn!("{USAGE}");
                return Err(VmmError::Generic);
            };
            let ptr = vmm_alloc_physical(vmm_get_kernel_aspace(), mmu, "cmd", size, None, crate::addr::PhysAddr::new(pa), VmmFlags::empty(), MmuFlags::CACHE_UNCACHED_DEVICE)?;
            log::info!("alloc_physical: mapped {pa:#x} at {ptr}");
            Ok(())
        }
        ["alloc_contig", size, align] => {
            let (Some(size), Some(align_pow2)) = (parse_u64(size), parse_u8(align)) else {
                log::warn!("{USAGE}");
                return Err(VmmError::Generic);
            };
            let ptr = vmm_alloc_contiguous(vmm_get_kernel_aspace(), pmm, mmu, "cmd", size, None, align_pow2, VmmFlags::empty(), MmuFlags::PERM_READ | MmuFlags::PERM_WRITE)?;
            log::info!("alloc_contig: mapped {size:#x} bytes at {ptr}");
            Ok(())
        }
        _ => {
            log::warn!("{USAGE}");
            Err(VmmError::Generic)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockMmuDriver, MockPageSource};

    #[test]
    fn unknown_subcommand_is_generic() {
        let mut pmm = MockPageSource::with_free_pages(4);
        let mmu = MockMmuDriver::new();
        let err = vmm_command(&["frobnicate"], &mut pmm, &mmu).unwrap_err();
        assert_eq!(err, VmmError::Generic);
    }

    #[test]
    fn alloc_with_missing_arguments_is_generic() {
        let mut pmm = MockPageSource::with_free_pages(4);
        let mmu = MockMmuDriver::new();
        let err = vmm_command(&["alloc", "0x1000"], &mut pmm, &mmu).unwrap_err();
        assert_eq!(err, VmmError::Generic);
    }

    #[test]
    fn alloc_with_unparsable_arguments_is_generic() {
        let mut pmm = MockPageSource::with_free_pages(4);
        let mmu = MockMmuDriver::new();
        let err = vmm_command(&["alloc", "not-a-number", "12"], &mut pmm, &mmu).unwrap_err();
        assert_eq!(err, VmmError::Generic);
    }

    #[test]
    fn aspaces_lists_the_kernel_aspace_after_init() {
        crate::registry::vmm_init();
        let mut pmm = MockPageSource::with_free_pages(4);
        let mmu = MockMmuDriver::new();
        assert!(vmm_command(&["aspaces"], &mut pmm, &mmu).is_ok());
    }

    #[test]
    fn alloc_command_maps_memory_in_the_kernel_aspace() {
        crate::registry::vmm_init();
        let mut pmm = MockPageSource::with_free_pages(4);
        let mmu = MockMmuDriver::new();
        assert!(vmm_command(&["alloc", "0x1000", "12"], &mut pmm, &mmu).is_ok());
    }
}
