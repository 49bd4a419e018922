//! Process-wide registry of address spaces, plus the well-known kernel
//! aspace.
//!
//! The kernel aspace is initialised exactly once, during [`vmm_init`], and
//! lives for the remainder of the kernel's lifetime; user aspaces beyond it
//! are out of scope for this core (see this crate's crate-level docs).

use alloc::vec::Vec;

use kernel_sync::{Mutex, RawSpin, SyncOnceCell};

use crate::addr::VirtAddr;
use crate::address_space::AddressSpace;
use crate::layout::{KERNEL_ASPACE_BASE, KERNEL_ASPACE_SIZE};

static KERNEL_ASPACE: SyncOnceCell<AddressSpace> = SyncOnceCell::new();

static ASPACES: Mutex<Vec<&'static AddressSpace>, RawSpin> = Mutex::from_raw(RawSpin::new(), Vec::new());

/// Initialises process-wide VMM state: the kernel aspace and the aspace
/// registry. Safe to call more than once; later calls are no-ops.
pub fn vmm_init() {
    let kernel_aspace = KERNEL_ASPACE.get_or_init(|| AddressSpace::new("kernel", VirtAddr::new(KERNEL_ASPACE_BASE), KERNEL_ASPACE_SIZE));

    let mut aspaces = ASPACES.lock();
    if !aspaces.iter().any(|a| core::ptr::eq(*a, kernel_aspace)) {
        aspaces.push(kernel_aspace);
    }
}

/// Returns the process-wide kernel address space.
///
/// # Panics
///
/// Panics if called before [`vmm_init`]; handing back an uninitialized
/// aspace would silently violate every invariant this crate maintains, so
/// this is treated as the programmer error it is rather than a recoverable
/// failure.
#[must_use]
pub fn vmm_get_kernel_aspace() -> &'static AddressSpace {
    KERNEL_ASPACE.get().expect("vmm_init must run before vmm_get_kernel_aspace")
}

/// Returns every address space currently registered, in registration order.
#[must_use]
pub fn registered_aspaces() -> Vec<&'static AddressSpace> {
    ASPACES.lock().clone()
}
