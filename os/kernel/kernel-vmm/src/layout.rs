//! Compile-time layout constants for the process-wide kernel address space.
//!
//! Kept local to this crate (rather than pulled from `kernel-info`) so the
//! region allocator has no hard dependency on the rest of the boot pipeline;
//! the naming mirrors `kernel-info::memory`'s constants.

/// Inclusive start of the kernel address space.
pub const KERNEL_ASPACE_BASE: u64 = 0xffff_ffff_8000_0000;

/// Size, in bytes, of the kernel address space.
pub const KERNEL_ASPACE_SIZE: u64 = 0x4000_0000; // 1 GiB
