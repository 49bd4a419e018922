//! Error types returned by the region allocator and its collaborators.

/// Errors returned by the `vmm_*` entry points and the region store.
#[derive(Copy, Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum VmmError {
    /// A caller-supplied argument was malformed (zero size, misaligned
    /// address, `VALLOC_SPECIFIC` without a hint, ...).
    #[error("invalid arguments")]
    InvalidArgs,
    /// The requested virtual range does not lie inside the target address
    /// space.
    #[error("virtual address out of range for this address space")]
    OutOfRange,
    /// No virtual gap or no physical pages were available to satisfy the
    /// request.
    #[error("no memory available to satisfy the request")]
    NoMemory,
    /// Misuse of a diagnostic surface (bad console command syntax and
    /// similar), distinct from a resource failure.
    #[error("invalid command usage")]
    Generic,
    /// The [`crate::MmuDriver`] rejected the mapping after the region had
    /// already been placed; the region and any acquired pages have been
    /// rolled back.
    #[error("MMU driver rejected the mapping")]
    MappingFailed,
}

/// Errors returned by an [`crate::MmuDriver`] implementation.
#[derive(Copy, Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum MmuError {
    /// The driver cannot represent the requested mapping (unsupported
    /// flag combination, alignment, ...).
    #[error("mapping is not representable by this MMU driver")]
    Unsupported,
    /// The driver ran out of a resource it needs to create the mapping,
    /// typically page-table frames.
    #[error("MMU driver resources exhausted")]
    OutOfMemory,
}
