//! Address and page newtypes used throughout the region allocator.
//!
//! Virtual and physical addresses are kept as distinct types so that the
//! region store and the MMU/page-frame collaborators cannot accidentally
//! swap one for the other at a call site.

use core::fmt;
use core::ops::Add;

/// A virtual address inside some address space.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct VirtAddr(u64);

/// A physical address, as handed out by a [`crate::PageSource`].
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct PhysAddr(u64);

macro_rules! impl_addr {
    ($ty:ident) => {
        impl $ty {
            /// Wraps a raw `u64` value.
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw `u64` value.
            #[must_use]
            pub const fn as_u64(self) -> u64 {
                self.0
            }

            /// Adds `rhs` to this address, saturating instead of wrapping.
            #[must_use]
            pub const fn checked_add(self, rhs: u64) -> Option<Self> {
                match self.0.checked_add(rhs) {
                    Some(v) => Some(Self(v)),
                    None => None,
                }
            }
        }

        impl Add<u64> for $ty {
            type Output = Self;

            fn add(self, rhs: u64) -> Self {
                Self(self.0 + rhs)
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#018x})", stringify!($ty), self.0)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#018x}", self.0)
            }
        }
    };
}

impl_addr!(VirtAddr);
impl_addr!(PhysAddr);

/// A single physical page frame, as tracked by a region once it has been
/// handed pages by its [`crate::PageSource`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PhysPage(PhysAddr);

impl PhysPage {
    /// Wraps a page-aligned physical address as a page frame.
    #[must_use]
    pub const fn from_address(address: PhysAddr) -> Self {
        Self(address)
    }

    /// Returns the physical address backing this page frame.
    #[must_use]
    pub const fn address(self) -> PhysAddr {
        self.0
    }
}
