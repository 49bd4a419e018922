//! Bounded, heap-free region/address-space names.
//!
//! Mirrors the fixed `char name[32]` field of the reference allocator
//! instead of reaching for `alloc::string::String`: names are diagnostic
//! labels, not data, and keeping them inline avoids an allocation on every
//! region creation.

use core::fmt;

/// Maximum number of bytes a [`Name`] can hold, truncation included.
pub const NAME_CAPACITY: usize = 32;

/// A truncated, copyable name used for regions and address spaces.
#[derive(Copy, Clone)]
pub struct Name {
    buf: [u8; NAME_CAPACITY],
    len: u8,
}

impl Name {
    /// Builds a name from `s`, silently truncating at [`NAME_CAPACITY`]
    /// bytes (on a `char` boundary) if it is too long.
    #[must_use]
    pub fn new(s: &str) -> Self {
        let mut len = s.len().min(NAME_CAPACITY);
        while len > 0 && !s.is_char_boundary(len) {
            len -= 1;
        }
        let mut buf = [0u8; NAME_CAPACITY];
        buf[..len].copy_from_slice(&s.as_bytes()[..len]);
        Self { buf, len: len as u8 }
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // SAFETY: `new` only ever truncates on a `char` boundary.
        core::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or_default()
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_str(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_round_trip() {
        assert_eq!(Name::new("kernel").as_str(), "kernel");
    }

    #[test]
    fn long_names_are_truncated_not_rejected() {
        let long = "x".repeat(NAME_CAPACITY + 10);
        let name = Name::new(&long);
        assert_eq!(name.as_str().len(), NAME_CAPACITY);
    }
}
