//! Test doubles for the [`crate::traits::PageSource`] and
//! [`crate::traits::MmuDriver`] collaborators, used by the property tests in
//! [`crate::vmm`].

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use crate::addr::{PhysAddr, PhysPage, VirtAddr};
use crate::error::MmuError;
use crate::flags::MmuFlags;
use crate::traits::{MmuDriver, PageSource};
use crate::PAGE_SIZE;

/// A free list of fake physical pages, handed out in order.
pub struct MockPageSource {
    free: Vec<PhysAddr>,
    contiguous_enabled: bool,
}

impl MockPageSource {
    /// Seeds the source with `n` distinct, contiguous fake physical pages.
    pub fn with_free_pages(n: usize) -> Self {
        let free = (0..n as u64).map(|i| PhysAddr::new(0x1_0000_0000 + i * PAGE_SIZE)).collect();
        Self {
            free,
            contiguous_enabled: true,
        }
    }

    /// Makes every future [`PageSource::alloc_contiguous`] call fail,
    /// regardless of how many free pages remain.
    pub fn disable_contiguous_runs(&mut self) {
        self.contiguous_enabled = false;
    }

    /// Returns how many pages remain free.
    #[must_use]
    pub fn free_page_count(&self) -> usize {
        self.free.len()
    }
}

impl PageSource for MockPageSource {
    fn alloc_pages(&mut self, n: usize, out: &mut Vec<PhysPage>) -> usize {
        let count = n.min(self.free.len());
        for pa in self.free.drain(..count) {
            out.push(PhysPage::from_address(pa));
        }
        count
    }

    fn alloc_contiguous(&mut self, n: usize, _align_pow2: u8, out: &mut Vec<PhysPage>) -> Option<(PhysAddr, usize)> {
        if !self.contiguous_enabled || self.free.is_empty() {
            return None;
        }
        let count = n.min(self.free.len());
        let base = self.free[0];
        for pa in self.free.drain(..count) {
            out.push(PhysPage::from_address(pa));
        }
        Some((base, count))
    }

    fn free(&mut self, pages: Vec<PhysPage>) {
        self.free.extend(pages.into_iter().map(PhysPage::address));
    }

    fn page_to_address(&self, page: PhysPage) -> PhysAddr {
        page.address()
    }
}

/// Records every page mapped, and can be configured to reject the Nth
/// `map` call onward to exercise rollback.
pub struct MockMmuDriver {
    mapped: RefCell<BTreeMap<u64, MmuFlags>>,
    calls: Cell<usize>,
    fail_after: Cell<Option<usize>>,
}

impl MockMmuDriver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mapped: RefCell::new(BTreeMap::new()),
            calls: Cell::new(0),
            fail_after: Cell::new(None),
        }
    }

    /// Makes the `n`th (zero-indexed) and every later `map` call fail.
    pub fn fail_after(&self, n: usize) {
        self.fail_after.set(Some(n));
    }

    /// Returns how many consecutive pages starting at `va` are currently
    /// recorded as mapped.
    #[must_use]
    pub fn mapped_page_count(&self, va: VirtAddr) -> usize {
        let mapped = self.mapped.borrow();
        let mut count = 0u64;
        while mapped.contains_key(&(va.as_u64() + count * PAGE_SIZE)) {
            count += 1;
        }
        count as usize
    }
}

impl Default for MockMmuDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MmuDriver for MockMmuDriver {
    fn map(&self, va: VirtAddr, _pa: PhysAddr, page_count: usize, mmu_flags: MmuFlags) -> Result<(), MmuError> {
        let call_idx = self.calls.get();
        self.calls.set(call_idx + 1);
        if let Some(n) = self.fail_after.get()
            && call_idx >= n
        {
            return Err(MmuError::Unsupported);
        }

        let mut mapped = self.mapped.borrow_mut();
        for i in 0..page_count as u64 {
            mapped.insert(va.as_u64() + i * PAGE_SIZE, mmu_flags);
        }
        Ok(())
    }

    fn unmap(&self, va: VirtAddr, page_count: usize) -> Result<(), MmuError> {
        let mut mapped = self.mapped.borrow_mut();
        for i in 0..page_count as u64 {
            mapped.remove(&(va.as_u64() + i * PAGE_SIZE));
        }
        Ok(())
    }

    fn query(&self, va: VirtAddr) -> Option<(PhysAddr, MmuFlags)> {
        self.mapped.borrow().get(&va.as_u64()).map(|flags| (PhysAddr::new(va.as_u64()), *flags))
    }
}
