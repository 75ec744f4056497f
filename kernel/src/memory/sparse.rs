//! Sparse page-backed guest RAM.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;

use super::{GuestMemory, MemoryError};
use crate::config::{GUEST_RAM_SIZE, PAGE_SIZE};

type Page = Box<[u8; PAGE_SIZE]>;

const PAGE_MASK: u64 = !(PAGE_SIZE as u64 - 1);

const MAX_PAGES: usize = GUEST_RAM_SIZE / PAGE_SIZE;

/// Guest RAM backed by lazily allocated, zero-initialised pages.
#[derive(Default)]
pub struct SparseMemory {
    pages: BTreeMap<u64, Page>,
}

impl SparseMemory {
    /// Create an empty memory with no pages.
    pub const fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
        }
    }

    /// Number of pages that have been touched by a write.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Whether any byte of the page containing `addr` has been written.
    pub fn is_mapped(&self, addr: u64) -> bool {
        self.pages.contains_key(&(addr & PAGE_MASK))
    }

    /// Walk `[addr, addr + len)` page by page, yielding
    /// `(page_base, offset_in_page, offset_in_buffer, chunk_len)`.
    fn chunks(addr: u64, len: usize) -> Result<Chunks, MemoryError> {
        addr.checked_add(len as u64).ok_or(MemoryError::Overflow)?;
        Ok(Chunks {
            addr,
            remaining: len,
            done: 0,
        })
    }
}

struct Chunks {
    addr: u64,
    remaining: usize,
    done: usize,
}

impl Iterator for Chunks {
    type Item = (u64, usize, usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let at = self.addr + self.done as u64;
        let base = at & PAGE_MASK;
        let offset = (at - base) as usize;
        let len = core::cmp::min(PAGE_SIZE - offset, self.remaining);
        let item = (base, offset, self.done, len);
        self.done += len;
        self.remaining -= len;
        Some(item)
    }
}

impl GuestMemory for SparseMemory {
    fn write(&mut self, addr: u64, data: &[u8]) -> Result<(), MemoryError> {
        for (base, offset, at, len) in Self::chunks(addr, data.len())? {
            if !self.pages.contains_key(&base) && self.pages.len() >= MAX_PAGES {
                return Err(MemoryError::Exhausted);
            }
            let page = self
                .pages
                .entry(base)
                .or_insert_with(|| Box::new([0u8; PAGE_SIZE]));
            page[offset..offset + len].copy_from_slice(&data[at..at + len]);
        }
        Ok(())
    }

    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        for (base, offset, at, len) in Self::chunks(addr, buf.len())? {
            let page = self
                .pages
                .get(&base)
                .ok_or(MemoryError::Unmapped(base + offset as u64))?;
            buf[at..at + len].copy_from_slice(&page[offset..offset + len]);
        }
        Ok(())
    }
}
