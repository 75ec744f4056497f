//! Guest memory.
//!
//! The emulated machine runs in bare mode: virtual addresses are physical
//! addresses. Guest RAM is modelled as a sparse set of 4 KB pages that
//! spring into existence (zeroed) on first write, up to `GUEST_RAM_SIZE`.

pub mod sparse;

pub use sparse::SparseMemory;

/// Guest memory access errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// Read touched a page that was never written.
    Unmapped(u64),
    /// The access range wraps the address space.
    Overflow,
    /// Guest RAM has no free page left for the write.
    Exhausted,
}

impl core::fmt::Display for MemoryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unmapped(addr) => write!(f, "Unmapped guest address {:#x}", addr),
            Self::Overflow => write!(f, "Guest access wraps the address space"),
            Self::Exhausted => write!(f, "Guest RAM exhausted"),
        }
    }
}

/// Byte-addressable guest memory.
pub trait GuestMemory {
    /// Copy `data` into guest memory starting at `addr`.
    fn write(&mut self, addr: u64, data: &[u8]) -> Result<(), MemoryError>;

    /// Fill `buf` from guest memory starting at `addr`.
    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Zero `len` bytes starting at `addr`.
    fn zero(&mut self, addr: u64, len: u64) -> Result<(), MemoryError> {
        const CHUNK: [u8; 256] = [0; 256];
        let mut done = 0u64;
        while done < len {
            let n = core::cmp::min(len - done, CHUNK.len() as u64);
            let at = addr.checked_add(done).ok_or(MemoryError::Overflow)?;
            self.write(at, &CHUNK[..n as usize])?;
            done += n;
        }
        Ok(())
    }

    /// Read a little-endian `u64` at `addr`.
    fn read_u64(&self, addr: u64) -> Result<u64, MemoryError> {
        let mut bytes = [0u8; 8];
        self.read(addr, &mut bytes)?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Write a little-endian `u64` at `addr`.
    fn write_u64(&mut self, addr: u64, value: u64) -> Result<(), MemoryError> {
        self.write(addr, &value.to_le_bytes())
    }
}

/// Picks the guest address a segment is copied to.
pub trait SegmentAllocator {
    /// Reserve `size` bytes for a segment linked at `vaddr` / `paddr` and
    /// return the address to copy into.
    fn alloc(&mut self, paddr: u64, vaddr: u64, size: u64) -> u64;
}

/// Bare-mode allocator: the target is the segment's own virtual address.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityMap;

impl SegmentAllocator for IdentityMap {
    fn alloc(&mut self, _paddr: u64, vaddr: u64, _size: u64) -> u64 {
        vaddr
    }
}
