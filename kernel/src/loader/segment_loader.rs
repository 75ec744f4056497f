//! ELF Segment Memory Loader
//!
//! Walks the program header table and copies every `PT_LOAD` segment into
//! guest memory.
//!
//! # Process
//!
//! 1. For each of `phnum` program headers (stride `phentsize`):
//!    a. Read the header, skip anything that is not `PT_LOAD`
//!    b. Reject `memsz < filesz` and address-space wraparound
//!    c. Ask the allocator for the destination (bare mode: `vaddr`)
//!    d. Copy `filesz` bytes from the image
//!    e. Zero-fill BSS (the `memsz - filesz` tail)

use alloc::vec::Vec;

use super::elf::{Elf64Header, Elf64ProgramHeader, ElfError, SegmentFlags, PHDR_SIZE};
use super::image::{read_exact_at, ImageSource};
use crate::config::PAGE_SIZE;
use crate::memory::{GuestMemory, MemoryError, SegmentAllocator};

/// One segment placed in guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedSegment {
    /// Link-time virtual address
    pub vaddr: u64,
    /// Guest address the bytes were written to
    pub dest: u64,
    /// Bytes copied from the image
    pub filesz: u64,
    /// Bytes occupied in memory
    pub memsz: u64,
    /// Permissions
    pub flags: SegmentFlags,
}

/// Result of loading all segments of an image.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Loaded segments in program header order
    pub segments: Vec<LoadedSegment>,
    /// Program headers skipped because they were not `PT_LOAD`
    pub skipped: usize,
}

impl LoadReport {
    /// Total bytes placed in memory (file bytes plus BSS).
    pub fn total_memsz(&self) -> u64 {
        self.segments.iter().map(|s| s.memsz).sum()
    }
}

/// Load every `PT_LOAD` segment of the image into `memory`.
///
/// A malformed segment aborts the load before any of its bytes are written;
/// segments earlier in the table stay loaded.
///
/// # Returns
///
/// * `Ok(LoadReport)` - All loadable segments copied
/// * `Err(ElfError::Io)` - A header or segment could not be read in full
/// * `Err(ElfError::MalformedSegment)` - Inconsistent segment sizes
/// * `Err(ElfError::NoMemory)` - Guest RAM ran out mid-segment
pub fn load_segments<S, M, A>(
    header: &Elf64Header,
    source: &mut S,
    memory: &mut M,
    allocator: &mut A,
) -> Result<LoadReport, ElfError>
where
    S: ImageSource + ?Sized,
    M: GuestMemory + ?Sized,
    A: SegmentAllocator + ?Sized,
{
    let mut report = LoadReport::default();

    if header.e_phnum > 0 && usize::from(header.e_phentsize) < PHDR_SIZE {
        return Err(ElfError::MalformedSegment);
    }

    for index in 0..header.e_phnum {
        let offset = header.program_header_offset(index).ok_or(ElfError::Io)?;
        let mut bytes = [0u8; PHDR_SIZE];
        read_exact_at(source, &mut bytes, offset)?;
        let ph = Elf64ProgramHeader::parse(&bytes);

        if !ph.is_load() {
            report.skipped += 1;
            continue;
        }

        ph.validate()?;

        let dest = allocator.alloc(ph.p_paddr, ph.p_vaddr, ph.p_memsz);
        copy_segment(&ph, dest, source, memory)?;

        log::debug!(
            "[ELF] segment {}: vaddr={:#x} filesz={:#x} memsz={:#x} {}",
            index,
            ph.p_vaddr,
            ph.p_filesz,
            ph.p_memsz,
            ph.flags()
        );

        report.segments.push(LoadedSegment {
            vaddr: ph.p_vaddr,
            dest,
            filesz: ph.p_filesz,
            memsz: ph.p_memsz,
            flags: ph.flags(),
        });
    }

    Ok(report)
}

fn copy_segment<S, M>(
    ph: &Elf64ProgramHeader,
    dest: u64,
    source: &mut S,
    memory: &mut M,
) -> Result<(), ElfError>
where
    S: ImageSource + ?Sized,
    M: GuestMemory + ?Sized,
{
    // Destination range must not wrap either
    dest.checked_add(ph.p_memsz)
        .ok_or(ElfError::MalformedSegment)?;

    let mut chunk = [0u8; PAGE_SIZE];
    let mut done = 0u64;
    while done < ph.p_filesz {
        let n = core::cmp::min(ph.p_filesz - done, PAGE_SIZE as u64) as usize;
        let offset = ph.p_offset.checked_add(done).ok_or(ElfError::Io)?;
        read_exact_at(source, &mut chunk[..n], offset)?;
        memory.write(dest + done, &chunk[..n]).map_err(memory_error)?;
        done += n as u64;
    }

    let bss = ph.p_memsz - ph.p_filesz;
    if bss > 0 {
        memory
            .zero(dest + ph.p_filesz, bss)
            .map_err(memory_error)?;
    }

    Ok(())
}

fn memory_error(e: MemoryError) -> ElfError {
    match e {
        MemoryError::Exhausted => ElfError::NoMemory,
        MemoryError::Unmapped(_) | MemoryError::Overflow => ElfError::MalformedSegment,
    }
}
