//! ELF64 structures and header validation.
//!
//! All structures are decoded field by field from their little-endian file
//! layout; nothing in here trusts image alignment or host endianness.

use bitflags::bitflags;

use super::image::{read_exact_at, ImageSource};
use super::segment_loader::{self, LoadReport};
use super::symtab;
use crate::crash::SymbolTable;
use crate::memory::{GuestMemory, SegmentAllocator};

/// ELF magic number: 0x7F 'E' 'L' 'F', read as a little-endian `u32`.
pub const ELF_MAGIC: u32 = 0x464C_457F;

/// Program header type: loadable segment
pub const PT_LOAD: u32 = 1;

/// Symbol type: function
pub const STT_FUNC: u8 = 2;

/// Size of the ELF64 file header.
pub const EHDR_SIZE: usize = 64;

/// Size of one ELF64 program header.
pub const PHDR_SIZE: usize = 56;

/// Size of one ELF64 section header.
pub const SHDR_SIZE: usize = 64;

/// Size of one ELF64 symbol entry.
pub const SYM_SIZE: usize = 24;

/// Name of the symbol table section.
pub const SYMTAB_NAME: &[u8] = b".symtab";

/// Name of the symbol string table section.
pub const STRTAB_NAME: &[u8] = b".strtab";

fn le_u16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn le_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn le_u64(b: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&b[at..at + 8]);
    u64::from_le_bytes(bytes)
}

/// ELF loading errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    /// The image returned fewer bytes than requested
    Io,
    /// Magic number mismatch
    NotElf,
    /// Segment sizes violate `memsz >= filesz` or wrap the address space
    MalformedSegment,
    /// Segment does not fit in guest RAM
    NoMemory,
}

impl core::fmt::Display for ElfError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io => write!(f, "Short read from application image"),
            Self::NotElf => write!(f, "Not a recognized ELF image"),
            Self::MalformedSegment => write!(f, "Malformed loadable segment"),
            Self::NoMemory => write!(f, "Loadable segment does not fit in guest memory"),
        }
    }
}

/// ELF64 file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64Header {
    /// Signature, `ELF_MAGIC` for valid images
    pub magic: u32,
    /// Remaining identification bytes (class, encoding, ABI, padding)
    pub ident: [u8; 12],
    /// Object file type
    pub e_type: u16,
    /// Machine type
    pub e_machine: u16,
    /// Object file version
    pub e_version: u32,
    /// Entry point virtual address
    pub e_entry: u64,
    /// Program header table file offset
    pub e_phoff: u64,
    /// Section header table file offset
    pub e_shoff: u64,
    /// Processor-specific flags
    pub e_flags: u32,
    /// ELF header size
    pub e_ehsize: u16,
    /// Program header table entry size
    pub e_phentsize: u16,
    /// Program header table entry count
    pub e_phnum: u16,
    /// Section header table entry size
    pub e_shentsize: u16,
    /// Section header table entry count
    pub e_shnum: u16,
    /// Section name string table index
    pub e_shstrndx: u16,
}

impl Elf64Header {
    /// Decode a header from its on-disk bytes.
    pub fn parse(b: &[u8; EHDR_SIZE]) -> Self {
        let mut ident = [0u8; 12];
        ident.copy_from_slice(&b[4..16]);
        Self {
            magic: le_u32(b, 0),
            ident,
            e_type: le_u16(b, 16),
            e_machine: le_u16(b, 18),
            e_version: le_u32(b, 20),
            e_entry: le_u64(b, 24),
            e_phoff: le_u64(b, 32),
            e_shoff: le_u64(b, 40),
            e_flags: le_u32(b, 48),
            e_ehsize: le_u16(b, 52),
            e_phentsize: le_u16(b, 54),
            e_phnum: le_u16(b, 56),
            e_shentsize: le_u16(b, 58),
            e_shnum: le_u16(b, 60),
            e_shstrndx: le_u16(b, 62),
        }
    }

    /// File offset of program header `index`, `None` if it overflows.
    pub fn program_header_offset(&self, index: u16) -> Option<u64> {
        u64::from(index)
            .checked_mul(u64::from(self.e_phentsize))?
            .checked_add(self.e_phoff)
    }

    /// File offset of section header `index`, `None` if it overflows.
    pub fn section_header_offset(&self, index: u16) -> Option<u64> {
        u64::from(index)
            .checked_mul(u64::from(self.e_shentsize))?
            .checked_add(self.e_shoff)
    }
}

bitflags! {
    /// Segment permission flags (`p_flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u32 {
        /// Executable
        const X = 1;
        /// Writable
        const W = 2;
        /// Readable
        const R = 4;
    }
}

impl core::fmt::Display for SegmentFlags {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let r = if self.contains(Self::R) { 'r' } else { '-' };
        let w = if self.contains(Self::W) { 'w' } else { '-' };
        let x = if self.contains(Self::X) { 'x' } else { '-' };
        write!(f, "{}{}{}", r, w, x)
    }
}

/// ELF64 program header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64ProgramHeader {
    /// Segment type
    pub p_type: u32,
    /// Segment flags
    pub p_flags: u32,
    /// Segment file offset
    pub p_offset: u64,
    /// Segment virtual address
    pub p_vaddr: u64,
    /// Segment physical address
    pub p_paddr: u64,
    /// Segment size in file
    pub p_filesz: u64,
    /// Segment size in memory
    pub p_memsz: u64,
    /// Segment alignment
    pub p_align: u64,
}

impl Elf64ProgramHeader {
    /// Decode a program header from its on-disk bytes.
    pub fn parse(b: &[u8; PHDR_SIZE]) -> Self {
        Self {
            p_type: le_u32(b, 0),
            p_flags: le_u32(b, 4),
            p_offset: le_u64(b, 8),
            p_vaddr: le_u64(b, 16),
            p_paddr: le_u64(b, 24),
            p_filesz: le_u64(b, 32),
            p_memsz: le_u64(b, 40),
            p_align: le_u64(b, 48),
        }
    }

    /// Whether this segment is materialized in memory.
    pub fn is_load(&self) -> bool {
        self.p_type == PT_LOAD
    }

    /// Permission flags, unknown bits dropped.
    pub fn flags(&self) -> SegmentFlags {
        SegmentFlags::from_bits_truncate(self.p_flags)
    }

    /// Check `memsz >= filesz` and that `vaddr + memsz` does not wrap.
    pub fn validate(&self) -> Result<(), ElfError> {
        if self.p_memsz < self.p_filesz {
            return Err(ElfError::MalformedSegment);
        }
        self.p_vaddr
            .checked_add(self.p_memsz)
            .ok_or(ElfError::MalformedSegment)?;
        Ok(())
    }
}

/// ELF64 section header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Elf64SectionHeader {
    /// Section name (string table index)
    pub sh_name: u32,
    /// Section type
    pub sh_type: u32,
    /// Section flags
    pub sh_flags: u64,
    /// Section virtual address
    pub sh_addr: u64,
    /// Section file offset
    pub sh_offset: u64,
    /// Section size
    pub sh_size: u64,
    /// Link to another section
    pub sh_link: u32,
    /// Additional section information
    pub sh_info: u32,
    /// Section alignment
    pub sh_addralign: u64,
    /// Entry size if section holds table
    pub sh_entsize: u64,
}

impl Elf64SectionHeader {
    /// Decode a section header from its on-disk bytes.
    pub fn parse(b: &[u8; SHDR_SIZE]) -> Self {
        Self {
            sh_name: le_u32(b, 0),
            sh_type: le_u32(b, 4),
            sh_flags: le_u64(b, 8),
            sh_addr: le_u64(b, 16),
            sh_offset: le_u64(b, 24),
            sh_size: le_u64(b, 32),
            sh_link: le_u32(b, 40),
            sh_info: le_u32(b, 44),
            sh_addralign: le_u64(b, 48),
            sh_entsize: le_u64(b, 56),
        }
    }
}

/// ELF64 symbol table entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Elf64Symbol {
    /// Symbol name (string table index)
    pub st_name: u32,
    /// Type and binding attributes
    pub st_info: u8,
    /// Visibility
    pub st_other: u8,
    /// Section index
    pub st_shndx: u16,
    /// Symbol value (address)
    pub st_value: u64,
    /// Symbol size
    pub st_size: u64,
}

impl Elf64Symbol {
    /// Decode a symbol entry from its on-disk bytes.
    pub fn parse(b: &[u8; SYM_SIZE]) -> Self {
        Self {
            st_name: le_u32(b, 0),
            st_info: b[4],
            st_other: b[5],
            st_shndx: le_u16(b, 6),
            st_value: le_u64(b, 8),
            st_size: le_u64(b, 16),
        }
    }

    /// Symbol type (low nibble of `st_info`).
    pub fn symbol_type(&self) -> u8 {
        self.st_info & 0xF
    }

    /// Whether the symbol names a function body worth keeping.
    pub fn is_sized_function(&self) -> bool {
        self.symbol_type() == STT_FUNC && self.st_size != 0
    }
}

/// ELF64 loader
pub struct ElfLoader;

impl ElfLoader {
    /// Read and validate the file header.
    ///
    /// # Returns
    ///
    /// * `Ok(Elf64Header)` - The header, magic checked
    /// * `Err(ElfError::Io)` - The image is shorter than a header
    /// * `Err(ElfError::NotElf)` - Magic mismatch
    pub fn init<S: ImageSource + ?Sized>(source: &mut S) -> Result<Elf64Header, ElfError> {
        let mut bytes = [0u8; EHDR_SIZE];
        read_exact_at(source, &mut bytes, 0)?;

        let header = Elf64Header::parse(&bytes);
        if header.magic != ELF_MAGIC {
            return Err(ElfError::NotElf);
        }

        Ok(header)
    }

    /// Copy every loadable segment into guest memory.
    pub fn load<S, M, A>(
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
        segment_loader::load_segments(header, source, memory, allocator)
    }

    /// Extract the function symbol table.
    pub fn load_symbols<S: ImageSource + ?Sized>(
        header: &Elf64Header,
        source: &mut S,
    ) -> Result<SymbolTable, ElfError> {
        symtab::build(header, source)
    }
}
