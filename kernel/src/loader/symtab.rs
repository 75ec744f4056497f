//! Function symbol extraction.
//!
//! Locates `.symtab` and `.strtab` through the section-name table and copies
//! every sized function symbol into a [`SymbolTable`].

use super::elf::{
    Elf64Header, Elf64SectionHeader, Elf64Symbol, ElfError, SHDR_SIZE, STRTAB_NAME, SYMTAB_NAME,
    SYM_SIZE,
};
use super::image::{read_exact_at, ImageSource};
use crate::config::{MAX_SECTION_DATA_LEN, MAX_SYMBOL_NAME_LEN};
use crate::crash::{SymbolName, SymbolTable};

/// A string table inside the image, addressed by byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringTable {
    offset: u64,
    size: u64,
}

impl StringTable {
    /// Table of `size` bytes at file offset `offset`.
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Table described by a section header.
    pub fn from_section(sh: &Elf64SectionHeader) -> Self {
        Self::new(sh.sh_offset, sh.sh_size)
    }

    /// Declared size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read the string starting at `name_offset` into `buf`.
    ///
    /// Stops at the first NUL, at the end of the table or when `buf` is
    /// full, whichever comes first, and never reads a byte outside the
    /// table. An offset at or past the end yields an empty name.
    pub fn read_name<'b, S: ImageSource + ?Sized>(
        &self,
        source: &mut S,
        name_offset: u32,
        buf: &'b mut [u8],
    ) -> Result<&'b [u8], ElfError> {
        let start = u64::from(name_offset);
        if start >= self.size {
            return Ok(&buf[..0]);
        }

        let avail = core::cmp::min(self.size - start, buf.len() as u64) as usize;
        let at = self.offset.checked_add(start).ok_or(ElfError::Io)?;
        read_exact_at(source, &mut buf[..avail], at)?;

        let len = buf[..avail].iter().position(|&b| b == 0).unwrap_or(avail);
        Ok(&buf[..len])
    }
}

fn read_section<S: ImageSource + ?Sized>(
    source: &mut S,
    header: &Elf64Header,
    index: u16,
) -> Result<Elf64SectionHeader, ElfError> {
    let offset = header.section_header_offset(index).ok_or(ElfError::Io)?;
    let mut bytes = [0u8; SHDR_SIZE];
    read_exact_at(source, &mut bytes, offset)?;
    Ok(Elf64SectionHeader::parse(&bytes))
}

/// Build the function symbol table of an image.
///
/// An image without section headers, without `.symtab`/`.strtab` or with a
/// zero symbol entry size yields an empty table. Symbols beyond
/// `MAX_ELF_SYMBOLS` are dropped.
///
/// # Returns
///
/// * `Ok(SymbolTable)` - Sized function symbols in file order
/// * `Err(ElfError::Io)` - A section header, symbol or name could not be read
pub fn build<S: ImageSource + ?Sized>(
    header: &Elf64Header,
    source: &mut S,
) -> Result<SymbolTable, ElfError> {
    let mut table = SymbolTable::new();
    if header.e_shnum == 0 {
        log::debug!("[ELF] no section headers, symbol table is empty");
        return Ok(table);
    }

    let shstr = read_section(source, header, header.e_shstrndx)?;
    if shstr.sh_size > MAX_SECTION_DATA_LEN as u64 {
        log::debug!(
            "[ELF] section name table is {} bytes, reading first {}",
            shstr.sh_size,
            MAX_SECTION_DATA_LEN
        );
    }
    let section_names = StringTable::new(
        shstr.sh_offset,
        core::cmp::min(shstr.sh_size, MAX_SECTION_DATA_LEN as u64),
    );

    let mut symtab = None;
    let mut strtab = None;
    let mut name_buf = [0u8; MAX_SYMBOL_NAME_LEN];
    for index in 0..header.e_shnum {
        let sh = read_section(source, header, index)?;
        let name = section_names.read_name(source, sh.sh_name, &mut name_buf)?;
        if name == SYMTAB_NAME {
            symtab = Some(sh);
        } else if name == STRTAB_NAME {
            strtab = Some(sh);
        }
    }

    let (Some(symtab), Some(strtab)) = (symtab, strtab) else {
        log::debug!("[ELF] no .symtab/.strtab pair, symbol table is empty");
        return Ok(table);
    };
    if symtab.sh_entsize == 0 {
        log::warn!("[ELF] .symtab has zero entry size, ignoring it");
        return Ok(table);
    }

    let strings = StringTable::from_section(&strtab);
    let count = symtab.sh_size / symtab.sh_entsize;
    for i in 0..count {
        if table.is_full() {
            log::debug!(
                "[ELF] symbol table full at {} functions, dropping the rest",
                table.len()
            );
            break;
        }

        let offset = i
            .checked_mul(symtab.sh_entsize)
            .and_then(|rel| rel.checked_add(symtab.sh_offset))
            .ok_or(ElfError::Io)?;
        let mut bytes = [0u8; SYM_SIZE];
        read_exact_at(source, &mut bytes, offset)?;
        let sym = Elf64Symbol::parse(&bytes);
        if !sym.is_sized_function() {
            continue;
        }

        let name = strings.read_name(source, sym.st_name, &mut name_buf)?;
        table.push(sym, SymbolName::from_bytes(name));
    }

    Ok(table)
}
