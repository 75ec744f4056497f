//! Test fixtures: an ELF64 image builder and a recording host.

use alloc::vec::Vec;

use crate::hal::Host;
use crate::loader::elf::{SegmentFlags, EHDR_SIZE, PHDR_SIZE, PT_LOAD, SHDR_SIZE, STT_FUNC, SYM_SIZE};
use crate::process::{Pid, TrapFrame};

/// One program header plus the bytes it covers.
#[derive(Debug, Clone)]
pub struct SegmentSpec {
    pub p_type: u32,
    pub flags: SegmentFlags,
    pub vaddr: u64,
    pub data: Vec<u8>,
    pub memsz: u64,
}

impl SegmentSpec {
    /// Readable `PT_LOAD` segment at `vaddr`.
    pub fn load(vaddr: u64, data: &[u8], memsz: u64) -> Self {
        Self {
            p_type: PT_LOAD,
            flags: SegmentFlags::R,
            vaddr,
            data: data.to_vec(),
            memsz,
        }
    }

    pub fn flags(mut self, flags: SegmentFlags) -> Self {
        self.flags = flags;
        self
    }
}

#[derive(Debug, Clone)]
struct SymbolSpec {
    name: Vec<u8>,
    info: u8,
    value: u64,
    size: u64,
}

/// Assembles little-endian ELF64 images.
///
/// Layout: header, program headers, segment bytes, then (only when symbols
/// were added) `.strtab`, `.symtab`, `.shstrtab` and the section headers.
pub struct ImageBuilder {
    entry: u64,
    segments: Vec<SegmentSpec>,
    symbols: Vec<SymbolSpec>,
    symtab_name: &'static str,
    strtab_name: &'static str,
    symtab_entsize: u64,
}

impl ImageBuilder {
    pub fn new(entry: u64) -> Self {
        Self {
            entry,
            segments: Vec::new(),
            symbols: Vec::new(),
            symtab_name: ".symtab",
            strtab_name: ".strtab",
            symtab_entsize: SYM_SIZE as u64,
        }
    }

    pub fn segment(mut self, segment: SegmentSpec) -> Self {
        self.segments.push(segment);
        self
    }

    /// Global function symbol.
    pub fn function(self, name: &str, value: u64, size: u64) -> Self {
        self.symbol(name, 0x10 | STT_FUNC, value, size)
    }

    pub fn symbol(mut self, name: &str, info: u8, value: u64, size: u64) -> Self {
        self.symbols.push(SymbolSpec {
            name: name.as_bytes().to_vec(),
            info,
            value,
            size,
        });
        self
    }

    /// Override the names given to the symbol and string table sections.
    pub fn section_names(mut self, symtab: &'static str, strtab: &'static str) -> Self {
        self.symtab_name = symtab;
        self.strtab_name = strtab;
        self
    }

    pub fn symtab_entsize(mut self, entsize: u64) -> Self {
        self.symtab_entsize = entsize;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let phnum = self.segments.len();
        let mut out = vec![0u8; EHDR_SIZE + phnum * PHDR_SIZE];

        let mut phdrs = Vec::new();
        for seg in &self.segments {
            let offset = out.len() as u64;
            out.extend_from_slice(&seg.data);
            let mut ph = Vec::with_capacity(PHDR_SIZE);
            ph.extend_from_slice(&seg.p_type.to_le_bytes());
            ph.extend_from_slice(&seg.flags.bits().to_le_bytes());
            ph.extend_from_slice(&offset.to_le_bytes());
            ph.extend_from_slice(&seg.vaddr.to_le_bytes());
            ph.extend_from_slice(&seg.vaddr.to_le_bytes());
            ph.extend_from_slice(&(seg.data.len() as u64).to_le_bytes());
            ph.extend_from_slice(&seg.memsz.to_le_bytes());
            ph.extend_from_slice(&0x1000u64.to_le_bytes());
            phdrs.push(ph);
        }
        for (i, ph) in phdrs.iter().enumerate() {
            let at = EHDR_SIZE + i * PHDR_SIZE;
            out[at..at + PHDR_SIZE].copy_from_slice(ph);
        }

        let (shoff, shnum, shstrndx) = if self.symbols.is_empty() {
            (0u64, 0u16, 0u16)
        } else {
            self.append_sections(&mut out)
        };

        let mut h = Vec::with_capacity(EHDR_SIZE);
        h.extend_from_slice(&[0x7F, b'E', b'L', b'F', 2, 1, 1, 0]);
        h.extend_from_slice(&[0u8; 8]);
        h.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        h.extend_from_slice(&243u16.to_le_bytes()); // EM_RISCV
        h.extend_from_slice(&1u32.to_le_bytes());
        h.extend_from_slice(&self.entry.to_le_bytes());
        h.extend_from_slice(&(EHDR_SIZE as u64).to_le_bytes());
        h.extend_from_slice(&shoff.to_le_bytes());
        h.extend_from_slice(&0u32.to_le_bytes());
        h.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
        h.extend_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
        h.extend_from_slice(&(phnum as u16).to_le_bytes());
        h.extend_from_slice(&(SHDR_SIZE as u16).to_le_bytes());
        h.extend_from_slice(&shnum.to_le_bytes());
        h.extend_from_slice(&shstrndx.to_le_bytes());
        out[..EHDR_SIZE].copy_from_slice(&h);

        out
    }

    /// Returns `(shoff, shnum, shstrndx)`.
    fn append_sections(&self, out: &mut Vec<u8>) -> (u64, u16, u16) {
        // Entries are laid out at least SYM_SIZE apart; the declared entsize
        // may differ to exercise the parser
        let width = core::cmp::max(self.symtab_entsize as usize, SYM_SIZE);
        let mut strtab = vec![0u8];
        let mut symtab = vec![0u8; width]; // null symbol
        for sym in &self.symbols {
            let name_off = strtab.len() as u32;
            strtab.extend_from_slice(&sym.name);
            strtab.push(0);

            let mut entry = vec![0u8; width];
            entry[0..4].copy_from_slice(&name_off.to_le_bytes());
            entry[4] = sym.info;
            entry[6..8].copy_from_slice(&1u16.to_le_bytes());
            entry[8..16].copy_from_slice(&sym.value.to_le_bytes());
            entry[16..24].copy_from_slice(&sym.size.to_le_bytes());
            symtab.extend_from_slice(&entry);
        }

        let mut shstrtab = vec![0u8];
        let mut add_name = |name: &str| {
            let off = shstrtab.len() as u32;
            shstrtab.extend_from_slice(name.as_bytes());
            shstrtab.push(0);
            off
        };
        let symtab_name = add_name(self.symtab_name);
        let strtab_name = add_name(self.strtab_name);
        let shstrtab_name = add_name(".shstrtab");

        let strtab_off = out.len() as u64;
        out.extend_from_slice(&strtab);
        let symtab_off = out.len() as u64;
        out.extend_from_slice(&symtab);
        let shstrtab_off = out.len() as u64;
        out.extend_from_slice(&shstrtab);

        let shoff = out.len() as u64;
        let sections = [
            (0u32, 0u32, 0u64, 0u64, 0u32, 0u64),
            (symtab_name, 2, symtab_off, symtab.len() as u64, 2, self.symtab_entsize),
            (strtab_name, 3, strtab_off, strtab.len() as u64, 0, 0),
            (shstrtab_name, 3, shstrtab_off, shstrtab.len() as u64, 0, 0),
        ];
        for (name, sh_type, offset, size, link, entsize) in sections {
            let mut sh = vec![0u8; SHDR_SIZE];
            sh[0..4].copy_from_slice(&name.to_le_bytes());
            sh[4..8].copy_from_slice(&sh_type.to_le_bytes());
            sh[24..32].copy_from_slice(&offset.to_le_bytes());
            sh[32..40].copy_from_slice(&size.to_le_bytes());
            sh[40..44].copy_from_slice(&link.to_le_bytes());
            sh[56..64].copy_from_slice(&entsize.to_le_bytes());
            out.extend_from_slice(&sh);
        }

        (shoff, sections.len() as u16, 3)
    }
}

/// Host that records everything the kernel asks of it.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub console: Vec<u8>,
    pub shutdowns: Vec<i64>,
    pub switches: Vec<(Pid, u64)>,
}

impl RecordingHost {
    pub fn console_str(&self) -> &str {
        core::str::from_utf8(&self.console).unwrap()
    }
}

impl Host for RecordingHost {
    fn console_write(&mut self, bytes: &[u8]) {
        self.console.extend_from_slice(bytes);
    }

    fn shutdown(&mut self, code: i64) {
        self.shutdowns.push(code);
    }

    fn switch_to(&mut self, pid: Pid, frame: &TrapFrame) {
        self.switches.push((pid, frame.epc));
    }
}
