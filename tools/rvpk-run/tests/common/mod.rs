//! Shared fixtures: a tiny ELF64 writer and CLI helpers.

#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use clap::Parser;
use rvpk_kernel::loader::elf::{EHDR_SIZE, PHDR_SIZE, PT_LOAD, SHDR_SIZE, SYM_SIZE};
use rvpk_run::cli::Cli;

pub const TEXT: u64 = 0x8100_0000;

/// One `r-x` segment at `entry` holding `code`, plus global function symbols.
pub fn elf_image(entry: u64, code: &[u8], functions: &[(&str, u64, u64)]) -> Vec<u8> {
    let mut out = vec![0u8; EHDR_SIZE + PHDR_SIZE];
    let code_off = out.len() as u64;
    out.extend_from_slice(code);

    let mut ph = Vec::with_capacity(PHDR_SIZE);
    ph.extend_from_slice(&PT_LOAD.to_le_bytes());
    ph.extend_from_slice(&5u32.to_le_bytes()); // r-x
    ph.extend_from_slice(&code_off.to_le_bytes());
    ph.extend_from_slice(&entry.to_le_bytes());
    ph.extend_from_slice(&entry.to_le_bytes());
    ph.extend_from_slice(&(code.len() as u64).to_le_bytes());
    ph.extend_from_slice(&(code.len() as u64).to_le_bytes());
    ph.extend_from_slice(&0x1000u64.to_le_bytes());
    out[EHDR_SIZE..EHDR_SIZE + PHDR_SIZE].copy_from_slice(&ph);

    let (shoff, shnum) = if functions.is_empty() {
        (0, 0)
    } else {
        append_symbols(&mut out, functions)
    };

    let mut h = Vec::with_capacity(EHDR_SIZE);
    h.extend_from_slice(&[0x7F, b'E', b'L', b'F', 2, 1, 1, 0]);
    h.extend_from_slice(&[0u8; 8]);
    h.extend_from_slice(&2u16.to_le_bytes());
    h.extend_from_slice(&243u16.to_le_bytes());
    h.extend_from_slice(&1u32.to_le_bytes());
    h.extend_from_slice(&entry.to_le_bytes());
    h.extend_from_slice(&(EHDR_SIZE as u64).to_le_bytes());
    h.extend_from_slice(&shoff.to_le_bytes());
    h.extend_from_slice(&0u32.to_le_bytes());
    h.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
    h.extend_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
    h.extend_from_slice(&1u16.to_le_bytes());
    h.extend_from_slice(&(SHDR_SIZE as u16).to_le_bytes());
    h.extend_from_slice(&shnum.to_le_bytes());
    h.extend_from_slice(&(if shnum == 0 { 0u16 } else { 3 }).to_le_bytes());
    out[..EHDR_SIZE].copy_from_slice(&h);
    out
}

fn append_symbols(out: &mut Vec<u8>, functions: &[(&str, u64, u64)]) -> (u64, u16) {
    let mut strtab = vec![0u8];
    let mut symtab = vec![0u8; SYM_SIZE];
    for &(name, value, size) in functions {
        let mut entry = [0u8; SYM_SIZE];
        entry[0..4].copy_from_slice(&(strtab.len() as u32).to_le_bytes());
        entry[4] = 0x12; // GLOBAL FUNC
        entry[6..8].copy_from_slice(&1u16.to_le_bytes());
        entry[8..16].copy_from_slice(&value.to_le_bytes());
        entry[16..24].copy_from_slice(&size.to_le_bytes());
        symtab.extend_from_slice(&entry);
        strtab.extend_from_slice(name.as_bytes());
        strtab.push(0);
    }
    let shstrtab = b"\0.symtab\0.strtab\0.shstrtab\0";

    let strtab_off = out.len() as u64;
    out.extend_from_slice(&strtab);
    let symtab_off = out.len() as u64;
    out.extend_from_slice(&symtab);
    let shstrtab_off = out.len() as u64;
    out.extend_from_slice(shstrtab);

    let shoff = out.len() as u64;
    let sections = [
        (0u32, 0u32, 0u64, 0u64, 0u64),
        (1, 2, symtab_off, symtab.len() as u64, SYM_SIZE as u64),
        (9, 3, strtab_off, strtab.len() as u64, 0),
        (17, 3, shstrtab_off, shstrtab.len() as u64, 0),
    ];
    for (name, sh_type, offset, size, entsize) in sections {
        let mut sh = [0u8; SHDR_SIZE];
        sh[0..4].copy_from_slice(&name.to_le_bytes());
        sh[4..8].copy_from_slice(&sh_type.to_le_bytes());
        sh[24..32].copy_from_slice(&offset.to_le_bytes());
        sh[32..40].copy_from_slice(&size.to_le_bytes());
        sh[56..64].copy_from_slice(&entsize.to_le_bytes());
        out.extend_from_slice(&sh);
    }
    (shoff, sections.len() as u16)
}

/// Write `bytes` to a fresh temporary file.
pub fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(bytes).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}

/// Parse a command line for `app` with extra options.
pub fn cli_for(app: &Path, extra: &[&str]) -> Cli {
    let mut argv = vec!["rvpk-run".to_string()];
    argv.extend(extra.iter().map(|s| s.to_string()));
    argv.push(app.display().to_string());
    Cli::try_parse_from(argv).expect("valid command line")
}
