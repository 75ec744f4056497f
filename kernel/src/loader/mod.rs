//! ELF Binary Loader
//!
//! Loads a statically linked ELF64 RISC-V application into guest memory and
//! extracts its function symbols for backtraces.
//!
//! # ELF64 Format Support
//!
//! - ELF64 header parsing and magic check
//! - Program headers (`PT_LOAD` segments, BSS zero-fill)
//! - Section headers (`.symtab` / `.strtab` lookup)
//!
//! # Security
//!
//! - Every header, segment and string read is bounds-checked against the
//!   image; short reads fail the load
//! - String table scans never leave the table's declared size

pub mod elf;
pub mod image;
pub mod segment_loader;
pub mod symtab;

pub use elf::{Elf64Header, ElfError, ElfLoader, SegmentFlags};
pub use image::ImageSource;
pub use segment_loader::{LoadReport, LoadedSegment};
pub use symtab::StringTable;
