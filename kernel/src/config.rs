//! Kernel configuration constants.
//!
//! This module contains compile-time configuration for the kernel.
//! Values here bound every table the kernel builds from untrusted input.

/// Maximum number of host command-line strings handed to the kernel.
pub const MAX_CMDLINE_ARGS: usize = 64;

/// Maximum number of function symbols retained from an image.
pub const MAX_ELF_SYMBOLS: usize = 256;

/// Capacity of a symbol name buffer, terminator slot included.
///
/// Stored names therefore hold at most `MAX_SYMBOL_NAME_LEN - 1` bytes.
pub const MAX_SYMBOL_NAME_LEN: usize = 32;

/// Upper bound on the section-name string table read during symbol loading.
pub const MAX_SECTION_DATA_LEN: usize = 4096;

/// Number of process slots.
pub const NPROC: usize = 32;

/// Page size (4 KB).
pub const PAGE_SIZE: usize = 4096;

/// Guest RAM size (64 MB). Writes that would map more pages fail.
pub const GUEST_RAM_SIZE: usize = 64 << 20;

/// Width of one instruction; subtracted from a return address so the lookup
/// lands inside the calling instruction.
pub const INSTRUCTION_WIDTH: u64 = 4;

/// Offset from a frame pointer to the saved return address.
pub const FRAME_RETURN_ADDRESS_OFFSET: u64 = 8;

/// Offset from a frame pointer to the previous frame.
pub const FRAME_LINK_OFFSET: u64 = 0x10;

/// Code reported to the host when the machine halts on a fatal fault.
pub const FAULT_EXIT_CODE: i64 = -1;

/// Initial user stack pointer of a freshly loaded application.
pub const USER_STACK_TOP: u64 = 0x8110_0000;
