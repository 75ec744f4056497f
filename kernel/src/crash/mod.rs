//! Stack walking and symbolization.
//!
//! Guest frames follow the fixed convention of this machine: the saved
//! return address sits at `fp + FRAME_RETURN_ADDRESS_OFFSET`, and the next
//! frame is found at `fp + FRAME_LINK_OFFSET` rather than through a saved
//! pointer.

mod symbols;

pub use symbols::*;

use alloc::vec::Vec;

use crate::config::{FRAME_LINK_OFFSET, FRAME_RETURN_ADDRESS_OFFSET, INSTRUCTION_WIDTH};
use crate::memory::GuestMemory;

/// Stack frame for backtrace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackFrame {
    /// Frame pointer the frame was read from
    pub fp: u64,
    /// Saved return address
    pub return_address: u64,
    /// Symbol table index, if the call site resolved
    pub symbol: Option<usize>,
}

/// Result of a stack walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Backtrace {
    /// Visited frames, innermost first
    pub frames: Vec<StackFrame>,
    /// Set when a return-address slot could not be read
    pub truncated_at: Option<u64>,
}

impl Backtrace {
    /// Number of frames visited, resolved or not.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Walk at most `depth` frames starting from `fp`.
///
/// Each return address is resolved one instruction back so the lookup lands
/// on the call itself. Unresolved frames are kept with `symbol: None`. The
/// walk stops when the link is zero or points back at the same frame, or
/// when a return-address slot is unreadable.
pub fn walk_stack<M: GuestMemory + ?Sized>(
    memory: &M,
    symbols: &SymbolTable,
    mut fp: u64,
    depth: u64,
) -> Backtrace {
    let mut trace = Backtrace::default();
    let mut visited = 0u64;

    while visited < depth && fp != 0 {
        let Some(slot) = fp.checked_add(FRAME_RETURN_ADDRESS_OFFSET) else {
            trace.truncated_at = Some(fp);
            break;
        };
        let return_address = match memory.read_u64(slot) {
            Ok(ra) => ra,
            Err(e) => {
                log::warn!("[BACKTRACE] stopping at fp={:#x}: {}", fp, e);
                trace.truncated_at = Some(fp);
                break;
            }
        };

        let symbol = symbols.resolve(return_address.wrapping_sub(INSTRUCTION_WIDTH));
        trace.frames.push(StackFrame {
            fp,
            return_address,
            symbol,
        });
        visited += 1;

        let prev = fp.wrapping_add(FRAME_LINK_OFFSET);
        if prev == 0 || prev == fp {
            break;
        }
        fp = prev;
    }

    trace
}
