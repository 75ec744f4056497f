//! System call handlers.

use alloc::vec;
use alloc::vec::Vec;

use super::{SyscallArgs, SyscallError, SyscallNumber, SyscallResult};
use crate::crash::{self, SymbolName, SymbolTable};
use crate::hal::Host;
use crate::machine::Machine;
use crate::memory::GuestMemory;

/// Largest piece of a user buffer copied at once.
const PRINT_CHUNK: usize = 4096;

/// Handle a system call.
pub fn handle<H: Host>(
    machine: &mut Machine<H>,
    syscall: SyscallNumber,
    args: &SyscallArgs,
) -> SyscallResult {
    match syscall {
        SyscallNumber::UserPrint => handle_user_print(machine, args),
        SyscallNumber::UserExit => handle_user_exit(machine, args),
        SyscallNumber::UserPrintBacktrace => handle_user_print_backtrace(machine, args),
    }
}

/// Copy `a2` bytes at `a1` to the console.
///
/// Long buffers are copied in chunks; a fault part way through leaves the
/// earlier chunks printed.
fn handle_user_print<H: Host>(machine: &mut Machine<H>, args: &SyscallArgs) -> SyscallResult {
    let addr = args.a1;
    let len = args.a2;
    if len == 0 {
        return Ok(0);
    }
    addr.checked_add(len).ok_or(SyscallError::BadAddress)?;

    let mut buf = vec![0u8; core::cmp::min(len, PRINT_CHUNK as u64) as usize];
    let mut done = 0u64;
    while done < len {
        let n = core::cmp::min(len - done, PRINT_CHUNK as u64) as usize;
        machine
            .memory()
            .read(addr + done, &mut buf[..n])
            .map_err(|e| {
                log::warn!("[SYSCALL] print from {:#x}: {}", addr + done, e);
                SyscallError::BadAddress
            })?;
        machine.console_write(&buf[..n]);
        done += n as u64;
    }

    Ok(0)
}

/// Exit with code `a1`; powers the machine off.
fn handle_user_exit<H: Host>(machine: &mut Machine<H>, args: &SyscallArgs) -> SyscallResult {
    let code = args.a1 as i64;
    log::info!("[SYSCALL] User exit with code: {}.", code);
    machine.exit_current(code);
    Ok(0)
}

/// Print up to `a1` function names from the current call stack.
///
/// Returns the number of frames visited, resolved or not.
fn handle_user_print_backtrace<H: Host>(
    machine: &mut Machine<H>,
    args: &SyscallArgs,
) -> SyscallResult {
    let depth = args.a1;
    let fp = machine
        .current_process()
        .ok_or(SyscallError::NoCurrentProcess)?
        .trapframe
        .fp();

    let empty = SymbolTable::new();
    let symbols = machine.symbols().unwrap_or(&empty);
    let trace = crash::walk_stack(machine.memory(), symbols, fp, depth);

    let names: Vec<SymbolName> = trace
        .frames
        .iter()
        .filter_map(|frame| frame.symbol)
        .filter_map(|idx| symbols.name(idx).map(|f| f.name))
        .collect();

    for name in &names {
        machine.console_write(name.as_bytes());
        machine.console_write(b"\n");
    }

    log::debug!(
        "[BACKTRACE] {} frames, {} resolved",
        trace.depth(),
        names.len()
    );
    Ok(trace.depth() as i64)
}
