//! System call handling module.
//!
//! The guest places the syscall number in `a0` and up to seven arguments in
//! `a1..a7`, then executes `ecall`. The result is returned in `a0`:
//! non-negative for success, negative [`SyscallError`] codes for recoverable
//! failures. An unknown number is a fatal [`Fault`].

pub mod handlers;

use crate::hal::Host;
use crate::machine::{Fault, Machine};
use crate::process::TrapFrame;

/// System call numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum SyscallNumber {
    /// Print a user buffer on the host console.
    UserPrint = 64,
    /// Exit the application.
    UserExit = 65,
    /// Print the names of the functions on the call stack.
    UserPrintBacktrace = 66,
}

impl TryFrom<u64> for SyscallNumber {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            64 => Ok(SyscallNumber::UserPrint),
            65 => Ok(SyscallNumber::UserExit),
            66 => Ok(SyscallNumber::UserPrintBacktrace),
            other => Err(other),
        }
    }
}

/// System call error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum SyscallError {
    /// No process is running.
    NoCurrentProcess = -1,
    /// A user buffer is not readable.
    BadAddress = -2,
}

impl SyscallError {
    /// Value returned to the guest in `a0`.
    pub fn code(self) -> i64 {
        self as i64
    }
}

/// System call result.
pub type SyscallResult = Result<i64, SyscallError>;

/// System call registers at trap time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyscallArgs {
    /// System call number.
    pub a0: u64,
    /// First argument.
    pub a1: u64,
    /// Second argument.
    pub a2: u64,
    /// Third argument.
    pub a3: u64,
    /// Fourth argument.
    pub a4: u64,
    /// Fifth argument.
    pub a5: u64,
    /// Sixth argument.
    pub a6: u64,
    /// Seventh argument.
    pub a7: u64,
}

impl SyscallArgs {
    /// Syscall `num` with leading arguments, the rest zero.
    pub fn new(num: u64, args: &[u64]) -> Self {
        let mut regs = [0u64; 7];
        for (slot, value) in regs.iter_mut().zip(args) {
            *slot = *value;
        }
        Self {
            a0: num,
            a1: regs[0],
            a2: regs[1],
            a3: regs[2],
            a4: regs[3],
            a5: regs[4],
            a6: regs[5],
            a7: regs[6],
        }
    }

    /// Read `a0..a7` from a saved frame.
    pub fn from_trapframe(frame: &TrapFrame) -> Self {
        let [a0, a1, a2, a3, a4, a5, a6, a7] = frame.args();
        Self {
            a0,
            a1,
            a2,
            a3,
            a4,
            a5,
            a6,
            a7,
        }
    }
}

/// Dispatch a system call.
///
/// Recoverable errors come back as negative `Ok` values; only an unknown
/// syscall number is an `Err`.
pub fn do_syscall<H: Host>(machine: &mut Machine<H>, args: SyscallArgs) -> Result<i64, Fault> {
    let syscall = SyscallNumber::try_from(args.a0).map_err(Fault::UnknownSyscall)?;
    log::trace!("[SYSCALL] {:?} a1={:#x} a2={:#x}", syscall, args.a1, args.a2);

    let result = handlers::handle(machine, syscall, &args);
    Ok(match result {
        Ok(value) => value,
        Err(err) => err.code(),
    })
}
