//! Machine context.
//!
//! A [`Machine`] owns all kernel state: guest memory, the scheduler and its
//! process arena, the symbol table of the loaded application, the current
//! process and the power state. Every kernel entry point takes it by
//! `&mut`, so there is no global mutable state.

use core::fmt::Write;

use spin::Once;

use crate::config::FAULT_EXIT_CODE;
use crate::crash::SymbolTable;
use crate::hal::{Console, Host};
use crate::memory::SparseMemory;
use crate::process::{Pid, Process};
use crate::scheduler::{Decision, Scheduler};
use crate::syscall::{self, SyscallArgs};

/// Fatal kernel faults. Each one halts the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The guest issued a syscall number the kernel does not implement
    UnknownSyscall(u64),
    /// Nothing is ready but some process is still alive
    UnhandledBlockedState,
    /// The ready queue head was not in the `Ready` state
    CorruptReadyQueue(Pid),
    /// The machine is already powered off
    Halted,
}

impl core::fmt::Display for Fault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownSyscall(n) => write!(f, "Unknown syscall {}", n),
            Self::UnhandledBlockedState => {
                write!(f, "Not handled: we should let system wait for unfinished processes")
            }
            Self::CorruptReadyQueue(pid) => {
                write!(f, "Process {} in ready queue is not ready", pid)
            }
            Self::Halted => write!(f, "Machine is powered off"),
        }
    }
}

/// Machine power state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    /// Running
    On,
    /// Orderly shutdown with an exit code
    Off(i64),
    /// Stopped by a fatal fault
    Halted(Fault),
}

/// Result of one scheduling round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Control was handed to this process
    Switched(Pid),
    /// No process left; the machine powered off
    Shutdown,
}

/// The emulated machine and all kernel state.
pub struct Machine<H: Host> {
    memory: SparseMemory,
    sched: Scheduler,
    symbols: Once<SymbolTable>,
    current: Option<Pid>,
    power: PowerState,
    host: H,
}

impl<H: Host> Machine<H> {
    /// Power on a machine with empty memory and no processes.
    pub fn new(host: H) -> Self {
        Self {
            memory: SparseMemory::new(),
            sched: Scheduler::new(),
            symbols: Once::new(),
            current: None,
            power: PowerState::On,
            host,
        }
    }

    /// Guest memory
    pub fn memory(&self) -> &SparseMemory {
        &self.memory
    }

    /// Mutable guest memory
    pub fn memory_mut(&mut self) -> &mut SparseMemory {
        &mut self.memory
    }

    /// Scheduler
    pub fn scheduler(&self) -> &Scheduler {
        &self.sched
    }

    /// Mutable scheduler
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.sched
    }

    /// Host services
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host services
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Current power state
    pub fn power_state(&self) -> PowerState {
        self.power
    }

    /// Whether the machine is still powered on
    pub fn is_running(&self) -> bool {
        self.power == PowerState::On
    }

    /// Process currently holding the hart
    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    /// Descriptor of the current process
    pub fn current_process(&self) -> Option<&Process> {
        self.current.and_then(|pid| self.sched.process(pid))
    }

    /// Install the application's symbol table.
    ///
    /// Only the first call has an effect; returns `false` if a table was
    /// already installed.
    pub fn install_symbols(&mut self, table: SymbolTable) -> bool {
        if self.symbols.is_completed() {
            log::warn!("[ELF] symbol table already installed, ignoring new one");
            return false;
        }
        let table = self.symbols.call_once(|| table);
        for (i, (_, func)) in table.entries().enumerate() {
            log::info!("Function {}: name={}, addr={:#x}", i, func.name, func.addr);
        }
        true
    }

    /// Symbol table of the loaded application
    pub fn symbols(&self) -> Option<&SymbolTable> {
        self.symbols.get()
    }

    /// Write raw bytes to the host console
    pub fn console_write(&mut self, bytes: &[u8]) {
        self.host.console_write(bytes);
    }

    /// Pick the next process and switch to it, or power off when nothing is
    /// left.
    pub fn schedule(&mut self) -> Result<ScheduleOutcome, Fault> {
        if !self.is_running() {
            return Err(Fault::Halted);
        }

        match self.sched.pick_next()? {
            Decision::Shutdown => {
                self.current = None;
                self.shutdown(0);
                Ok(ScheduleOutcome::Shutdown)
            }
            Decision::Run(pid) => {
                self.current = Some(pid);
                if let Some(p) = self.sched.process(pid) {
                    let frame = p.trapframe;
                    self.host.switch_to(pid, &frame);
                }
                Ok(ScheduleOutcome::Switched(pid))
            }
        }
    }

    /// Terminate the current process with `code`.
    ///
    /// The machine runs a single application, so its exit powers the
    /// machine off with the same code.
    pub fn exit_current(&mut self, code: i64) {
        if let Some(pid) = self.current.take() {
            self.sched.retire(pid);
            self.sched.wake_up(pid);
        }
        self.shutdown(code);
    }

    /// Orderly power-off. Returns `false` if the machine was already off.
    pub fn shutdown(&mut self, code: i64) -> bool {
        if !self.is_running() {
            log::debug!("[MACHINE] ignoring shutdown({}), already {:?}", code, self.power);
            return false;
        }
        log::info!("[MACHINE] shutting down with code {}", code);
        self.power = PowerState::Off(code);
        self.host.shutdown(code);
        true
    }

    /// Stop the machine on a fatal fault.
    pub fn halt(&mut self, fault: Fault) {
        log::error!("[MACHINE] fatal: {}", fault);
        let was_on = self.is_running();

        let mut console = Console(&mut self.host);
        let _ = writeln!(console);
        let _ = writeln!(console, "========================================");
        let _ = writeln!(console, "KERNEL PANIC");
        let _ = writeln!(console, "========================================");
        let _ = writeln!(console, "Message: {}", fault);
        let _ = writeln!(console, "System halted.");

        self.power = PowerState::Halted(fault);
        if was_on {
            self.host.shutdown(FAULT_EXIT_CODE);
        }
    }

    /// Handle an `ecall` trap from the current process.
    ///
    /// Steps `epc` past the `ecall`, dispatches on `a0` and stores the
    /// result back into `a0`. A fatal fault halts the machine and is
    /// returned to the caller.
    pub fn handle_syscall_trap(&mut self) -> Result<i64, Fault> {
        if !self.is_running() {
            return Err(Fault::Halted);
        }

        let args = match self.current {
            Some(pid) => match self.sched.procs_mut().get_mut(pid) {
                Some(p) => {
                    p.trapframe.epc = p.trapframe.epc.wrapping_add(4);
                    Some(SyscallArgs::from_trapframe(&p.trapframe))
                }
                None => None,
            },
            None => None,
        };
        let Some(args) = args else {
            log::warn!("[SYSCALL] trap with no current process");
            return Ok(syscall::SyscallError::NoCurrentProcess.code());
        };

        let pid = self.current;
        match syscall::do_syscall(self, args) {
            Ok(ret) => {
                if let Some(p) = pid.and_then(|pid| self.sched.procs_mut().get_mut(pid)) {
                    p.trapframe.a0 = ret as u64;
                }
                Ok(ret)
            }
            Err(fault) => {
                self.halt(fault);
                Err(fault)
            }
        }
    }
}
