//! Application boot path.
//!
//! Turns the host command line into a loaded, runnable process: the first
//! argument names the application image, which is validated, copied into
//! guest memory and symbolized before its process is made ready.

use alloc::vec::Vec;

use crate::config::{MAX_CMDLINE_ARGS, USER_STACK_TOP};
use crate::hal::Host;
use crate::loader::{ElfError, ElfLoader, ImageSource, LoadReport};
use crate::machine::Machine;
use crate::memory::IdentityMap;
use crate::process::{Pid, TrapFrame};

/// Errors that abort booting an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// No application was named on the command line
    MissingApplication,
    /// More than `MAX_CMDLINE_ARGS` command-line strings
    TooManyArgs(usize),
    /// Every process slot is taken
    NoFreeProcess,
    /// The image could not be loaded
    Elf(ElfError),
}

impl core::fmt::Display for BootError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingApplication => write!(f, "You need to specify the application program!"),
            Self::TooManyArgs(n) => write!(
                f,
                "Too many command-line arguments: {} (max {})",
                n, MAX_CMDLINE_ARGS
            ),
            Self::NoFreeProcess => write!(f, "No free process slot"),
            Self::Elf(e) => write!(f, "Fail on loading elf: {}", e),
        }
    }
}

impl From<ElfError> for BootError {
    fn from(e: ElfError) -> Self {
        Self::Elf(e)
    }
}

/// Application named on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootArgs<'a> {
    /// Application image path
    pub application: &'a str,
    /// Every string after the kernel's own name, application first
    pub argv: Vec<&'a str>,
}

/// A loaded application process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedApplication {
    /// Process the image was loaded into
    pub pid: Pid,
    /// Entry point, also the process's initial `epc`
    pub entry: u64,
    /// Segments placed in guest memory
    pub report: LoadReport,
}

/// Parse the host argument vector.
///
/// `argv[0]` is the kernel itself and is skipped; the next string is the
/// application.
pub fn parse_args<'a>(argv: &[&'a str]) -> Result<BootArgs<'a>, BootError> {
    if argv.len() > MAX_CMDLINE_ARGS {
        return Err(BootError::TooManyArgs(argv.len()));
    }
    let rest = argv.get(1..).unwrap_or(&[]);
    let application = *rest.first().ok_or(BootError::MissingApplication)?;

    log::info!("Application: {}", application);
    Ok(BootArgs {
        application,
        argv: rest.to_vec(),
    })
}

/// Load the image into `pid`'s address space.
///
/// Validates the header, copies the segments, installs the symbol table
/// and points the process's `epc` at the entry. Nothing is enqueued; a
/// failed load leaves the process unrunnable.
pub fn load_application<H, S>(
    machine: &mut Machine<H>,
    pid: Pid,
    source: &mut S,
) -> Result<LoadedApplication, BootError>
where
    H: Host,
    S: ImageSource + ?Sized,
{
    if machine.scheduler().process(pid).is_none() {
        return Err(BootError::NoFreeProcess);
    }

    let header = ElfLoader::init(source)?;
    let report = ElfLoader::load(&header, source, machine.memory_mut(), &mut IdentityMap)?;
    log::debug!(
        "[ELF] loaded {} segments, {:#x} bytes",
        report.segments.len(),
        report.total_memsz()
    );

    let symbols = ElfLoader::load_symbols(&header, source)?;
    machine.install_symbols(symbols);

    let process = machine
        .scheduler_mut()
        .procs_mut()
        .get_mut(pid)
        .ok_or(BootError::NoFreeProcess)?;
    process.trapframe = TrapFrame::new(header.e_entry, USER_STACK_TOP);

    log::info!(
        "Application program entry point (virtual address): {:#x}",
        header.e_entry
    );
    Ok(LoadedApplication {
        pid,
        entry: header.e_entry,
        report,
    })
}

/// Allocate a process, load the image into it and make it ready.
///
/// A failed load hands the slot back.
pub fn spawn_application<H, S>(
    machine: &mut Machine<H>,
    source: &mut S,
) -> Result<LoadedApplication, BootError>
where
    H: Host,
    S: ImageSource + ?Sized,
{
    let pid = machine
        .scheduler_mut()
        .procs_mut()
        .alloc(None)
        .ok_or(BootError::NoFreeProcess)?;
    match load_application(machine, pid, source) {
        Ok(loaded) => {
            machine.scheduler_mut().insert_ready(pid);
            Ok(loaded)
        }
        Err(e) => {
            machine.scheduler_mut().procs_mut().release(pid);
            Err(e)
        }
    }
}
