//! One boot of the machine, from command line to first user-mode entry.

use std::fmt;
use std::io::Write;

use serde::Serialize;

use rvpk_kernel::boot;
use rvpk_kernel::loader::LoadedSegment;
use rvpk_kernel::{Machine, ScheduleOutcome};

use crate::cli::Cli;
use crate::error::RunError;
use crate::host::{StdHost, Switch};
use crate::image::FileImage;

/// Name the kernel sees as `argv[0]`.
const KERNEL_NAME: &str = "rvpk-run";

/// What a run loaded and where it stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub application: String,
    pub argv: Vec<String>,
    pub entry: u64,
    pub segments: Vec<SegmentSummary>,
    pub skipped_headers: usize,
    pub symbols: usize,
    pub resolved: Vec<Resolution>,
    /// User-mode entry handed to the host, if scheduling ran
    pub scheduled: Option<Switch>,
    /// Guest exit code, if the machine powered off
    pub exit_code: Option<i64>,
    /// Guest console output, filled in only when it was captured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentSummary {
    pub vaddr: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub flags: String,
}

impl From<&LoadedSegment> for SegmentSummary {
    fn from(seg: &LoadedSegment) -> Self {
        Self {
            vaddr: seg.vaddr,
            filesz: seg.filesz,
            memsz: seg.memsz,
            flags: seg.flags.to_string(),
        }
    }
}

/// An address looked up with `--resolve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub addr: u64,
    pub function: Option<String>,
    pub offset: Option<u64>,
}

impl RunSummary {
    /// Host process exit status for a successful run.
    pub fn exit_status(&self) -> u8 {
        self.exit_code.map_or(0, crate::error::clamp_exit_code)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "application: {}", self.application)?;
        writeln!(f, "entry:       {:#x}", self.entry)?;
        for seg in &self.segments {
            writeln!(
                f,
                "segment:     {:#018x} {} filesz={:#x} memsz={:#x}",
                seg.vaddr, seg.flags, seg.filesz, seg.memsz
            )?;
        }
        writeln!(f, "symbols:     {}", self.symbols)?;
        for r in &self.resolved {
            match (&r.function, r.offset) {
                (Some(name), Some(off)) => writeln!(f, "resolve:     {:#x} = {}+{:#x}", r.addr, name, off)?,
                _ => writeln!(f, "resolve:     {:#x} = ??", r.addr)?,
            }
        }
        if let Some(switch) = &self.scheduled {
            writeln!(
                f,
                "scheduled:   pid {} epc={:#x} sp={:#x}",
                switch.pid, switch.epc, switch.sp
            )?;
        }
        if let Some(code) = self.exit_code {
            writeln!(f, "exit code:   {}", code)?;
        }
        Ok(())
    }
}

/// Boot the application named by `cli`, writing guest console output to
/// `console`.
pub fn run<W: Write>(cli: &Cli, console: W) -> Result<RunSummary, RunError> {
    let app = cli.app.to_str().ok_or_else(|| RunError::NonUtf8Path {
        path: cli.app.clone(),
    })?;

    let mut argv: Vec<&str> = Vec::with_capacity(cli.app_args.len() + 2);
    argv.push(KERNEL_NAME);
    argv.push(app);
    argv.extend(cli.app_args.iter().map(String::as_str));
    let args = boot::parse_args(&argv)?;

    let mut image = FileImage::open(&cli.app).map_err(|source| RunError::ImageOpen {
        path: cli.app.clone(),
        source,
    })?;
    log::debug!("image {} is {} bytes", args.application, image.len());

    let mut machine = Machine::new(StdHost::new(console));
    let loaded = boot::spawn_application(&mut machine, &mut image)?;

    let resolved = cli
        .resolve
        .iter()
        .map(|&addr| resolve(&machine, addr))
        .collect();

    if !cli.no_run {
        match machine.schedule() {
            Ok(ScheduleOutcome::Switched(pid)) => log::debug!("scheduled process {}", pid),
            Ok(ScheduleOutcome::Shutdown) => {}
            Err(fault) => {
                machine.halt(fault);
                return Err(fault.into());
            }
        }
    }

    let scheduled = machine.host().switches().last().copied();
    let exit_code = machine.host().exit_code();

    Ok(RunSummary {
        application: args.application.to_owned(),
        argv: args.argv.iter().map(|s| (*s).to_owned()).collect(),
        entry: loaded.entry,
        segments: loaded.report.segments.iter().map(SegmentSummary::from).collect(),
        skipped_headers: loaded.report.skipped,
        symbols: machine.symbols().map_or(0, |t| t.len()),
        resolved,
        scheduled,
        exit_code,
        console: None,
    })
}

fn resolve<W: Write>(machine: &Machine<StdHost<W>>, addr: u64) -> Resolution {
    match machine.symbols().and_then(|t| t.lookup(addr)) {
        Some(func) => Resolution {
            addr,
            function: Some(func.name.to_string_lossy()),
            offset: Some(addr - func.addr),
        },
        None => Resolution {
            addr,
            function: None,
            offset: None,
        },
    }
}
