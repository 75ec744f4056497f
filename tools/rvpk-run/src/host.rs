//! Host side of the machine: console, power switch and user-mode entry.

use std::io::Write;

use serde::Serialize;

use rvpk_kernel::hal::Host;
use rvpk_kernel::process::{Pid, TrapFrame};

/// A user-mode entry requested by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Switch {
    #[serde(serialize_with = "pid_index")]
    pub pid: Pid,
    pub epc: u64,
    pub sp: u64,
}

fn pid_index<S: serde::Serializer>(pid: &Pid, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(pid.index() as u64)
}

/// Host backed by a byte sink for the guest console.
pub struct StdHost<W: Write> {
    console: W,
    exit_code: Option<i64>,
    switches: Vec<Switch>,
}

impl<W: Write> StdHost<W> {
    pub fn new(console: W) -> Self {
        Self {
            console,
            exit_code: None,
            switches: Vec::new(),
        }
    }

    /// Code passed to the power switch, if the machine was shut down.
    pub fn exit_code(&self) -> Option<i64> {
        self.exit_code
    }

    /// Every user-mode entry, oldest first.
    pub fn switches(&self) -> &[Switch] {
        &self.switches
    }
}

impl<W: Write> Host for StdHost<W> {
    fn console_write(&mut self, bytes: &[u8]) {
        if let Err(e) = self.console.write_all(bytes).and_then(|()| self.console.flush()) {
            log::warn!("console write of {} bytes failed: {}", bytes.len(), e);
        }
    }

    fn shutdown(&mut self, code: i64) {
        log::info!("[MACHINE] power off, exit code {}", code);
        self.exit_code = Some(code);
    }

    fn switch_to(&mut self, pid: Pid, frame: &TrapFrame) {
        log::debug!(
            "[MACHINE] entering user mode: pid {} epc={:#x} sp={:#x}",
            pid,
            frame.epc,
            frame.sp
        );
        self.switches.push(Switch {
            pid,
            epc: frame.epc,
            sp: frame.sp,
        });
    }
}
